use std::io::{self, Write};

use crate::lookup::ReverseDns;
use crate::report::{TraceReporter, lookup_hostname, millis};
use crate::state::{HopRecord, Target, TraceReport};

/// Streams traceroute hops as CSV rows
pub struct CsvReporter<W: Write> {
    writer: W,
    dns: Option<ReverseDns>,
}

impl<W: Write> CsvReporter<W> {
    pub fn new(writer: W, dns: Option<ReverseDns>) -> Self {
        Self { writer, dns }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceReporter for CsvReporter<W> {
    fn start(&mut self, _target: &Target, _max_hops: u8) -> io::Result<()> {
        writeln!(self.writer, "ttl,ip,hostname,rtt_ms")
    }

    fn hop(&mut self, hop: &HopRecord) -> io::Result<()> {
        let ip = hop
            .responder
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "*".to_string());
        let hostname = hop
            .hostname
            .clone()
            .or_else(|| hop.responder.and_then(|ip| lookup_hostname(self.dns.as_ref(), ip)))
            .unwrap_or_default();
        let rtt = hop
            .rtt
            .map(|rtt| format!("{:.2}", millis(rtt)))
            .unwrap_or_default();

        writeln!(
            self.writer,
            "{},{},{},{}",
            hop.ttl,
            ip,
            escape_csv(&hostname),
            rtt
        )
    }

    fn finish(&mut self, _report: &TraceReport) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    #[test]
    fn test_csv_rows() {
        let mut reporter = CsvReporter::new(Vec::new(), None);
        let target = Target::new("example.com", Ipv4Addr::new(93, 184, 216, 34));
        reporter.start(&target, 30).unwrap();
        reporter
            .hop(&HopRecord::responded(
                1,
                Ipv4Addr::new(10, 0, 0, 1),
                Duration::from_micros(1_250),
            ))
            .unwrap();
        reporter.hop(&HopRecord::unresponsive(2)).unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "ttl,ip,hostname,rtt_ms\n1,10.0.0.1,,1.25\n2,*,,\n");
    }

    #[test]
    fn test_known_hostname_is_escaped() {
        let mut reporter = CsvReporter::new(Vec::new(), None);
        let mut hop =
            HopRecord::responded(4, Ipv4Addr::new(10, 0, 0, 4), Duration::from_millis(2));
        hop.hostname = Some("a,b".into());
        reporter.hop(&hop).unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "4,10.0.0.4,\"a,b\",2.00\n");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }
}
