use std::io::{self, Write};
use std::net::Ipv4Addr;

use crate::lookup::ReverseDns;
use crate::report::{PingReporter, TraceReporter, lookup_hostname, millis};
use crate::state::{EchoReport, HopRecord, PingSummary, Target, TraceOutcome, TraceReport};

/// Human readable output in the style of ping(8) and traceroute(8)
pub struct TextReporter<W: Write> {
    writer: W,
    dns: Option<ReverseDns>,
    max_hops: u8,
}

impl<W: Write> TextReporter<W> {
    pub fn new(writer: W, dns: Option<ReverseDns>) -> Self {
        Self {
            writer,
            dns,
            max_hops: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn host(&self, ip: Ipv4Addr, known: Option<&str>) -> String {
        let hostname = match known {
            Some(name) => Some(name.to_string()),
            None => lookup_hostname(self.dns.as_ref(), ip),
        };
        match hostname {
            Some(name) => format!("{name} ({ip})"),
            None => ip.to_string(),
        }
    }
}

impl<W: Write> PingReporter for TextReporter<W> {
    fn start(&mut self, target: &Target, packet_size: usize) -> io::Result<()> {
        writeln!(
            self.writer,
            "PING {} ({}): {} bytes of data.",
            target.original, target.resolved, packet_size
        )
    }

    fn reply(&mut self, reply: &EchoReport) -> io::Result<()> {
        let host = self.host(reply.responder, reply.hostname.as_deref());
        writeln!(
            self.writer,
            "{} bytes from {}: icmp_seq={} ttl={} time={:.2} ms",
            reply.len,
            host,
            reply.sequence,
            reply.ttl,
            millis(reply.rtt)
        )?;
        self.writer.flush()
    }

    fn timeout(&mut self, sequence: u16) -> io::Result<()> {
        writeln!(self.writer, "Request timed out (icmp_seq={sequence})")?;
        self.writer.flush()
    }

    fn ttl_exceeded(&mut self, sequence: u16, responder: Ipv4Addr) -> io::Result<()> {
        writeln!(
            self.writer,
            "From {responder} icmp_seq={sequence} Time to live exceeded"
        )?;
        self.writer.flush()
    }

    fn summary(&mut self, summary: &PingSummary) -> io::Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "--- {} ping statistics ---", summary.target.original)?;
        writeln!(
            self.writer,
            "{} packets transmitted, {} received, {:.2}% packet loss",
            summary.sent, summary.received, summary.loss_pct
        )?;
        if let (Some(min), Some(avg), Some(max), Some(mdev)) =
            (summary.min, summary.avg, summary.max, summary.mdev)
        {
            writeln!(
                self.writer,
                "rtt min/avg/max/mdev = {:.2}/{:.2}/{:.2}/{:.2} ms",
                millis(min),
                millis(avg),
                millis(max),
                millis(mdev)
            )?;
        }
        self.writer.flush()
    }
}

impl<W: Write> TraceReporter for TextReporter<W> {
    fn start(&mut self, target: &Target, max_hops: u8) -> io::Result<()> {
        self.max_hops = max_hops;
        writeln!(
            self.writer,
            "traceroute to {} ({}), {} hops max",
            target.original, target.resolved, max_hops
        )
    }

    fn hop(&mut self, hop: &HopRecord) -> io::Result<()> {
        match (hop.responder, hop.rtt) {
            (Some(ip), Some(rtt)) => {
                let host = self.host(ip, hop.hostname.as_deref());
                writeln!(self.writer, "{:>3}  {}  {:.2} ms", hop.ttl, host, millis(rtt))?;
            }
            _ => writeln!(self.writer, "{:>3}  *", hop.ttl)?,
        }
        self.writer.flush()
    }

    fn finish(&mut self, report: &TraceReport) -> io::Result<()> {
        let hops = report.hops.len();
        match report.outcome {
            TraceOutcome::Reached => writeln!(
                self.writer,
                "Reached {} in {} hops",
                report.target.resolved, hops
            )?,
            TraceOutcome::HopLimit => writeln!(
                self.writer,
                "Destination not reached within {} hops",
                self.max_hops
            )?,
            TraceOutcome::Cancelled => {
                writeln!(self.writer, "Trace cancelled after {hops} hops")?
            }
        }
        self.writer.flush()
    }
}
