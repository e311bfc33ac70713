use std::io::{self, Write};
use std::net::Ipv4Addr;

use crate::lookup::ReverseDns;
use crate::report::{PingReporter, TraceReporter, with_hostnames};
use crate::state::{EchoReport, HopRecord, PingSummary, Target, TraceReport};

/// Writes only the final report, as pretty-printed JSON
pub struct JsonReporter<W: Write> {
    writer: W,
    dns: Option<ReverseDns>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W, dns: Option<ReverseDns>) -> Self {
        Self { writer, dns }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write<T: serde::Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, value)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}

impl<W: Write> PingReporter for JsonReporter<W> {
    fn start(&mut self, _target: &Target, _packet_size: usize) -> io::Result<()> {
        Ok(())
    }

    fn reply(&mut self, _reply: &EchoReport) -> io::Result<()> {
        Ok(())
    }

    fn timeout(&mut self, _sequence: u16) -> io::Result<()> {
        Ok(())
    }

    fn ttl_exceeded(&mut self, _sequence: u16, _responder: Ipv4Addr) -> io::Result<()> {
        Ok(())
    }

    fn summary(&mut self, summary: &PingSummary) -> io::Result<()> {
        self.write(summary)
    }
}

impl<W: Write> TraceReporter for JsonReporter<W> {
    fn start(&mut self, _target: &Target, _max_hops: u8) -> io::Result<()> {
        Ok(())
    }

    fn hop(&mut self, _hop: &HopRecord) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, report: &TraceReport) -> io::Result<()> {
        let report = with_hostnames(report, self.dns.as_ref());
        self.write(&report)
    }
}
