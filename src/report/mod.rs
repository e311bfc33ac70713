use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::lookup::ReverseDns;
use crate::state::{EchoReport, HopRecord, PingSummary, Target, TraceReport};

pub mod csv;
pub mod json;
pub mod text;

pub use csv::CsvReporter;
pub use json::JsonReporter;
pub use text::TextReporter;

/// Receives ping session events as they happen
pub trait PingReporter {
    fn start(&mut self, target: &Target, packet_size: usize) -> io::Result<()>;
    fn reply(&mut self, reply: &EchoReport) -> io::Result<()>;
    fn timeout(&mut self, sequence: u16) -> io::Result<()>;
    fn ttl_exceeded(&mut self, sequence: u16, responder: Ipv4Addr) -> io::Result<()>;
    fn summary(&mut self, summary: &PingSummary) -> io::Result<()>;
}

/// Receives traceroute session events as they happen
pub trait TraceReporter {
    fn start(&mut self, target: &Target, max_hops: u8) -> io::Result<()>;
    fn hop(&mut self, hop: &HopRecord) -> io::Result<()>;
    fn finish(&mut self, report: &TraceReport) -> io::Result<()>;
}

/// Output failures never stop a session
pub(crate) fn log_report_error(result: io::Result<()>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "failed to write report");
    }
}

fn lookup_hostname(dns: Option<&ReverseDns>, ip: Ipv4Addr) -> Option<String> {
    dns.and_then(|dns| dns.reverse_lookup(ip))
}

/// Copy of `report` with hostnames filled in for responding hops
fn with_hostnames(report: &TraceReport, dns: Option<&ReverseDns>) -> TraceReport {
    let mut report = report.clone();
    for hop in &mut report.hops {
        if hop.hostname.is_none()
            && let Some(ip) = hop.responder
        {
            hop.hostname = lookup_hostname(dns, ip);
        }
    }
    report
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
