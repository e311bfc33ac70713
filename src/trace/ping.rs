use chrono::Utc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PingConfig;
use crate::probe::{Network, Probe, ProbeResult, await_response, next_identifier};
use crate::report::{PingReporter, log_report_error};
use crate::state::{EchoReport, PingSummary, RttStats, StopReason, Target};

/// Longest uninterrupted sleep between probes, bounds cancellation latency
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Repeated Echo Requests to one destination
pub struct PingSession<N: Network> {
    target: Target,
    config: PingConfig,
    network: N,
    identifier: u16,
    next_sequence: u16,
    stats: RttStats,
}

impl<N: Network> PingSession<N> {
    pub fn new(target: Target, config: PingConfig, network: N) -> Self {
        Self {
            target,
            config,
            network,
            identifier: next_identifier(),
            next_sequence: 1,
            stats: RttStats::default(),
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Probe until the configured count is reached or `cancel` fires.
    ///
    /// Consumes the session, releasing the network when it returns.
    pub fn run(
        mut self,
        reporter: &mut dyn PingReporter,
        cancel: &CancellationToken,
    ) -> PingSummary {
        let started_at = Utc::now();
        log_report_error(reporter.start(&self.target, self.config.packet_size));

        let stop = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let probe_started = Instant::now();
            self.probe_once(reporter);

            if self
                .config
                .count
                .is_some_and(|count| self.stats.sent >= count)
            {
                break StopReason::CountReached;
            }
            if !wait_until(probe_started + self.config.interval, cancel) {
                break StopReason::Cancelled;
            }
        };

        debug!(
            identifier = self.identifier,
            sent = self.stats.sent,
            received = self.stats.received,
            ?stop,
            "ping finished"
        );
        let summary = PingSummary::new(self.target.clone(), started_at, &self.stats, stop);
        log_report_error(reporter.summary(&summary));
        summary
    }

    fn probe_once(&mut self, reporter: &mut dyn PingReporter) {
        let probe = Probe {
            destination: self.target.resolved,
            identifier: self.identifier,
            sequence: self.next_sequence,
            ttl: self.config.ttl,
            timeout: self.config.timeout,
            packet_size: self.config.packet_size,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.stats.record_sent();

        let result = match self.network.send_probe(&probe) {
            Ok(sent_at) => await_response(&mut self.network, &probe, sent_at),
            Err(e) => {
                warn!(sequence = probe.sequence, error = %e, "probe not sent");
                ProbeResult::TimedOut
            }
        };
        debug!(sequence = probe.sequence, ?result, "probe complete");

        let reported = match result {
            ProbeResult::Reply {
                rtt,
                responder,
                reply_ttl,
                len,
            } => {
                self.stats.record_response(rtt);
                reporter.reply(&EchoReport {
                    sequence: probe.sequence,
                    responder,
                    hostname: None,
                    len,
                    ttl: reply_ttl,
                    rtt,
                })
            }
            ProbeResult::TtlExceeded { responder, .. } => {
                reporter.ttl_exceeded(probe.sequence, responder)
            }
            ProbeResult::TimedOut | ProbeResult::IdMismatch => reporter.timeout(probe.sequence),
        };
        log_report_error(reported);
    }
}

/// Sleep until `deadline`, waking regularly to check `cancel`.
///
/// Returns false if cancelled.
fn wait_until(deadline: Instant, cancel: &CancellationToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(CANCEL_POLL));
    }
}
