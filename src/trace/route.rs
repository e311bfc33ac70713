use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TraceConfig;
use crate::probe::{Network, Probe, ProbeResult, await_response, next_identifier};
use crate::report::{TraceReporter, log_report_error};
use crate::state::{HopRecord, Target, TraceOutcome, TraceReport};

/// Hop-by-hop discovery of the path to one destination
pub struct TraceSession<N: Network> {
    target: Target,
    config: TraceConfig,
    network: N,
    identifier: u16,
    next_sequence: u16,
}

impl<N: Network> TraceSession<N> {
    pub fn new(target: Target, config: TraceConfig, network: N) -> Self {
        Self {
            target,
            config,
            network,
            identifier: next_identifier(),
            next_sequence: 1,
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Probe TTL 1, 2, ... until the destination answers, `max_hops` is
    /// passed or `cancel` fires. Each hop is reported as it completes.
    pub fn run(
        mut self,
        reporter: &mut dyn TraceReporter,
        cancel: &CancellationToken,
    ) -> TraceReport {
        let started_at = Utc::now();
        log_report_error(reporter.start(&self.target, self.config.max_hops));

        let mut hops = Vec::with_capacity(self.config.max_hops as usize);
        let mut outcome = TraceOutcome::HopLimit;

        for ttl in 1..=self.config.max_hops {
            if cancel.is_cancelled() {
                outcome = TraceOutcome::Cancelled;
                break;
            }

            let hop = self.probe_hop(ttl);
            let reached = hop.responder == Some(self.target.resolved);
            log_report_error(reporter.hop(&hop));
            hops.push(hop);

            if reached {
                outcome = TraceOutcome::Reached;
                break;
            }
        }

        debug!(
            identifier = self.identifier,
            hops = hops.len(),
            ?outcome,
            "traceroute finished"
        );
        let report = TraceReport {
            target: self.target.clone(),
            started_at,
            hops,
            outcome,
        };
        log_report_error(reporter.finish(&report));
        report
    }

    /// One completed cycle at `ttl`.
    ///
    /// Datagrams for other probes are read past until the timeout budget is
    /// spent. Only then is the TTL re-probed with a fresh sequence, a bounded
    /// number of times, after which the hop counts as silent.
    fn probe_hop(&mut self, ttl: u8) -> HopRecord {
        for attempt in 0..=self.config.mismatch_retries {
            let probe = self.next_probe(ttl);

            let result = match self.network.send_probe(&probe) {
                Ok(sent_at) => await_response(&mut self.network, &probe, sent_at),
                Err(e) => {
                    warn!(ttl, error = %e, "probe not sent");
                    return HopRecord::unresponsive(ttl);
                }
            };

            match result {
                ProbeResult::Reply { rtt, responder, .. }
                | ProbeResult::TtlExceeded { responder, rtt } => {
                    debug!(ttl, %responder, ?rtt, "hop responded");
                    return HopRecord::responded(ttl, responder, rtt);
                }
                ProbeResult::TimedOut => {
                    debug!(ttl, "hop timed out");
                    return HopRecord::unresponsive(ttl);
                }
                ProbeResult::IdMismatch => {
                    debug!(ttl, attempt, "timeout spent on responses for other probes");
                }
            }
        }

        debug!(ttl, "giving up on hop after repeated mismatches");
        HopRecord::unresponsive(ttl)
    }

    fn next_probe(&mut self, ttl: u8) -> Probe {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Probe {
            destination: self.target.resolved,
            identifier: self.identifier,
            sequence,
            ttl,
            timeout: self.config.timeout,
            packet_size: self.config.packet_size,
        }
    }
}
