use socket2::Socket;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::instrument;

use crate::error::{Error, IoOperation, Result};
use crate::probe::correlate::{Correlation, Expected, Unrelated, correlate};
use crate::probe::icmp::build_echo_request;
use crate::probe::socket::{
    RecvFrom, create_raw_icmp_socket, is_timeout, send_icmp, set_read_timeout, set_ttl,
};

/// Room for the largest IPv4 datagram
const RECV_BUFFER_LEN: usize = 65_535;

/// One Echo Request to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub destination: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
    pub ttl: u8,
    pub timeout: Duration,
    /// ICMP message size (header + payload)
    pub packet_size: usize,
}

impl Probe {
    fn expected(&self) -> Expected {
        Expected {
            destination: self.destination,
            identifier: self.identifier,
            sequence: self.sequence,
        }
    }
}

/// Outcome of one send/await cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Echo Reply matching the probe
    Reply {
        rtt: Duration,
        responder: Ipv4Addr,
        /// TTL left in the reply's IP header when it arrived, not the TTL
        /// the probe was sent with
        reply_ttl: u8,
        /// ICMP length of the reply
        len: usize,
    },
    /// Nothing matching arrived before the deadline
    TimedOut,
    /// Something arrived but it was not for this probe
    IdMismatch,
    /// A router on the path dropped the probe
    TtlExceeded { responder: Ipv4Addr, rtt: Duration },
}

/// An abstraction over the raw socket used by ping and traceroute sessions.
#[cfg_attr(test, mockall::automock)]
pub trait Network {
    /// Send `probe` and return the instant it left.
    fn send_probe(&mut self, probe: &Probe) -> Result<Instant>;

    /// Wait for the response to `probe`, for at most what is left of
    /// `probe.timeout` since `sent_at`.
    ///
    /// Reads exactly one datagram (or none). Callers that want to keep
    /// waiting after an [`ProbeResult::IdMismatch`] call again with the same
    /// `sent_at`.
    fn recv_probe(&mut self, probe: &Probe, sent_at: Instant) -> ProbeResult;
}

/// Await the response to `probe`, reading past datagrams meant for other
/// probes until its timeout budget is spent.
///
/// Returns [`ProbeResult::IdMismatch`] only when the budget ran out while
/// reading someone else's traffic.
pub fn await_response<N: Network>(
    network: &mut N,
    probe: &Probe,
    sent_at: Instant,
) -> ProbeResult {
    loop {
        match network.recv_probe(probe, sent_at) {
            ProbeResult::IdMismatch if sent_at.elapsed() < probe.timeout => {}
            other => return other,
        }
    }
}

/// [`Network`] over a raw ICMPv4 socket.
///
/// The socket is closed when the transport is dropped.
pub struct IcmpTransport {
    socket: Socket,
    current_ttl: Option<u8>,
    buffer: Vec<u8>,
}

impl IcmpTransport {
    pub fn open() -> Result<Self> {
        let socket = create_raw_icmp_socket()?;
        Ok(Self {
            socket,
            current_ttl: None,
            buffer: vec![0u8; RECV_BUFFER_LEN],
        })
    }
}

impl Network for IcmpTransport {
    #[instrument(level = "trace", skip(self))]
    fn send_probe(&mut self, probe: &Probe) -> Result<Instant> {
        if self.current_ttl != Some(probe.ttl) {
            set_ttl(&self.socket, probe.ttl)?;
            self.current_ttl = Some(probe.ttl);
        }

        let packet = build_echo_request(probe.identifier, probe.sequence, probe.packet_size);
        let sent_at = Instant::now();
        send_icmp(&self.socket, &packet, probe.destination)?;
        Ok(sent_at)
    }

    #[instrument(level = "trace", skip(self))]
    fn recv_probe(&mut self, probe: &Probe, sent_at: Instant) -> ProbeResult {
        let deadline = sent_at + probe.timeout;
        let expected = probe.expected();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ProbeResult::TimedOut;
            }
            if let Err(e) = set_read_timeout(&self.socket, remaining) {
                tracing::warn!(error = %e, "receive skipped");
                return ProbeResult::TimedOut;
            }

            let (len, source) = match self.socket.recv_from_into_buf(&mut self.buffer) {
                Ok(received) => received,
                Err(e) if is_timeout(&e) => return ProbeResult::TimedOut,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %Error::io(IoOperation::RecvFrom, e), "receive failed");
                    return ProbeResult::TimedOut;
                }
            };
            let rtt = sent_at.elapsed();

            // Raw IPv4 sockets only ever report IPv4 peers
            let Some(SocketAddr::V4(source)) = source else {
                continue;
            };
            let responder = *source.ip();
            let datagram = &self.buffer[..len];
            tracing::trace!(len, %responder, datagram = ?datagram, "received");

            return match correlate(datagram, &expected) {
                Correlation::EchoReply { len, ttl } => ProbeResult::Reply {
                    rtt,
                    responder,
                    reply_ttl: ttl,
                    len,
                },
                Correlation::TimeExceeded => ProbeResult::TtlExceeded { responder, rtt },
                Correlation::Unrelated(reason) => {
                    log_unrelated(reason, len, responder);
                    ProbeResult::IdMismatch
                }
            };
        }
    }
}

fn log_unrelated(reason: Unrelated, len: usize, responder: Ipv4Addr) {
    match reason {
        Unrelated::Malformed => {
            tracing::debug!(%responder, error = %Error::MalformedPacket(len), "dropped datagram");
        }
        Unrelated::BadChecksum => {
            tracing::debug!(%responder, error = %Error::ChecksumMismatch, "dropped datagram");
        }
        other => tracing::debug!(%responder, reason = ?other, "ignored datagram"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> Probe {
        Probe {
            destination: Ipv4Addr::new(192, 0, 2, 1),
            identifier: 0x1234,
            sequence: 1,
            ttl: 64,
            timeout: Duration::from_millis(100),
            packet_size: 50,
        }
    }

    /// Hands out a fixed sequence of results, then times out
    struct Scripted {
        results: Vec<ProbeResult>,
        recvs: usize,
    }

    impl Scripted {
        fn new(results: Vec<ProbeResult>) -> Self {
            Self { results, recvs: 0 }
        }
    }

    impl Network for Scripted {
        fn send_probe(&mut self, _probe: &Probe) -> Result<Instant> {
            Ok(Instant::now())
        }

        fn recv_probe(&mut self, _probe: &Probe, _sent_at: Instant) -> ProbeResult {
            self.recvs += 1;
            self.results
                .get(self.recvs - 1)
                .copied()
                .unwrap_or(ProbeResult::TimedOut)
        }
    }

    fn exceeded() -> ProbeResult {
        ProbeResult::TtlExceeded {
            responder: Ipv4Addr::new(10, 0, 0, 1),
            rtt: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_await_reads_past_foreign_datagrams() {
        let mut network = Scripted::new(vec![
            ProbeResult::IdMismatch,
            ProbeResult::IdMismatch,
            exceeded(),
        ]);
        let result = await_response(&mut network, &probe(), Instant::now());
        assert_eq!(result, exceeded());
        assert_eq!(network.recvs, 3);
    }

    #[test]
    fn test_await_passes_timeout_through() {
        let mut network = Scripted::new(vec![ProbeResult::IdMismatch]);
        let result = await_response(&mut network, &probe(), Instant::now());
        assert_eq!(result, ProbeResult::TimedOut);
        assert_eq!(network.recvs, 2);
    }

    #[test]
    fn test_await_reports_mismatch_once_budget_is_spent() {
        let mut network = Scripted::new(vec![ProbeResult::IdMismatch, exceeded()]);
        let spent = Probe {
            timeout: Duration::ZERO,
            ..probe()
        };
        let result = await_response(&mut network, &spent, Instant::now());
        assert_eq!(result, ProbeResult::IdMismatch);
        assert_eq!(network.recvs, 1);
    }

    #[test]
    fn test_probe_expected_matches_fields() {
        let probe = probe();
        let expected = probe.expected();
        assert_eq!(expected.destination, probe.destination);
        assert_eq!(expected.identifier, 0x1234);
        assert_eq!(expected.sequence, 1);
    }
}
