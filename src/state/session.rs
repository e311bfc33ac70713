use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Destination of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// As given on the command line
    pub original: String,
    pub resolved: Ipv4Addr,
}

impl Target {
    pub fn new(original: impl Into<String>, resolved: Ipv4Addr) -> Self {
        Self {
            original: original.into(),
            resolved,
        }
    }
}

/// Round trip statistics for a ping session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RttStats {
    pub sent: u64,
    pub received: u64,

    // Latency stats (Welford's online algorithm)
    #[serde(with = "duration_serde")]
    pub min_rtt: Duration,
    #[serde(with = "duration_serde")]
    pub max_rtt: Duration,
    pub mean_rtt: f64, // microseconds
    pub m2: f64,
}

impl Default for RttStats {
    fn default() -> Self {
        Self {
            sent: 0,
            received: 0,
            min_rtt: Duration::MAX,
            max_rtt: Duration::ZERO,
            mean_rtt: 0.0,
            m2: 0.0,
        }
    }
}

impl RttStats {
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Update stats with a new RTT sample
    pub fn record_response(&mut self, rtt: Duration) {
        self.received += 1;

        if rtt < self.min_rtt {
            self.min_rtt = rtt;
        }
        if rtt > self.max_rtt {
            self.max_rtt = rtt;
        }

        let rtt_micros = rtt.as_micros() as f64;
        let delta = rtt_micros - self.mean_rtt;
        self.mean_rtt += delta / self.received as f64;
        let delta2 = rtt_micros - self.mean_rtt;
        self.m2 += delta * delta2;
    }

    /// Percentage of sent probes that got no reply
    pub fn loss_pct(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            (self.sent - self.received.min(self.sent)) as f64 * 100.0 / self.sent as f64
        }
    }

    pub fn min(&self) -> Option<Duration> {
        (self.received > 0).then_some(self.min_rtt)
    }

    pub fn max(&self) -> Option<Duration> {
        (self.received > 0).then_some(self.max_rtt)
    }

    /// Mean over successful probes only
    pub fn avg(&self) -> Option<Duration> {
        (self.received > 0).then(|| Duration::from_micros(self.mean_rtt.round() as u64))
    }

    /// Mean deviation as reported by ping (population standard deviation)
    pub fn mdev(&self) -> Option<Duration> {
        (self.received > 0).then(|| {
            let variance = self.m2 / self.received as f64;
            Duration::from_micros(variance.sqrt().round() as u64)
        })
    }
}

/// One successful ping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoReport {
    pub sequence: u16,
    pub responder: Ipv4Addr,
    pub hostname: Option<String>,
    /// ICMP length of the reply
    pub len: usize,
    pub ttl: u8,
    #[serde(with = "duration_serde")]
    pub rtt: Duration,
}

/// Why a ping session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CountReached,
    Cancelled,
}

/// Final statistics of a ping session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingSummary {
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub sent: u64,
    pub received: u64,
    pub loss_pct: f64,
    #[serde(with = "duration_serde::option")]
    pub min: Option<Duration>,
    #[serde(with = "duration_serde::option")]
    pub avg: Option<Duration>,
    #[serde(with = "duration_serde::option")]
    pub max: Option<Duration>,
    #[serde(with = "duration_serde::option")]
    pub mdev: Option<Duration>,
    pub stop: StopReason,
}

impl PingSummary {
    pub fn new(
        target: Target,
        started_at: DateTime<Utc>,
        stats: &RttStats,
        stop: StopReason,
    ) -> Self {
        Self {
            target,
            started_at,
            sent: stats.sent,
            received: stats.received,
            loss_pct: stats.loss_pct(),
            min: stats.min(),
            avg: stats.avg(),
            max: stats.max(),
            mdev: stats.mdev(),
            stop,
        }
    }
}

/// A single hop (TTL level) in the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRecord {
    pub ttl: u8,
    /// None when the hop never answered
    pub responder: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(with = "duration_serde::option")]
    pub rtt: Option<Duration>,
}

impl HopRecord {
    pub fn responded(ttl: u8, responder: Ipv4Addr, rtt: Duration) -> Self {
        Self {
            ttl,
            responder: Some(responder),
            hostname: None,
            rtt: Some(rtt),
        }
    }

    pub fn unresponsive(ttl: u8) -> Self {
        Self {
            ttl,
            responder: None,
            hostname: None,
            rtt: None,
        }
    }
}

/// How a traceroute ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    /// The destination itself replied
    Reached,
    /// Ran out of hops before reaching the destination
    HopLimit,
    Cancelled,
}

/// A complete traceroute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub hops: Vec<HopRecord>,
    pub outcome: TraceOutcome,
}

impl TraceReport {
    /// Get hop by TTL (1-indexed)
    pub fn hop(&self, ttl: u8) -> Option<&HopRecord> {
        if ttl == 0 {
            return None;
        }
        self.hops.get(ttl as usize - 1)
    }

    pub fn reached(&self) -> bool {
        self.outcome == TraceOutcome::Reached
    }
}

/// Serde helper for Duration, as microseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_micros() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            duration
                .map(|d| d.as_micros() as u64)
                .serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let micros = Option::<u64>::deserialize(deserializer)?;
            Ok(micros.map(Duration::from_micros))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtt_stats_initial_state() {
        let stats = RttStats::default();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.received, 0);
        assert_eq!(stats.loss_pct(), 0.0);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.avg(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.mdev(), None);
    }

    #[test]
    fn test_rtt_stats_single_sample() {
        let mut stats = RttStats::default();
        let rtt = Duration::from_millis(10);
        stats.record_sent();
        stats.record_response(rtt);

        assert_eq!(stats.min(), Some(rtt));
        assert_eq!(stats.max(), Some(rtt));
        assert_eq!(stats.avg(), Some(rtt));
        assert_eq!(stats.mdev(), Some(Duration::ZERO));
        assert_eq!(stats.loss_pct(), 0.0);
    }

    #[test]
    fn test_rtt_stats_welford_algorithm() {
        let mut stats = RttStats::default();
        // 10, 20, 30 ms: mean 20, population variance 66.67 ms^2
        for ms in [10, 20, 30] {
            stats.record_sent();
            stats.record_response(Duration::from_millis(ms));
        }

        assert_eq!(stats.min(), Some(Duration::from_millis(10)));
        assert_eq!(stats.max(), Some(Duration::from_millis(30)));
        assert_eq!(stats.avg(), Some(Duration::from_millis(20)));
        let mdev = stats.mdev().unwrap().as_micros();
        assert!((8164..=8166).contains(&mdev), "mdev was {mdev}us");
    }

    #[test]
    fn test_loss_counts_only_successes_in_average() {
        let mut stats = RttStats::default();
        for i in 0..4 {
            stats.record_sent();
            if i % 2 == 0 {
                stats.record_response(Duration::from_millis(40));
            }
        }
        assert_eq!(stats.loss_pct(), 50.0);
        assert_eq!(stats.avg(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_total_loss() {
        let mut stats = RttStats::default();
        stats.record_sent();
        stats.record_sent();
        assert_eq!(stats.loss_pct(), 100.0);
        assert_eq!(stats.avg(), None);
    }

    #[test]
    fn test_trace_report_hop_access() {
        let report = TraceReport {
            target: Target::new("example.com", Ipv4Addr::new(93, 184, 216, 34)),
            started_at: Utc::now(),
            hops: vec![
                HopRecord::responded(1, Ipv4Addr::new(10, 0, 0, 1), Duration::from_millis(1)),
                HopRecord::unresponsive(2),
            ],
            outcome: TraceOutcome::HopLimit,
        };

        assert!(report.hop(0).is_none());
        assert_eq!(report.hop(1).unwrap().ttl, 1);
        assert_eq!(report.hop(2).unwrap().responder, None);
        assert!(report.hop(3).is_none());
        assert!(!report.reached());
    }

    #[test]
    fn test_ping_summary_serialization_roundtrip() {
        let mut stats = RttStats::default();
        stats.record_sent();
        stats.record_response(Duration::from_micros(1500));
        stats.record_sent();

        let summary = PingSummary::new(
            Target::new("10.0.0.1", Ipv4Addr::new(10, 0, 0, 1)),
            Utc::now(),
            &stats,
            StopReason::Cancelled,
        );
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"stop\":\"cancelled\""));
        assert!(json.contains("\"min\":1500"));

        let restored: PingSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.sent, 2);
        assert_eq!(restored.received, 1);
        assert_eq!(restored.loss_pct, 50.0);
        assert_eq!(restored.avg, Some(Duration::from_micros(1500)));
    }

    #[test]
    fn test_unresponsive_hop_serializes_nulls() {
        let json = serde_json::to_string(&HopRecord::unresponsive(4)).unwrap();
        assert_eq!(json, r#"{"ttl":4,"responder":null,"rtt":null}"#);
    }
}
