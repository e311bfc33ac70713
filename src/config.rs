use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::{PingArgs, TraceArgs};
use crate::error::{Error, Result};
use crate::probe::icmp::MAX_PACKET_SIZE;

/// Per-probe wait for a response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Gap between ping probes
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Ping probes leave with the largest TTL so they never expire in transit
pub const DEFAULT_PING_TTL: u8 = 255;
pub const DEFAULT_PACKET_SIZE: usize = crate::probe::icmp::DEFAULT_PACKET_SIZE;
/// Re-probes of one TTL after replies meant for someone else
pub const MAX_MISMATCH_RETRIES: u8 = 3;
/// Upper bound on traceroute hops
pub const MAX_SAFE_HOPS: u8 = 64;

/// Probe protocol type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeProtocol {
    #[default]
    Icmp,
    /// Accepted on the command line, not implemented
    Udp,
}

/// Ping session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingConfig {
    /// Number of probes to send (None = until cancelled)
    pub count: Option<u64>,
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    pub ttl: u8,
    pub packet_size: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: None,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            ttl: DEFAULT_PING_TTL,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

impl PingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == Some(0) {
            return Err(Error::InvalidConfig("count must be at least 1".into()));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig("interval must be positive".into()));
        }
        if self.ttl == 0 {
            return Err(Error::InvalidConfig("TTL must be at least 1".into()));
        }
        validate_timeout(self.timeout)?;
        validate_packet_size(self.packet_size)
    }
}

impl From<&PingArgs> for PingConfig {
    fn from(args: &PingArgs) -> Self {
        Self {
            count: args.count,
            interval: secs_f64(args.interval),
            timeout: Duration::from_millis(args.timeout),
            ttl: args.ttl,
            packet_size: args.size,
        }
    }
}

/// Traceroute session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub max_hops: u8,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    pub protocol: ProbeProtocol,
    pub packet_size: usize,
    pub mismatch_retries: u8,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            timeout: DEFAULT_TIMEOUT,
            protocol: ProbeProtocol::Icmp,
            packet_size: DEFAULT_PACKET_SIZE,
            mismatch_retries: MAX_MISMATCH_RETRIES,
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.protocol == ProbeProtocol::Udp {
            return Err(Error::InvalidConfig(
                "UDP probes are not supported, use icmp".into(),
            ));
        }
        if self.max_hops == 0 {
            return Err(Error::InvalidConfig("max hops must be at least 1".into()));
        }
        if self.max_hops > MAX_SAFE_HOPS {
            return Err(Error::InvalidConfig(format!(
                "max hops cannot exceed {MAX_SAFE_HOPS}"
            )));
        }
        validate_timeout(self.timeout)?;
        validate_packet_size(self.packet_size)
    }
}

impl From<&TraceArgs> for TraceConfig {
    fn from(args: &TraceArgs) -> Self {
        Self {
            max_hops: args.max_hops,
            timeout: Duration::from_millis(args.timeout),
            protocol: args.protocol,
            packet_size: args.size,
            mismatch_retries: MAX_MISMATCH_RETRIES,
        }
    }
}

fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::InvalidConfig("timeout must be positive".into()));
    }
    Ok(())
}

fn validate_packet_size(size: usize) -> Result<()> {
    if !(DEFAULT_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
        return Err(Error::InvalidConfig(format!(
            "packet size must be between {DEFAULT_PACKET_SIZE} and {MAX_PACKET_SIZE} bytes"
        )));
    }
    Ok(())
}

/// Negative, NaN and overflowing values become zero and fail validation
fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
