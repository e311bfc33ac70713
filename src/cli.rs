use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::{
    DEFAULT_MAX_HOPS, DEFAULT_PACKET_SIZE, DEFAULT_PING_TTL, PingConfig, ProbeProtocol,
    TraceConfig,
};
use crate::error::Result;

/// Host probed when none is given
pub const DEFAULT_HOSTNAME: &str = "lancaster.ac.uk";

/// ICMP ping and traceroute
#[derive(Parser, Debug, Clone)]
#[command(name = "pingtrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log filter directives (e.g. "debug" or "pingtrace=trace"); falls back to RUST_LOG
    #[arg(long = "log-filter", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send ICMP Echo Requests and report each reply
    #[command(alias = "p")]
    Ping(PingArgs),
    /// Discover the routers on the path to a host
    #[command(alias = "t")]
    Traceroute(TraceArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PingArgs {
    /// Host to ping (IP address or hostname)
    #[arg(default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// Number of probes to send (default: until interrupted)
    pub count: Option<u64>,

    /// Per-probe timeout in milliseconds
    #[arg(default_value_t = 1000)]
    pub timeout: u64,

    /// Seconds between probes
    #[arg(short = 'i', long = "interval", default_value_t = 1.0)]
    pub interval: f64,

    /// IP TTL of outgoing probes
    #[arg(long = "ttl", default_value_t = DEFAULT_PING_TTL)]
    pub ttl: u8,

    /// ICMP message size in bytes
    #[arg(short = 's', long = "size", default_value_t = DEFAULT_PACKET_SIZE)]
    pub size: usize,

    /// Skip reverse DNS lookups of responders
    #[arg(short = 'n', long = "no-dns")]
    pub no_dns: bool,

    /// Print the summary as JSON instead of per-probe lines
    #[arg(long = "json")]
    pub json: bool,
}

impl PingArgs {
    /// Build a validated session config
    pub fn config(&self) -> Result<PingConfig> {
        let config = PingConfig::from(self);
        config.validate()?;
        Ok(config)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TraceArgs {
    /// Host to trace (IP address or hostname)
    #[arg(default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// Per-hop timeout in milliseconds
    #[arg(default_value_t = 1000)]
    pub timeout: u64,

    /// Probe protocol
    #[arg(value_enum, default_value_t = ProbeProtocol::Icmp)]
    pub protocol: ProbeProtocol,

    /// Maximum number of hops
    #[arg(short = 'm', long = "max-hops", default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: u8,

    /// ICMP message size in bytes
    #[arg(short = 's', long = "size", default_value_t = DEFAULT_PACKET_SIZE)]
    pub size: usize,

    /// Skip reverse DNS lookups
    #[arg(long = "no-dns")]
    pub no_dns: bool,

    /// Output the report as JSON
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,

    /// Output hops as CSV
    #[arg(long = "csv")]
    pub csv: bool,
}

impl TraceArgs {
    /// Build a validated session config
    pub fn config(&self) -> Result<TraceConfig> {
        let config = TraceConfig::from(self);
        config.validate()?;
        Ok(config)
    }
}
