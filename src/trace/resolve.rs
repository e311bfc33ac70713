use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::state::Target;

/// Resolve a host name or IPv4 literal to a session target.
///
/// Only IPv4 addresses are used; a host with only IPv6 addresses fails.
pub fn resolve_target(host: &str) -> Result<Target> {
    resolve_ipv4(host).map(|ip| Target::new(host, ip))
}

fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    let failed = |reason: String| Error::Resolution {
        host: host.to_string(),
        reason,
    };

    // Try parsing as IP address first
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(ip) => Ok(ip),
            IpAddr::V6(_) => Err(failed("IPv6 is not supported".into())),
        };
    }

    let addrs = format!("{host}:0")
        .to_socket_addrs()
        .map_err(|e| failed(e.to_string()))?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| failed("no IPv4 addresses found".into()))
}
