use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use crate::lookup::sanitize_display;

/// Upper bound on one PTR query so a slow resolver can't stall a session
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// DNS cache entry
struct CacheEntry {
    hostname: Option<String>,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// Cached reverse DNS for responder addresses.
///
/// Lookups block the calling thread on the async resolver, so they must be
/// made from a blocking thread (e.g. inside `spawn_blocking`), never from
/// async code.
pub struct ReverseDns {
    resolver: TokioAsyncResolver,
    runtime: Handle,
    cache: RwLock<HashMap<Ipv4Addr, CacheEntry>>,
    cache_ttl: Duration,
}

impl ReverseDns {
    pub fn new(runtime: Handle) -> Self {
        let resolver = {
            let _guard = runtime.enter();
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        };

        Self {
            resolver,
            runtime,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(3600), // 1 hour
        }
    }

    /// Lookup reverse DNS for an IP, using cache
    pub fn reverse_lookup(&self, ip: Ipv4Addr) -> Option<String> {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(&ip)
                && entry.is_fresh(self.cache_ttl)
            {
                return entry.hostname.clone();
            }
        }

        let lookup = self.runtime.block_on(tokio::time::timeout(
            LOOKUP_TIMEOUT,
            self.resolver.reverse_lookup(IpAddr::V4(ip)),
        ));
        let hostname = match lookup {
            Ok(Ok(names)) => names.iter().next().map(|name| {
                let s = name.to_string();
                sanitize_display(s.trim_end_matches('.'))
            }),
            Ok(Err(e)) => {
                tracing::debug!(%ip, error = %e, "reverse lookup failed");
                None
            }
            Err(_) => {
                tracing::debug!(%ip, "reverse lookup timed out");
                None
            }
        };

        self.cache_insert(ip, hostname.clone());
        hostname
    }

    fn cache_insert(&self, ip: Ipv4Addr, hostname: Option<String>) {
        self.cache.write().insert(
            ip,
            CacheEntry {
                hostname,
                cached_at: Instant::now(),
            },
        );
    }
}
