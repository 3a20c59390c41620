/*
 * dns.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragno, a parallel bulk HTTP client.
 *
 * Ragno is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragno is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragno.  If not, see <http://www.gnu.org/licenses/>.
 */

//! DNS resolution with a TTL cache. The system resolver call runs outside the
//! cache lock so concurrent lookups of different hosts do not serialize.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::Instant;

/// System resolution of host:port to socket addresses, in OS-returned order.
pub async fn resolve_host(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    Ok(lookup_host((host, port)).await?.collect())
}

struct CachedEntry {
    addresses: Vec<SocketAddr>,
    cached_at: Instant,
    ttl: Duration,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CachedEntry>,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters and current entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Host:port → address cache. Entries are served while younger than their TTL
/// and erased on the first stale access.
pub struct DnsCache {
    default_ttl: Duration,
    inner: Mutex<Inner>,
}

impl DnsCache {
    pub fn new(default_ttl: Duration) -> Self {
        DnsCache {
            default_ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn key(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    /// Resolve through the cache. The bool is true when the answer came from
    /// a fresh cache entry.
    pub async fn resolve(&self, host: &str, port: u16) -> io::Result<(Vec<SocketAddr>, bool)> {
        let key = Self::key(host, port);
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(entry) = inner.entries.get(&key) {
                if entry.cached_at.elapsed() < entry.ttl {
                    let addresses = entry.addresses.clone();
                    inner.hits += 1;
                    return Ok((addresses, true));
                }
                inner.entries.remove(&key);
            }
            inner.misses += 1;
        }

        // Blocking resolver call happens with the lock released.
        let addresses = resolve_host(host, port).await?;

        if !addresses.is_empty() {
            let mut inner = self.inner.lock().unwrap();
            inner.entries.insert(
                key,
                CachedEntry {
                    addresses: addresses.clone(),
                    cached_at: Instant::now(),
                    ttl: self.default_ttl,
                },
            );
        }
        Ok((addresses, false))
    }

    /// Resolve and discard, to pre-populate the cache.
    pub async fn warmup(&self, host: &str, port: u16) {
        let _ = self.resolve(host, port).await;
    }

    /// Erase every entry that has reached its TTL.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .entries
            .retain(|_, entry| entry.cached_at.elapsed() < entry.ttl);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().entries.clear();
    }

    pub fn stats(&self) -> DnsStats {
        let inner = self.inner.lock().unwrap();
        DnsStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}
