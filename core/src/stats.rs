/*
 * stats.rs
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

//! Thread-safe request statistics: atomic totals and timing sums, CAS min/max
//! latency, an error-kind histogram and the current-connection triple. The
//! presentation layer reads snapshots; nothing here prints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const MIN_LATENCY_UNSET: u64 = 999_999;

/// Point-in-time view of the counters, for the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_bytes_received: u64,
    pub total_bytes_sent: u64,

    pub connections_created: u64,
    pub connections_reused: u64,

    pub dns_lookups: u64,
    pub dns_cache_hits: u64,

    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,

    pub avg_dns_ms: f64,
    pub avg_tcp_handshake_ms: f64,
    pub avg_first_byte_ms: f64,
    pub avg_last_byte_ms: f64,

    pub current_ip: String,
    pub current_host: String,
    pub is_secure: bool,

    pub error_counts: HashMap<String, u64>,
}

#[derive(Default)]
struct CurrentInfo {
    ip: String,
    host: String,
    secure: bool,
}

/// Process-wide statistics sink. Scalars are atomics; the error histogram and
/// the current-connection info sit behind their own mutexes.
pub struct Statistics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_bytes_received: AtomicU64,
    total_bytes_sent: AtomicU64,

    connections_created: AtomicU64,
    connections_reused: AtomicU64,

    dns_lookups: AtomicU64,
    dns_cache_hits: AtomicU64,

    total_latency_ms: AtomicU64,
    min_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,

    total_dns_ms: AtomicU64,
    total_tcp_ms: AtomicU64,
    total_first_byte_ms: AtomicU64,

    tcp_handshake_count: AtomicU64,
    first_byte_count: AtomicU64,

    info: Mutex<CurrentInfo>,
    error_counts: Mutex<HashMap<String, u64>>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    pub fn new() -> Self {
        Statistics {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_bytes_received: AtomicU64::new(0),
            total_bytes_sent: AtomicU64::new(0),
            connections_created: AtomicU64::new(0),
            connections_reused: AtomicU64::new(0),
            dns_lookups: AtomicU64::new(0),
            dns_cache_hits: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            min_latency_ms: AtomicU64::new(MIN_LATENCY_UNSET),
            max_latency_ms: AtomicU64::new(0),
            total_dns_ms: AtomicU64::new(0),
            total_tcp_ms: AtomicU64::new(0),
            total_first_byte_ms: AtomicU64::new(0),
            tcp_handshake_count: AtomicU64::new(0),
            first_byte_count: AtomicU64::new(0),
            info: Mutex::new(CurrentInfo::default()),
            error_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_request(&self, latency: Duration, bytes_received: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_received
            .fetch_add(bytes_received, Ordering::Relaxed);
        let lat_ms = latency.as_millis() as u64;
        self.total_latency_ms.fetch_add(lat_ms, Ordering::Relaxed);

        let mut cur = self.min_latency_ms.load(Ordering::Relaxed);
        while lat_ms < cur {
            match self.min_latency_ms.compare_exchange_weak(
                cur,
                lat_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => cur = seen,
            }
        }
        let mut cur = self.max_latency_ms.load(Ordering::Relaxed);
        while lat_ms > cur {
            match self.max_latency_ms.compare_exchange_weak(
                cur,
                lat_ms,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => cur = seen,
            }
        }
    }

    pub fn record_bytes_sent(&self, bytes: u64) {
        self.total_bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_connection(&self, reused: bool) {
        if reused {
            self.connections_reused.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connections_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, kind: &str) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        let mut counts = self.error_counts.lock().unwrap();
        *counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_dns_lookup(&self, duration: Duration, cached: bool) {
        self.dns_lookups.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.dns_cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total_dns_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_tcp_handshake(&self, duration: Duration) {
        self.tcp_handshake_count.fetch_add(1, Ordering::Relaxed);
        self.total_tcp_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_first_byte(&self, duration: Duration) {
        self.first_byte_count.fetch_add(1, Ordering::Relaxed);
        self.total_first_byte_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_current_ip(&self, ip: &str) {
        self.info.lock().unwrap().ip = ip.to_string();
    }

    pub fn set_current_host(&self, host: &str) {
        self.info.lock().unwrap().host = host.to_string();
    }

    pub fn set_is_secure(&self, secure: bool) {
        self.info.lock().unwrap().secure = secure;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut s = StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            total_bytes_received: self.total_bytes_received.load(Ordering::Relaxed),
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed),
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_reused: self.connections_reused.load(Ordering::Relaxed),
            dns_lookups: self.dns_lookups.load(Ordering::Relaxed),
            dns_cache_hits: self.dns_cache_hits.load(Ordering::Relaxed),
            ..StatsSnapshot::default()
        };

        let req = s.total_requests;
        if req > 0 {
            s.avg_latency_ms = self.total_latency_ms.load(Ordering::Relaxed) as f64 / req as f64;
        }
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        s.min_latency_ms = if min == MIN_LATENCY_UNSET { 0.0 } else { min as f64 };
        s.max_latency_ms = self.max_latency_ms.load(Ordering::Relaxed) as f64;

        let dns = s.dns_lookups;
        if dns > 0 {
            s.avg_dns_ms = self.total_dns_ms.load(Ordering::Relaxed) as f64 / dns as f64;
        }
        let tcp = self.tcp_handshake_count.load(Ordering::Relaxed);
        if tcp > 0 {
            s.avg_tcp_handshake_ms = self.total_tcp_ms.load(Ordering::Relaxed) as f64 / tcp as f64;
        }
        let fb = self.first_byte_count.load(Ordering::Relaxed);
        if fb > 0 {
            s.avg_first_byte_ms =
                self.total_first_byte_ms.load(Ordering::Relaxed) as f64 / fb as f64;
        }
        s.avg_last_byte_ms = s.avg_latency_ms;

        {
            let info = self.info.lock().unwrap();
            s.current_ip = if info.ip.is_empty() {
                "N/A".to_string()
            } else {
                info.ip.clone()
            };
            s.current_host = if info.host.is_empty() {
                "N/A".to_string()
            } else {
                info.host.clone()
            };
            s.is_secure = info.secure;
        }
        s.error_counts = self.error_counts.lock().unwrap().clone();
        s
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.total_bytes_received.store(0, Ordering::Relaxed);
        self.total_bytes_sent.store(0, Ordering::Relaxed);
        self.connections_created.store(0, Ordering::Relaxed);
        self.connections_reused.store(0, Ordering::Relaxed);
        self.dns_lookups.store(0, Ordering::Relaxed);
        self.dns_cache_hits.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.min_latency_ms.store(MIN_LATENCY_UNSET, Ordering::Relaxed);
        self.max_latency_ms.store(0, Ordering::Relaxed);
        self.total_dns_ms.store(0, Ordering::Relaxed);
        self.total_tcp_ms.store(0, Ordering::Relaxed);
        self.total_first_byte_ms.store(0, Ordering::Relaxed);
        self.tcp_handshake_count.store(0, Ordering::Relaxed);
        self.first_byte_count.store(0, Ordering::Relaxed);
        *self.info.lock().unwrap() = CurrentInfo::default();
        self.error_counts.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_min_max_avg() {
        let stats = Statistics::new();
        stats.record_request(Duration::from_millis(30), 100);
        stats.record_request(Duration::from_millis(10), 50);
        stats.record_request(Duration::from_millis(20), 25);
        let s = stats.snapshot();
        assert_eq!(s.total_requests, 3);
        assert_eq!(s.total_bytes_received, 175);
        assert_eq!(s.min_latency_ms, 10.0);
        assert_eq!(s.max_latency_ms, 30.0);
        assert_eq!(s.avg_latency_ms, 20.0);
    }

    #[test]
    fn unset_min_reads_zero() {
        let s = Statistics::new().snapshot();
        assert_eq!(s.min_latency_ms, 0.0);
        assert_eq!(s.max_latency_ms, 0.0);
        assert_eq!(s.current_host, "N/A");
    }

    #[test]
    fn error_histogram() {
        let stats = Statistics::new();
        stats.record_error("connection_failed");
        stats.record_error("retry");
        stats.record_error("retry");
        let s = stats.snapshot();
        assert_eq!(s.total_errors, 3);
        assert_eq!(s.error_counts["retry"], 2);
        assert_eq!(s.error_counts["connection_failed"], 1);
    }

    #[test]
    fn dns_and_connection_counters() {
        let stats = Statistics::new();
        stats.record_dns_lookup(Duration::from_millis(12), false);
        stats.record_dns_lookup(Duration::ZERO, true);
        stats.record_connection(false);
        stats.record_connection(true);
        stats.record_connection(true);
        let s = stats.snapshot();
        assert_eq!(s.dns_lookups, 2);
        assert_eq!(s.dns_cache_hits, 1);
        assert_eq!(s.avg_dns_ms, 6.0);
        assert_eq!(s.connections_created, 1);
        assert_eq!(s.connections_reused, 2);
    }

    #[test]
    fn reset_clears_everything() {
        let stats = Statistics::new();
        stats.record_request(Duration::from_millis(5), 10);
        stats.record_error("send_failed");
        stats.set_current_host("example");
        stats.reset();
        let s = stats.snapshot();
        assert_eq!(s.total_requests, 0);
        assert_eq!(s.total_errors, 0);
        assert!(s.error_counts.is_empty());
        assert_eq!(s.current_host, "N/A");
        assert_eq!(s.min_latency_ms, 0.0);
    }

    #[test]
    fn concurrent_recording() {
        use std::sync::Arc;
        let stats = Arc::new(Statistics::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for i in 0..1000u64 {
                    stats.record_request(Duration::from_millis(i % 50), 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let s = stats.snapshot();
        assert_eq!(s.total_requests, 8000);
        assert_eq!(s.total_bytes_received, 8000);
        assert_eq!(s.min_latency_ms, 0.0);
        assert_eq!(s.max_latency_ms, 49.0);
    }
}
