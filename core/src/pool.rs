/*
 * pool.rs
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

//! Keep-alive connection pool keyed by origin (host, port, TLS). Acquire
//! hands ownership of an idle connection to the caller after a liveness
//! probe; release returns it. The pool never dials: connection setup is the
//! executor's job so DNS and TCP timings land in the stats sink.

use std::collections::HashMap;
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tokio::io::ReadBuf;
use tokio::time::Instant;

use crate::net::HttpStream;

/// Connection-sharing equivalence: two requests reuse a socket iff their
/// keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// A pooled stream plus the bookkeeping the idle sweep needs. While acquired,
/// the caller owns it exclusively; the pool only holds idle entries.
pub struct PooledConnection {
    pub stream: HttpStream,
    last_used: Instant,
}

impl PooledConnection {
    pub fn new(stream: HttpStream) -> Self {
        PooledConnection {
            stream,
            last_used: Instant::now(),
        }
    }
}

/// Waker-less peek at the underlying socket: a quiet or readable socket is
/// alive, EOF or a hard error means the peer is gone.
fn probe_alive(stream: &HttpStream) -> bool {
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    let mut cx = Context::from_waker(Waker::noop());
    match stream.tcp().poll_peek(&mut cx, &mut buf) {
        Poll::Pending => true,
        Poll::Ready(Ok(0)) => false,
        Poll::Ready(Ok(_)) => true,
        Poll::Ready(Err(_)) => false,
    }
}

/// Idle keep-alive connections per origin, bounded overall by
/// `max_connections`; entries idle past `idle_timeout` are closed by
/// `cleanup_idle`.
pub struct ConnectionPool {
    max_connections: usize,
    idle_timeout: Duration,
    pools: Mutex<HashMap<PoolKey, Vec<PooledConnection>>>,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, idle_timeout: Duration) -> Self {
        ConnectionPool {
            max_connections,
            idle_timeout,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Take an idle, still-live connection for this origin. Scans newest to
    /// oldest; dead entries found on the way are closed and dropped. None
    /// means the caller must dial a fresh connection.
    pub fn acquire(&self, host: &str, port: u16, use_tls: bool) -> Option<PooledConnection> {
        let key = PoolKey {
            host: host.to_string(),
            port,
            use_tls,
        };
        let mut pools = self.pools.lock().unwrap();
        let list = pools.get_mut(&key)?;
        while let Some(mut conn) = list.pop() {
            if !probe_alive(&conn.stream) {
                // Dead entry: dropping it closes the socket.
                continue;
            }
            conn.last_used = Instant::now();
            return Some(conn);
        }
        None
    }

    /// Return a connection after a cleanly finished request. Over capacity
    /// the connection is closed instead of pooled.
    pub fn release(&self, host: &str, port: u16, mut conn: PooledConnection) {
        let key = PoolKey {
            host: host.to_string(),
            port,
            use_tls: conn.stream.is_tls(),
        };
        conn.last_used = Instant::now();

        let mut pools = self.pools.lock().unwrap();
        let total: usize = pools.values().map(Vec::len).sum();
        if total >= self.max_connections {
            return; // dropped, socket closed
        }
        pools.entry(key).or_default().push(conn);
    }

    /// Close every connection idle past the pool's idle timeout.
    pub fn cleanup_idle(&self) {
        let mut pools = self.pools.lock().unwrap();
        for list in pools.values_mut() {
            list.retain(|conn| conn.last_used.elapsed() < self.idle_timeout);
        }
        pools.retain(|_, list| !list.is_empty());
    }

    /// Number of idle connections currently pooled (all origins).
    pub fn idle_count(&self) -> usize {
        self.pools.lock().unwrap().values().map(Vec::len).sum()
    }
}
