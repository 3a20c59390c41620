/*
 * dialer.rs
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

//! RFC 8305 Happy Eyeballs v2: race connection attempts with staggered
//! starts, IPv6 bucket first with a short head start, then IPv4, then IPv6
//! again with whatever budget remains. Losing attempts are aborted, which
//! closes their sockets.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Stagger between successive attempts within one address bucket.
pub const CONNECTION_ATTEMPT_DELAY: Duration = Duration::from_millis(250);
/// Head start granted to the IPv6 bucket before IPv4 is tried.
pub const RESOLUTION_DELAY: Duration = Duration::from_millis(50);

/// One non-blocking connect attempt with the socket options every Ragno
/// connection carries.
async fn attempt(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_nodelay(true)?;
    socket.set_keepalive(true)?;
    socket.connect(addr).await
}

/// Race one bucket of addresses: start attempts in order, each
/// CONNECTION_ATTEMPT_DELAY after the previous one, and return the first
/// attempt that completes the TCP handshake.
async fn connect_staggered(addrs: &[SocketAddr], budget: Duration) -> io::Result<TcpStream> {
    let deadline = Instant::now() + budget;
    let mut attempts: JoinSet<io::Result<TcpStream>> = JoinSet::new();
    let mut last_err: Option<io::Error> = None;

    let mut pending = addrs.iter().copied();
    match pending.next() {
        Some(addr) => {
            attempts.spawn(attempt(addr));
        }
        None => {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no addresses to dial",
            ))
        }
    }
    let mut next = pending.next();

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        // Wait until the next stagger point, or the bucket deadline once all
        // attempts have been launched.
        let window_end = if next.is_some() {
            (now + CONNECTION_ATTEMPT_DELAY).min(deadline)
        } else {
            deadline
        };

        loop {
            match tokio::time::timeout_at(window_end, attempts.join_next()).await {
                Ok(Some(Ok(Ok(stream)))) => {
                    attempts.abort_all();
                    return Ok(stream);
                }
                Ok(Some(Ok(Err(e)))) => last_err = Some(e),
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => break,
            }
        }

        match next.take() {
            Some(addr) => {
                attempts.spawn(attempt(addr));
                next = pending.next();
            }
            None if attempts.is_empty() => break,
            None => {}
        }
    }

    attempts.abort_all();
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::TimedOut, "connection attempts timed out")
    }))
}

/// Dual-stack dialer over a resolved address list.
pub struct HappyEyeballs {
    v6: Vec<SocketAddr>,
    v4: Vec<SocketAddr>,
}

impl HappyEyeballs {
    /// Partition resolved addresses into family buckets, keeping OS order
    /// within each bucket.
    pub fn new(addrs: &[SocketAddr]) -> Self {
        let (v6, v4) = addrs.iter().copied().partition(|a| a.is_ipv6());
        HappyEyeballs { v6, v4 }
    }

    /// Connect within an overall deadline. IPv6 gets RESOLUTION_DELAY to win
    /// outright, IPv4 runs with the remaining budget, and IPv6 is retried
    /// with whatever is left after that.
    pub async fn connect(&self, timeout: Duration) -> io::Result<TcpStream> {
        if self.v6.is_empty() && self.v4.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no addresses to dial",
            ));
        }
        let start = Instant::now();

        if !self.v6.is_empty() {
            if let Ok(stream) = connect_staggered(&self.v6, RESOLUTION_DELAY).await {
                return Ok(stream);
            }
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if !self.v4.is_empty() && !remaining.is_zero() {
            match connect_staggered(&self.v4, remaining).await {
                Ok(stream) => return Ok(stream),
                Err(e) if self.v6.is_empty() => return Err(e),
                Err(_) => {}
            }
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if !self.v6.is_empty() && !remaining.is_zero() {
            return connect_staggered(&self.v6, remaining).await;
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "connection attempts timed out",
        ))
    }
}
