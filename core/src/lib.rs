/*
 * lib.rs
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

//! Ragno core: a bulk HTTP/1.1 fetch engine.
//!
//! The request pipeline: the executor consults the rate limiter, takes a
//! warm connection from the keep-alive pool or dials one (DNS cache, Happy
//! Eyeballs racing, TLS), frames the request, reads the response under an
//! inactivity timeout, and releases the connection for reuse. Retries,
//! redirect chasing, batch fan-out and segmented Range downloads sit on top.
//! Statistics and progress counters are exposed for the CLI layers; nothing
//! in here renders them.

pub mod compress;
pub mod dialer;
pub mod dns;
pub mod download;
pub mod http;
pub mod limit;
pub mod net;
pub mod pool;
pub mod progress;
pub mod stats;
pub mod url;

pub use http::{ClientConfig, HttpClient, Method, Request, Response};
pub use progress::Progress;
pub use stats::{Statistics, StatsSnapshot};
pub use url::Url;
