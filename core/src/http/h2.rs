/*
 * h2.rs
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

//! HTTP/2 placeholder. The executor negotiates http/1.1 only; this session
//! type exists so `Response::used_http2` has a future owner.

use std::io;

use crate::http::request::Request;
use crate::http::response::Response;

/// Stub HTTP/2 session over an established connection.
pub struct H2Session;

impl H2Session {
    // TODO: implement HTTP/2 (ALPN h2, connection preface, HPACK, stream
    // multiplexing) and route executor requests here when negotiated.
    pub async fn request(&mut self, _request: &Request) -> io::Result<Response> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "HTTP/2 not yet implemented",
        ))
    }
}
