/*
 * request.rs
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

//! HTTP request: method, URL, ordered headers, optional body, and the
//! per-request execution knobs (inactivity timeout, redirects, retries).

use std::time::Duration;

use crate::url::Url;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Other(&'static str),
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s,
        }
    }
}

/// A single request. Headers keep insertion order for the wire; names are
/// matched case-insensitively when the executor decides which defaults to
/// add. `timeout` is an inactivity timeout, not a total deadline.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub enable_compression: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub exponential_backoff: bool,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
            timeout: Duration::from_secs(30),
            follow_redirects: false,
            max_redirects: 10,
            enable_compression: true,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
            exponential_backoff: true,
        }
    }

    /// Add or replace a header. An existing header with the same name
    /// (case-insensitive) is overwritten in place, keeping its position.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Case-insensitive presence check, used when filling default headers.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn body(&mut self, data: Vec<u8>) -> &mut Self {
        self.body = data;
        self
    }
}
