/*
 * url.rs
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

//! Minimal http/https URL: scheme://host[:port][/path][?query].
//! No userinfo, no fragment, no percent-decoding, no IPv6 literals.

/// Parsed URL. Immutable after parse; `port` is filled from the scheme default
/// (80/443) when the input has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: String,
}

impl Url {
    /// Default port for a scheme: 443 for https, 80 otherwise.
    pub fn default_port(scheme: &str) -> u16 {
        if scheme == "https" {
            443
        } else {
            80
        }
    }

    /// Parse a URL string. Returns None when "://" is absent, the port is not
    /// a number, or the host is empty.
    pub fn parse(input: &str) -> Option<Url> {
        let scheme_end = input.find("://")?;
        let scheme = input[..scheme_end].to_ascii_lowercase();
        let rest = &input[scheme_end + 3..];

        // Host runs until the first '/' or '?', whichever comes first.
        let slash = rest.find('/');
        let qmark = rest.find('?');
        let host_end = match (slash, qmark) {
            (Some(s), Some(q)) => s.min(q),
            (Some(s), None) => s,
            (None, Some(q)) => q,
            (None, None) => rest.len(),
        };

        let host_port = &rest[..host_end];
        let (host, port) = match host_port.find(':') {
            Some(colon) => {
                let port: u16 = host_port[colon + 1..].parse().ok()?;
                (host_port[..colon].to_string(), port)
            }
            None => (host_port.to_string(), Self::default_port(&scheme)),
        };
        if host.is_empty() {
            return None;
        }

        let (path, query) = match (slash, qmark) {
            (Some(s), Some(q)) if s < q => (rest[s..q].to_string(), rest[q + 1..].to_string()),
            (Some(s), None) => (rest[s..].to_string(), String::new()),
            (_, Some(q)) => ("/".to_string(), rest[q + 1..].to_string()),
            (None, None) => ("/".to_string(), String::new()),
        };

        Some(Url {
            scheme,
            host,
            port,
            path,
            query,
        })
    }

    /// True when the scheme requires TLS.
    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }
}

/// Formats back to the canonical string; the port is omitted when it is the
/// scheme default, so parsing the output reproduces the same Url.
impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if self.port != Self::default_port(&self.scheme) {
            write!(f, ":{}", self.port)?;
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}
