/*
 * response.rs
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

//! HTTP/1.1 response model and wire parsing: status line, headers, chunked
//! and Content-Length body extraction, transparent decompression.
//! `status_code` 0 marks a transport failure that produced no response.

use std::collections::HashMap;
use std::time::Duration;

use crate::compress::{self, CompressionType};

/// Parsed response. `bytes_received` counts the wire body before any
/// decompression; `body` is the final (decompressed) payload.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status_code: u16,
    pub status_message: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub elapsed_time: Duration,
    pub bytes_received: u64,
    pub was_compressed: bool,
    pub used_http2: bool,
    pub redirect_count: u32,
}

/// What the executor needs to know mid-read, parsed once when the header
/// block is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WirePrelude {
    pub headers_end: usize,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// Index just past the CRLFCRLF header terminator, if present.
pub(crate) fn find_headers_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Leading digit run of a header value, e.g. Content-Length.
fn parse_digits(value: &str) -> u64 {
    let mut n: u64 = 0;
    for c in value.trim().bytes() {
        if c.is_ascii_digit() {
            n = n.saturating_mul(10) + (c - b'0') as u64;
        } else {
            break;
        }
    }
    n
}

/// Scan a complete header block for the framing the read loop needs.
pub(crate) fn scan_prelude(data: &[u8]) -> Option<WirePrelude> {
    let headers_end = find_headers_end(data)?;
    let mut content_length = None;
    let mut chunked = false;
    for line in data[..headers_end].split(|&b| b == b'\n').skip(1) {
        let line = String::from_utf8_lossy(line);
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim_end_matches('\r').trim();
            if key == "content-length" {
                content_length = Some(parse_digits(value));
            } else if key == "transfer-encoding" && value.to_ascii_lowercase().contains("chunked") {
                chunked = true;
            }
        }
    }
    Some(WirePrelude {
        headers_end,
        content_length,
        chunked,
    })
}

/// True once the terminating 0-size chunk pattern appears at or after
/// `from`. The caller passes a resume point so repeated scans stay linear.
pub(crate) fn contains_terminal_chunk(data: &[u8], from: usize) -> bool {
    if data.len() < 5 {
        return false;
    }
    let from = from.min(data.len());
    data[from..].windows(5).any(|w| w == b"0\r\n\r\n")
}

/// Decode a chunked body: hex size line, that many bytes, CRLF, until the
/// zero chunk. Incomplete trailing chunks are dropped.
fn dechunk(data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let line_end = match data[pos..].windows(2).position(|w| w == b"\r\n") {
            Some(i) => pos + i,
            None => break,
        };
        let size_line = String::from_utf8_lossy(&data[pos..line_end]);
        let hex_part = size_line.split(';').next().unwrap_or("").trim();
        let chunk_size = match usize::from_str_radix(hex_part, 16) {
            Ok(n) => n,
            Err(_) => break,
        };
        if chunk_size == 0 {
            break;
        }
        pos = line_end + 2;
        if pos + chunk_size <= data.len() {
            body.extend_from_slice(&data[pos..pos + chunk_size]);
        }
        pos += chunk_size + 2; // chunk data + CRLF
    }
    body
}

impl Response {
    /// Transport failure placeholder: no response was produced.
    pub fn failure() -> Self {
        Response::default()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content-Length as a digit run, when present.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").map(parse_digits)
    }

    /// True when Accept-Ranges advertises byte ranges.
    pub fn accepts_byte_ranges(&self) -> bool {
        self.header("accept-ranges")
            .map(|v| v.to_ascii_lowercase().contains("bytes"))
            .unwrap_or(false)
    }

    /// Parse a complete wire response. An empty or headerless buffer yields
    /// the failure response; a truncated body yields whatever was received.
    pub(crate) fn parse(data: &[u8], enable_decompression: bool) -> Response {
        let mut resp = Response::default();
        if data.is_empty() {
            return resp;
        }
        let headers_end = match find_headers_end(data) {
            Some(n) => n,
            None => return resp,
        };

        let mut lines = data[..headers_end].split(|&b| b == b'\n');

        // Status line: HTTP/1.1 SP code SP message
        if let Some(status_line) = lines.next() {
            let status_line = String::from_utf8_lossy(status_line);
            let status_line = status_line.trim_end_matches('\r');
            let mut parts = status_line.splitn(3, ' ');
            let _version = parts.next();
            resp.status_code = parts
                .next()
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(0);
            resp.status_message = parts.next().unwrap_or("").to_string();
        }

        let mut compression = CompressionType::None;
        for line in lines {
            let line = String::from_utf8_lossy(line);
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                if enable_decompression && key.eq_ignore_ascii_case("content-encoding") {
                    compression = compress::detect_from_header(value);
                }
                resp.headers.insert(key.to_string(), value.to_string());
            }
        }

        if headers_end < data.len() {
            let chunked = resp
                .header("transfer-encoding")
                .map(|v| v.to_ascii_lowercase().contains("chunked"))
                .unwrap_or(false);
            resp.body = if chunked {
                dechunk(&data[headers_end..])
            } else {
                data[headers_end..].to_vec()
            };
        }
        resp.bytes_received = resp.body.len() as u64;

        if enable_decompression && compression != CompressionType::None && !resp.body.is_empty() {
            match compress::decompress(&resp.body, compression) {
                Some(plain) => {
                    resp.body = plain;
                    resp.was_compressed = true;
                }
                None => {} // keep the wire body, flag stays false
            }
        }

        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_headers_and_body() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let resp = Response::parse(wire, true);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.status_message, "OK");
        assert_eq!(resp.header("content-type"), Some("text/plain"));
        assert_eq!(resp.content_length(), Some(5));
        assert_eq!(resp.body, b"hello");
        assert_eq!(resp.bytes_received, 5);
    }

    #[test]
    fn status_without_reason() {
        let resp = Response::parse(b"HTTP/1.1 204\r\n\r\n", true);
        assert_eq!(resp.status_code, 204);
        assert_eq!(resp.status_message, "");
        assert!(resp.body.is_empty());
    }

    #[test]
    fn empty_or_headerless_input_is_failure() {
        assert_eq!(Response::parse(b"", true).status_code, 0);
        assert_eq!(Response::parse(b"HTTP/1.1 200 OK\r\npartial", true).status_code, 0);
    }

    #[test]
    fn dechunks_split_body() {
        let wire =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhe\r\n3\r\nllo\r\n0\r\n\r\n";
        let resp = Response::parse(wire, true);
        assert_eq!(resp.body, b"hello");
        assert_eq!(resp.bytes_received, 5);
    }

    #[test]
    fn zero_length_chunked_body() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n";
        let resp = Response::parse(wire, true);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn chunk_extension_is_ignored() {
        let wire =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5;ext=1\r\nhello\r\n0\r\n\r\n";
        let resp = Response::parse(wire, true);
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn last_header_value_wins() {
        let wire = b"HTTP/1.1 200 OK\r\nX-Tag: one\r\nX-Tag: two\r\nContent-Length: 0\r\n\r\n";
        let resp = Response::parse(wire, true);
        assert_eq!(resp.header("x-tag"), Some("two"));
    }

    #[test]
    fn gzip_body_is_decompressed() {
        let packed = compress::compress(b"abcabcabc", CompressionType::Gzip, 6).unwrap();
        let mut wire = format!(
            "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            packed.len()
        )
        .into_bytes();
        let wire_body_len = packed.len() as u64;
        wire.extend_from_slice(&packed);

        let resp = Response::parse(&wire, true);
        assert!(resp.was_compressed);
        assert_eq!(resp.body, b"abcabcabc");
        assert_eq!(resp.bytes_received, wire_body_len);
    }

    #[test]
    fn broken_compressed_body_is_kept_raw() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: 4\r\n\r\njunk";
        let resp = Response::parse(wire, true);
        assert!(!resp.was_compressed);
        assert_eq!(resp.body, b"junk");
    }

    #[test]
    fn decompression_disabled_leaves_body() {
        let packed = compress::compress(b"payload", CompressionType::Gzip, 6).unwrap();
        let mut wire =
            b"HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\n\r\n".to_vec();
        wire.extend_from_slice(&packed);
        let resp = Response::parse(&wire, false);
        assert!(!resp.was_compressed);
        assert_eq!(resp.body, packed);
    }

    #[test]
    fn prelude_reports_framing() {
        let p = scan_prelude(b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nrest").unwrap();
        assert_eq!(p.headers_end, 39);
        assert_eq!(p.content_length, Some(12));
        assert!(!p.chunked);

        let p = scan_prelude(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap();
        assert!(p.chunked);
        assert_eq!(p.content_length, None);

        assert!(scan_prelude(b"HTTP/1.1 200 OK\r\nno-end-yet").is_none());
    }

    #[test]
    fn terminal_chunk_detection_resumes() {
        let data = b"junkjunk0\r\n\r\n";
        assert!(contains_terminal_chunk(data, 0));
        assert!(contains_terminal_chunk(data, 8));
        assert!(!contains_terminal_chunk(b"0\r\n\r", 0));
        assert!(!contains_terminal_chunk(data, data.len()));
    }

    #[test]
    fn accept_ranges_detection() {
        let wire = b"HTTP/1.1 200 OK\r\nAccept-Ranges: bytes\r\nContent-Length: 0\r\n\r\n";
        assert!(Response::parse(wire, true).accepts_byte_ranges());
        let wire = b"HTTP/1.1 200 OK\r\nAccept-Ranges: none\r\nContent-Length: 0\r\n\r\n";
        assert!(!Response::parse(wire, true).accepts_byte_ranges());
    }
}
