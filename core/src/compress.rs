/*
 * compress.rs
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

//! Content-Encoding codecs: detection plus gzip, raw deflate and brotli
//! decode (encode kept alongside for round-trip use).

use std::io::{Read, Write};

/// Upper bound on a decompressed body. Anything larger is treated as a
/// decode failure rather than an allocation request.
const MAX_DECOMPRESSED: u64 = 1 << 30;

/// Supported response content encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Gzip,
    Deflate,
    Brotli,
}

/// Scan a Content-Encoding value for a supported codec. Substring match,
/// case-insensitive; br is checked before gzip so "br" wins when both appear.
pub fn detect_from_header(content_encoding: &str) -> CompressionType {
    let lower = content_encoding.to_ascii_lowercase();
    if lower.contains("br") {
        CompressionType::Brotli
    } else if lower.contains("gzip") {
        CompressionType::Gzip
    } else if lower.contains("deflate") {
        CompressionType::Deflate
    } else {
        CompressionType::None
    }
}

/// Value for the Accept-Encoding request header.
pub fn accept_encoding() -> &'static str {
    "br, gzip, deflate"
}

fn read_bounded<R: Read>(mut reader: R, estimate: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(estimate.min(MAX_DECOMPRESSED as usize));
    let mut limited = (&mut reader).take(MAX_DECOMPRESSED + 1);
    limited.read_to_end(&mut out).ok()?;
    if out.len() as u64 > MAX_DECOMPRESSED {
        return None;
    }
    Some(out)
}

/// Decompress a body. `CompressionType::None` passes the bytes through;
/// decode failure yields None so the caller can keep the wire body.
pub fn decompress(data: &[u8], kind: CompressionType) -> Option<Vec<u8>> {
    if data.is_empty() {
        return Some(Vec::new());
    }
    // Estimate 3x expansion for the initial buffer.
    let estimate = data.len().saturating_mul(3);
    match kind {
        CompressionType::None => Some(data.to_vec()),
        CompressionType::Gzip => read_bounded(flate2::read::GzDecoder::new(data), estimate),
        CompressionType::Deflate => read_bounded(flate2::read::DeflateDecoder::new(data), estimate),
        CompressionType::Brotli => read_bounded(brotli::Decompressor::new(data, 8192), estimate),
    }
}

/// Compress a body with the given codec (level is codec-specific, 0-11 for
/// brotli, 0-9 for the zlib family).
pub fn compress(data: &[u8], kind: CompressionType, level: u32) -> Option<Vec<u8>> {
    if data.is_empty() {
        return Some(Vec::new());
    }
    match kind {
        CompressionType::None => Some(data.to_vec()),
        CompressionType::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            enc.write_all(data).ok()?;
            enc.finish().ok()
        }
        CompressionType::Deflate => {
            let mut enc =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::new(level));
            enc.write_all(data).ok()?;
            enc.finish().ok()
        }
        CompressionType::Brotli => {
            let mut out = Vec::new();
            {
                let mut enc = brotli::CompressorWriter::new(&mut out, 4096, level, 22);
                enc.write_all(data).ok()?;
                enc.flush().ok()?;
            }
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_is_case_insensitive_substring() {
        assert_eq!(detect_from_header("gzip"), CompressionType::Gzip);
        assert_eq!(detect_from_header("GZIP"), CompressionType::Gzip);
        assert_eq!(detect_from_header("x-deflate"), CompressionType::Deflate);
        assert_eq!(detect_from_header("br"), CompressionType::Brotli);
        assert_eq!(detect_from_header("gzip, br"), CompressionType::Brotli);
        assert_eq!(detect_from_header("identity"), CompressionType::None);
        assert_eq!(detect_from_header(""), CompressionType::None);
    }

    #[test]
    fn accept_encoding_lists_codecs() {
        assert_eq!(accept_encoding(), "br, gzip, deflate");
    }

    #[test]
    fn round_trip_each_codec() {
        let body: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_le_bytes()).collect();
        for kind in [
            CompressionType::Gzip,
            CompressionType::Deflate,
            CompressionType::Brotli,
        ] {
            let packed = compress(&body, kind, 5).unwrap();
            assert_ne!(packed, body);
            let unpacked = decompress(&packed, kind).unwrap();
            assert_eq!(unpacked, body, "{:?}", kind);
        }
    }

    #[test]
    fn none_passes_through() {
        let body = b"hello".to_vec();
        assert_eq!(decompress(&body, CompressionType::None).unwrap(), body);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(decompress(&[], CompressionType::Gzip).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn garbage_fails_cleanly() {
        assert!(decompress(b"not a gzip stream", CompressionType::Gzip).is_none());
        assert!(decompress(b"junk junk junk", CompressionType::Brotli).is_none());
    }
}
