/*
 * download.rs
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

//! Parallel segmented download: a HEAD probe establishes size and Range
//! support, then N workers fetch contiguous byte ranges concurrently and the
//! parts are concatenated in order. Any persistent segment failure makes the
//! whole fetch fail open (empty result) so the caller can fall back to a
//! single-stream GET.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::http::{ClientConfig, HttpClient, Method, Request};
use crate::progress::Progress;

const HEAD_TIMEOUT: Duration = Duration::from_secs(5);
const SEGMENT_ATTEMPTS: u32 = 3;
const SEGMENT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What the HEAD probe learned about the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadProbe {
    pub status_code: u16,
    pub content_length: u64,
    pub accepts_ranges: bool,
}

/// Issue a short-timeout HEAD for the template's URL and report size and
/// Accept-Ranges support.
pub async fn probe(client: &HttpClient, template: &Request) -> HeadProbe {
    let mut head = template.clone();
    head.method = Method::Head;
    head.timeout = HEAD_TIMEOUT;
    let resp = client.request(&head).await;
    HeadProbe {
        status_code: resp.status_code,
        content_length: resp.content_length().unwrap_or(0),
        accepts_ranges: resp.accepts_byte_ranges(),
    }
}

/// Partition `content_length` bytes into `segments` contiguous ranges. Every
/// segment but the last is inclusive start-end; the last is open-ended so it
/// absorbs the division remainder.
fn ranges(content_length: u64, segments: usize) -> Vec<(u64, Option<u64>)> {
    if segments < 2 || content_length == 0 {
        return Vec::new();
    }
    let segment_size = content_length / segments as u64;
    if segment_size == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(segments);
    for i in 0..segments as u64 {
        let start = i * segment_size;
        if i == segments as u64 - 1 {
            out.push((start, None));
        } else {
            out.push((start, Some((i + 1) * segment_size - 1)));
        }
    }
    out
}

fn range_header(start: u64, end: Option<u64>) -> String {
    match end {
        Some(end) => format!("bytes={}-{}", start, end),
        None => format!("bytes={}-", start),
    }
}

/// Fetch the resource in `segments` parallel Range requests. Each worker owns
/// an independent client (fresh pool) so segment connections never contend on
/// one pool lock; all workers feed the shared progress counters. Returns the
/// reassembled body, or empty when any segment never produced a 206.
pub async fn fetch(
    template: &Request,
    content_length: u64,
    segments: usize,
    config: &ClientConfig,
    progress: Arc<Progress>,
) -> Vec<u8> {
    let plan = ranges(content_length, segments);
    if plan.is_empty() {
        return Vec::new();
    }
    progress.set_total(content_length);

    let failed = Arc::new(AtomicBool::new(false));
    let mut workers: JoinSet<(usize, Vec<u8>)> = JoinSet::new();

    for (index, (start, end)) in plan.into_iter().enumerate() {
        let mut req = template.clone();
        req.header("Range", range_header(start, end));
        let config = config.clone();
        let progress = Arc::clone(&progress);
        let failed = Arc::clone(&failed);

        workers.spawn(async move {
            let worker = HttpClient::with_progress(config, progress);
            let mut attempts = 0;
            loop {
                if attempts > 0 {
                    sleep(SEGMENT_RETRY_DELAY).await;
                }
                let resp = worker.request(&req).await;
                attempts += 1;
                if resp.status_code == 206 {
                    return (index, resp.body);
                }
                if attempts >= SEGMENT_ATTEMPTS {
                    failed.store(true, Ordering::Relaxed);
                    return (index, Vec::new());
                }
            }
        });
    }

    let mut parts: Vec<Vec<u8>> = vec![Vec::new(); segments];
    while let Some(joined) = workers.join_next().await {
        if let Ok((index, body)) = joined {
            parts[index] = body;
        }
    }

    if failed.load(Ordering::Relaxed) {
        return Vec::new();
    }

    let mut body = Vec::with_capacity(content_length as usize);
    for part in parts {
        body.extend_from_slice(&part);
    }
    body
}
