/*
 * segmented.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the parallel segmented downloader against a
 * loopback server that honors Range requests.
 *
 * Run with:
 *   cargo test -p ragno_core --test segmented
 */

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ragno_core::download;
use ragno_core::http::{ClientConfig, HttpClient, Method, Request};
use ragno_core::url::Url;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Parse "Range: bytes=START-[END]" out of a request head.
fn parse_range(head: &str, total: usize) -> Option<(usize, usize)> {
    let line = head
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("range:"))?;
    let range = line.split('=').nth(1)?.trim();
    let (start, end) = range.split_once('-')?;
    let start: usize = start.trim().parse().ok()?;
    let end: usize = match end.trim() {
        "" => total - 1,
        e => e.parse().ok()?,
    };
    Some((start, end.min(total - 1)))
}

/// Loopback server for a fixed resource: answers HEAD with size and
/// Accept-Ranges, 206 for Range GETs, 200 with the whole body otherwise.
/// Every Range header seen is appended to `seen_ranges`.
async fn spawn_range_server(
    body: Vec<u8>,
    with_ranges: bool,
    seen_ranges: Arc<Mutex<Vec<String>>>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = Arc::new(body);

    tokio::spawn(async move {
        loop {
            let (mut sock, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let body = Arc::clone(&body);
            let seen_ranges = Arc::clone(&seen_ranges);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let end = buf.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
                    let head = String::from_utf8_lossy(&buf[..end]).to_string();
                    buf.drain(..end);

                    let ranges_line = head
                        .lines()
                        .find(|l| l.to_ascii_lowercase().starts_with("range:"))
                        .map(|l| l.trim().to_string());
                    if let Some(line) = &ranges_line {
                        seen_ranges.lock().unwrap().push(line.clone());
                    }

                    let accept_ranges = if with_ranges {
                        "Accept-Ranges: bytes\r\n"
                    } else {
                        ""
                    };

                    let out: Vec<u8> = if head.starts_with("HEAD ") {
                        format!(
                            "HTTP/1.1 200 OK\r\n{}Content-Length: {}\r\n\r\n",
                            accept_ranges,
                            body.len()
                        )
                        .into_bytes()
                    } else if let (true, Some((start, end))) =
                        (with_ranges, parse_range(&head, body.len()))
                    {
                        let part = &body[start..=end];
                        let mut out = format!(
                            "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n\r\n",
                            start,
                            end,
                            body.len(),
                            part.len()
                        )
                        .into_bytes();
                        out.extend_from_slice(part);
                        out
                    } else {
                        let mut out = format!(
                            "HTTP/1.1 200 OK\r\n{}Content-Length: {}\r\n\r\n",
                            accept_ranges,
                            body.len()
                        )
                        .into_bytes();
                        out.extend_from_slice(&body);
                        out
                    };

                    if sock.write_all(&out).await.is_err() {
                        return;
                    }
                    sock.flush().await.ok();
                }
            });
        }
    });

    addr
}

fn request_for(addr: SocketAddr) -> Request {
    let url = Url::parse(&format!("http://127.0.0.1:{}/file.bin", addr.port())).unwrap();
    Request::new(Method::Get, url)
}

#[tokio::test]
async fn segmented_matches_single_stream() {
    let body = payload(1_000_000);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let addr = spawn_range_server(body.clone(), true, Arc::clone(&seen)).await;

    let client = HttpClient::new();
    let template = request_for(addr);

    let probe = download::probe(&client, &template).await;
    assert_eq!(probe.status_code, 200);
    assert_eq!(probe.content_length, 1_000_000);
    assert!(probe.accepts_ranges);

    let assembled = download::fetch(
        &template,
        probe.content_length,
        4,
        &ClientConfig::default(),
        client.progress(),
    )
    .await;
    assert_eq!(assembled.len(), 1_000_000);
    assert_eq!(assembled, body);

    // Cross-check against the plain single-stream GET.
    let single = client.request(&template).await;
    assert_eq!(single.status_code, 200);
    assert_eq!(single.body, assembled);

    let stats = client.stats().snapshot();
    assert!(stats.connections_created >= 1);

    // Four workers, four ranges.
    assert_eq!(seen.lock().unwrap().len(), 4);
    let (downloaded, total) = client.progress().snapshot();
    assert_eq!(total, 1_000_000);
    assert!(downloaded >= 1_000_000);
}

#[tokio::test]
async fn non_divisible_length_uses_open_ended_tail() {
    let body = payload(1_003);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let addr = spawn_range_server(body.clone(), true, Arc::clone(&seen)).await;

    let client = HttpClient::new();
    let template = request_for(addr);
    let probe = download::probe(&client, &template).await;
    assert_eq!(probe.content_length, 1_003);

    let assembled = download::fetch(
        &template,
        probe.content_length,
        4,
        &ClientConfig::default(),
        client.progress(),
    )
    .await;
    assert_eq!(assembled, body);

    let seen = seen.lock().unwrap();
    assert!(
        seen.iter().any(|r| r.ends_with("bytes=750-")),
        "ranges seen: {:?}",
        *seen
    );
}

#[tokio::test]
async fn probe_without_accept_ranges() {
    let body = payload(4_096);
    let addr = spawn_range_server(body, false, Arc::new(Mutex::new(Vec::new()))).await;

    let client = HttpClient::new();
    let template = request_for(addr);
    let probe = download::probe(&client, &template).await;
    assert_eq!(probe.status_code, 200);
    assert_eq!(probe.content_length, 4_096);
    assert!(!probe.accepts_ranges);
}

#[tokio::test]
async fn failing_segment_fails_open() {
    // Server ignores Range (no 206 ever): every segment exhausts its
    // retries and the fetch must return empty for the caller to fall back.
    let body = payload(8_192);
    let addr = spawn_range_server(body, false, Arc::new(Mutex::new(Vec::new()))).await;

    let client = HttpClient::new();
    let template = request_for(addr);
    let assembled =
        download::fetch(&template, 8_192, 2, &ClientConfig::default(), client.progress()).await;
    assert!(assembled.is_empty());
}
