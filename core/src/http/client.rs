/*
 * client.rs
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

//! Request executor: rate limit, pool acquire or dial (DNS cache + Happy
//! Eyeballs + TLS), frame and send, read under an inactivity timeout, parse,
//! release, chase redirects, retry with backoff, fan out batches.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};

use crate::dialer::HappyEyeballs;
use crate::dns::{self, DnsCache};
use crate::http::request::{Method, Request};
use crate::http::response::{contains_terminal_chunk, scan_prelude, Response, WirePrelude};
use crate::limit::RateLimiter;
use crate::net::{self, HttpStream};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::progress::Progress;
use crate::stats::Statistics;
use crate::url::Url;

/// Overall budget for the Happy Eyeballs dial of one request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Read buffer size; large so bulk downloads take few syscalls.
const READ_BUF_SIZE: usize = 128 * 1024;

/// Client construction knobs. Rate 0 means unlimited; `dns_cache_ttl` None
/// disables the resolver cache; `tls_verify` false keeps the permissive
/// certificate mode.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub enable_compression: bool,
    pub dns_cache_ttl: Option<Duration>,
    pub rate: f64,
    pub burst: usize,
    pub tls_verify: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            user_agent: "Ragno/0.1".to_string(),
            timeout: Duration::from_secs(30),
            max_connections: 200,
            idle_timeout: Duration::from_secs(90),
            enable_compression: true,
            dns_cache_ttl: None,
            rate: 0.0,
            burst: 0,
            tls_verify: false,
        }
    }
}

struct Inner {
    config: ClientConfig,
    pool: ConnectionPool,
    dns: Option<DnsCache>,
    limiter: RateLimiter,
    stats: Arc<Statistics>,
    progress: Arc<Progress>,
}

/// HTTP/1.1 client. Cheap to clone; clones share the pool, caches and sinks.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_progress(config, Arc::new(Progress::new()))
    }

    /// Build with an externally owned progress handle, so several clients
    /// (e.g. segment workers) can feed one set of counters.
    pub fn with_progress(config: ClientConfig, progress: Arc<Progress>) -> Self {
        let pool = ConnectionPool::new(config.max_connections, config.idle_timeout);
        let dns = config.dns_cache_ttl.map(DnsCache::new);
        let limiter = RateLimiter::new(config.rate, config.burst);
        HttpClient {
            inner: Arc::new(Inner {
                config,
                pool,
                dns,
                limiter,
                stats: Arc::new(Statistics::new()),
                progress,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> Arc<Statistics> {
        Arc::clone(&self.inner.stats)
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.inner.progress)
    }

    /// Replace the rate limit at runtime (burst 0 defaults to the rate).
    pub fn set_rate_limit(&self, rate: f64, burst: usize) {
        self.inner.limiter.set_rate(rate, burst);
    }

    /// Pre-resolve hosts into the DNS cache (https and http ports).
    pub async fn warmup_dns(&self, hosts: &[String]) {
        if let Some(cache) = &self.inner.dns {
            for host in hosts {
                cache.warmup(host, 443).await;
                cache.warmup(host, 80).await;
            }
        }
    }

    /// Drop idle pooled connections and expired DNS entries.
    pub fn cleanup_idle(&self) {
        self.inner.pool.cleanup_idle();
        if let Some(cache) = &self.inner.dns {
            cache.cleanup();
        }
    }

    /// Simple GET with the client's default timeout.
    pub async fn get(&self, url: &str) -> Response {
        let parsed = match Url::parse(url) {
            Some(u) => u,
            None => return Response::failure(),
        };
        let mut req = Request::new(Method::Get, parsed);
        req.timeout = self.inner.config.timeout;
        self.request(&req).await
    }

    /// Simple POST of opaque bytes.
    pub async fn post(&self, url: &str, body: Vec<u8>) -> Response {
        let parsed = match Url::parse(url) {
            Some(u) => u,
            None => return Response::failure(),
        };
        let mut req = Request::new(Method::Post, parsed);
        req.timeout = self.inner.config.timeout;
        req.header("Content-Type", "application/octet-stream");
        req.body = body;
        self.request(&req).await
    }

    /// Execute a request, applying the retry policy when configured.
    pub async fn request(&self, req: &Request) -> Response {
        if req.max_retries > 0 {
            self.execute_with_retry(req).await
        } else {
            self.perform(req).await
        }
    }

    /// Run N requests with at most `max_parallel` in flight. Each task
    /// carries its input index so results land in input order.
    pub async fn batch(&self, requests: Vec<Request>, max_parallel: usize) -> Vec<Response> {
        let mut responses: Vec<Response> = requests.iter().map(|_| Response::failure()).collect();
        let parallel = max_parallel.max(1);
        let mut queue = requests.into_iter().enumerate();
        let mut in_flight: JoinSet<(usize, Response)> = JoinSet::new();

        loop {
            while in_flight.len() < parallel {
                match queue.next() {
                    Some((index, req)) => {
                        let client = self.clone();
                        in_flight.spawn(async move { (index, client.request(&req).await) });
                    }
                    None => break,
                }
            }
            match in_flight.join_next().await {
                Some(Ok((index, resp))) => responses[index] = resp,
                Some(Err(_)) => {}
                None => break,
            }
        }
        responses
    }

    /// Retry wrapper: 5xx and transport failures are retried with (optionally
    /// exponential) backoff; the last real response survives exhaustion.
    async fn execute_with_retry(&self, req: &Request) -> Response {
        let max_attempts = req.max_retries + 1;
        let mut last = Response::failure();

        for attempt in 1..=max_attempts {
            last = self.perform(req).await;
            if last.status_code > 0 && last.status_code < 500 {
                return last;
            }
            if attempt < max_attempts {
                let delay = if req.exponential_backoff {
                    req.retry_delay * (1u32 << (attempt - 1).min(16))
                } else {
                    req.retry_delay
                };
                sleep(delay).await;
                self.inner.stats.record_error("retry");
            }
        }
        if last.status_code == 0 {
            self.inner.stats.record_error("max_retries_exceeded");
        }
        last
    }

    /// One request plus redirect chasing.
    async fn perform(&self, req: &Request) -> Response {
        let mut resp = self.execute(req).await;
        if !req.follow_redirects {
            return resp;
        }

        let mut remaining = req.max_redirects;
        let mut hops = 0u32;
        let mut current = req.clone();
        while (300..400).contains(&resp.status_code) && remaining > 0 {
            // Only absolute targets are followed; a relative Location ends
            // the chain and the 3xx response is returned as-is.
            let target = match resp.header("location").and_then(Url::parse) {
                Some(u) => u,
                None => break,
            };
            current.url = target;
            remaining -= 1;
            hops += 1;
            resp = self.execute(&current).await;
        }
        resp.redirect_count = hops;
        resp
    }

    /// The single-hop executor of the request pipeline.
    async fn execute(&self, req: &Request) -> Response {
        let start = Instant::now();
        let inner = &self.inner;
        let stats = &inner.stats;

        inner.limiter.acquire().await;

        let url = &req.url;
        let use_tls = url.is_https();
        stats.set_current_host(&url.host);
        stats.set_is_secure(use_tls);

        let mut conn = match inner.pool.acquire(&url.host, url.port, use_tls) {
            Some(existing) => {
                // Warm connection: no DNS, no handshake.
                stats.record_dns_lookup(Duration::ZERO, true);
                stats.record_tcp_handshake(Duration::ZERO);
                stats.record_connection(true);
                existing
            }
            None => {
                let dns_start = Instant::now();
                let resolved = match &inner.dns {
                    Some(cache) => cache.resolve(&url.host, url.port).await,
                    None => dns::resolve_host(&url.host, url.port)
                        .await
                        .map(|addrs| (addrs, false)),
                };
                let (addrs, cached) = resolved.unwrap_or_default();
                stats.record_dns_lookup(dns_start.elapsed(), cached);

                let tcp_start = Instant::now();
                let dialed = HappyEyeballs::new(&addrs).connect(CONNECT_TIMEOUT).await;
                stats.record_tcp_handshake(tcp_start.elapsed());

                let tcp = match dialed {
                    Ok(tcp) => tcp,
                    Err(_) => {
                        stats.record_error("connection_failed");
                        let mut resp = Response::failure();
                        resp.elapsed_time = start.elapsed();
                        return resp;
                    }
                };
                if let Ok(peer) = tcp.peer_addr() {
                    stats.set_current_ip(&peer.ip().to_string());
                }

                let stream = if use_tls {
                    match net::tls_handshake(tcp, &url.host, inner.config.tls_verify).await {
                        Ok(tls) => HttpStream::Tls(Box::new(tls)),
                        Err(_) => {
                            stats.record_error("tls_handshake_failed");
                            let mut resp = Response::failure();
                            resp.elapsed_time = start.elapsed();
                            return resp;
                        }
                    }
                } else {
                    HttpStream::Plain(tcp)
                };
                stats.record_connection(false);
                PooledConnection::new(stream)
            }
        };

        let head = build_request(req, &inner.config);
        let sent = async {
            conn.stream.write_all(head.as_bytes()).await?;
            if !req.body.is_empty() {
                conn.stream.write_all(&req.body).await?;
            }
            conn.stream.flush().await
        }
        .await;
        if sent.is_err() {
            // Dropping conn closes the socket.
            stats.record_error("send_failed");
            let mut resp = Response::failure();
            resp.elapsed_time = start.elapsed();
            return resp;
        }
        stats.record_bytes_sent((head.len() + req.body.len()) as u64);

        let (data, complete) = self
            .read_response(&mut conn.stream, req.timeout, req.method, start)
            .await;

        let mut resp = Response::parse(&data, req.enable_compression);
        resp.elapsed_time = start.elapsed();

        if complete {
            inner.pool.release(&url.host, url.port, conn);
        }
        // An incomplete exchange (timeout, transport error, truncated body)
        // drops the connection instead of poisoning the pool.

        stats.record_request(resp.elapsed_time, resp.bytes_received);
        resp
    }

    /// Read a response under the inactivity-timeout model: the clock restarts
    /// on every byte, a 0-byte read is a clean stream end. Returns the raw
    /// wire bytes and whether the response terminated cleanly.
    async fn read_response(
        &self,
        stream: &mut HttpStream,
        inactivity: Duration,
        method: Method,
        request_start: Instant,
    ) -> (BytesMut, bool) {
        let stats = &self.inner.stats;
        let progress = &self.inner.progress;

        let mut response = BytesMut::with_capacity(64 * 1024);
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut prelude: Option<WirePrelude> = None;
        let mut first_byte_seen = false;

        loop {
            let n = match timeout(inactivity, stream.read(&mut buf)).await {
                Err(_) => return (response, false), // stalled connection
                Ok(Err(_)) => return (response, false), // transport error: truncate
                Ok(Ok(0)) => {
                    // Clean close ends a read-until-close body; anything else
                    // was cut short.
                    let read_until_close = matches!(
                        prelude,
                        Some(WirePrelude {
                            chunked: false,
                            content_length: None,
                            ..
                        })
                    );
                    return (response, read_until_close);
                }
                Ok(Ok(n)) => n,
            };

            if !first_byte_seen {
                first_byte_seen = true;
                stats.record_first_byte(request_start.elapsed());
            }
            response.extend_from_slice(&buf[..n]);
            progress.add_downloaded(n as u64);

            if prelude.is_none() {
                prelude = scan_prelude(&response);
            }
            let p = match prelude {
                Some(p) => p,
                None => continue, // headers still incomplete
            };

            if method == Method::Head {
                return (response, true);
            }
            if p.chunked {
                // Resume a little before the new data in case the terminator
                // straddles two reads.
                let resume = p.headers_end.max(response.len().saturating_sub(n + 4));
                if contains_terminal_chunk(&response, resume) {
                    return (response, true);
                }
            } else if let Some(cl) = p.content_length {
                if (response.len() - p.headers_end) as u64 >= cl {
                    return (response, true);
                }
            }
        }
    }
}

/// Frame the request head: request line, Host, caller headers in order, then
/// the defaults the caller did not supply.
fn build_request(req: &Request, config: &ClientConfig) -> String {
    let url = &req.url;
    let mut out = String::with_capacity(512);

    out.push_str(req.method.as_str());
    out.push(' ');
    out.push_str(&url.path);
    if !url.query.is_empty() {
        out.push('?');
        out.push_str(&url.query);
    }
    out.push_str(" HTTP/1.1\r\n");

    out.push_str("Host: ");
    out.push_str(&url.host);
    if url.port != Url::default_port(&url.scheme) {
        out.push(':');
        out.push_str(&url.port.to_string());
    }
    out.push_str("\r\n");

    for (name, value) in &req.headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }

    if !req.has_header("user-agent") {
        out.push_str("User-Agent: ");
        out.push_str(&config.user_agent);
        out.push_str("\r\n");
    }
    if !req.has_header("connection") {
        out.push_str("Connection: keep-alive\r\n");
    }
    if !req.has_header("accept") {
        out.push_str("Accept: */*\r\n");
    }
    if !req.has_header("accept-encoding") && req.enable_compression && config.enable_compression {
        out.push_str("Accept-Encoding: ");
        out.push_str(crate::compress::accept_encoding());
        out.push_str("\r\n");
    }
    if !req.body.is_empty() {
        out.push_str("Content-Length: ");
        out.push_str(&req.body.len().to_string());
        out.push_str("\r\n");
    }

    out.push_str("\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> Request {
        Request::new(Method::Get, Url::parse(url).unwrap())
    }

    #[test]
    fn request_line_includes_query() {
        let head = build_request(&request("http://h/abc?q=1"), &ClientConfig::default());
        assert!(head.starts_with("GET /abc?q=1 HTTP/1.1\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn host_port_only_when_non_default() {
        let cfg = ClientConfig::default();
        let head = build_request(&request("http://h/"), &cfg);
        assert!(head.contains("\r\nHost: h\r\n"));
        let head = build_request(&request("http://h:8080/"), &cfg);
        assert!(head.contains("\r\nHost: h:8080\r\n"));
        let head = build_request(&request("https://h/"), &cfg);
        assert!(head.contains("\r\nHost: h\r\n"));
    }

    #[test]
    fn default_headers_added_once() {
        let cfg = ClientConfig::default();
        let head = build_request(&request("http://h/"), &cfg);
        assert!(head.contains("User-Agent: Ragno/0.1\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));
        assert!(head.contains("Accept: */*\r\n"));
        assert!(head.contains("Accept-Encoding: br, gzip, deflate\r\n"));
    }

    #[test]
    fn caller_headers_suppress_defaults() {
        let cfg = ClientConfig::default();
        let mut req = request("http://h/");
        req.header("user-agent", "custom/1");
        req.header("Accept", "text/plain");
        let head = build_request(&req, &cfg);
        assert!(head.contains("user-agent: custom/1\r\n"));
        assert!(!head.contains("Ragno/0.1"));
        assert!(head.contains("Accept: text/plain\r\n"));
        assert_eq!(head.matches("Accept:").count(), 1);
    }

    #[test]
    fn compression_flags_gate_accept_encoding() {
        let mut cfg = ClientConfig::default();
        cfg.enable_compression = false;
        let head = build_request(&request("http://h/"), &cfg);
        assert!(!head.contains("Accept-Encoding"));

        let cfg = ClientConfig::default();
        let mut req = request("http://h/");
        req.enable_compression = false;
        let head = build_request(&req, &cfg);
        assert!(!head.contains("Accept-Encoding"));
    }

    #[test]
    fn body_emits_content_length() {
        let cfg = ClientConfig::default();
        let mut req = request("http://h/");
        req.body = b"12345".to_vec();
        let head = build_request(&req, &cfg);
        assert!(head.contains("Content-Length: 5\r\n"));
    }
}
