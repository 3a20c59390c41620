/*
 * limit.rs
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

//! Token-bucket request admission. Rate 0 means unlimited; burst defaults to
//! the rate. Tokens are timestamps in a FIFO so the bucket never exceeds the
//! burst capacity.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

struct State {
    rate: f64,
    burst: usize,
    interval: Duration,
    tokens: VecDeque<Instant>,
    last_refill: Instant,
}

impl State {
    fn new(rate: f64, burst: usize) -> Self {
        State {
            rate,
            burst: if burst == 0 { rate as usize } else { burst },
            interval: Self::interval_for(rate),
            tokens: VecDeque::new(),
            last_refill: Instant::now(),
        }
    }

    fn interval_for(rate: f64) -> Duration {
        if rate > 0.0 {
            Duration::from_secs_f64(1.0 / rate)
        } else {
            Duration::ZERO
        }
    }

    fn refill(&mut self) {
        if self.rate <= 0.0 {
            return;
        }
        let now = Instant::now();
        let elapsed = now - self.last_refill;
        let interval_ns = self.interval.as_nanos().max(1);
        let mut to_add = elapsed.as_nanos() / interval_ns;
        if to_add > 0 {
            while self.tokens.len() < self.burst && to_add > 0 {
                self.tokens.push_back(now);
                to_add -= 1;
            }
            self.last_refill = now;
        }
    }
}

/// Token-bucket rate limiter shared between request workers.
pub struct RateLimiter {
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: usize) -> Self {
        RateLimiter {
            state: Mutex::new(State::new(rate, burst)),
        }
    }

    /// Wait until a token is available. Unlimited mode returns immediately.
    /// The lock is released while sleeping so other workers can refill.
    pub async fn acquire(&self) {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if state.rate <= 0.0 {
                    return;
                }
                state.refill();
                if state.tokens.pop_front().is_some() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Take a token without waiting. True when admitted.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.rate <= 0.0 {
            return true;
        }
        state.refill();
        state.tokens.pop_front().is_some()
    }

    /// Replace rate and burst. Outstanding tokens are discarded and the
    /// refill clock restarts at now.
    pub fn set_rate(&self, rate: f64, burst: usize) {
        let mut state = self.state.lock().unwrap();
        *state = State::new(rate, burst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unlimited_is_immediate() {
        let limiter = RateLimiter::new(0.0, 0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_admits_then_blocks() {
        let limiter = RateLimiter::new(10.0, 10);
        // Let the bucket fill.
        tokio::time::sleep(Duration::from_secs(2)).await;

        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));

        // Bucket drained: the next token arrives one interval after refill.
        let blocked = Instant::now();
        limiter.acquire().await;
        let waited = blocked.elapsed();
        assert!(waited >= Duration::from_millis(90), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(200), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_does_not_block() {
        let limiter = RateLimiter::new(10.0, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_discards_tokens() {
        let limiter = RateLimiter::new(10.0, 10);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(limiter.try_acquire());
        limiter.set_rate(5.0, 5);
        // Cleared bucket plus a fresh refill clock: nothing available yet.
        assert!(!limiter.try_acquire());
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn steady_state_rate_is_bounded() {
        let limiter = RateLimiter::new(20.0, 5);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let start = Instant::now();
        let mut admitted = 0u32;
        while start.elapsed() < Duration::from_secs(2) {
            if limiter.try_acquire() {
                admitted += 1;
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        // rate * window + burst
        assert!(admitted <= 20 * 2 + 5, "admitted {}", admitted);
        assert!(admitted >= 35, "admitted {}", admitted);
    }
}
