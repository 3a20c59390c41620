/*
 * progress.rs
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

//! Shared download progress: two monotonically increasing byte counters and a
//! running flag. The executor adds every wire byte it reads; a renderer (out
//! of scope here) samples the counters on its own clock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress counters, shared between the client and its consumer via `Arc`.
#[derive(Default)]
pub struct Progress {
    downloaded: AtomicU64,
    total: AtomicU64,
    running: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account wire bytes as they arrive.
    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Set the expected total (from HEAD or Content-Length). 0 means unknown.
    pub fn set_total(&self, bytes: u64) {
        self.total.store(bytes, Ordering::Relaxed);
    }

    /// Zero both counters before a new transfer.
    pub fn reset(&self) {
        self.downloaded.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// (downloaded, total) at this instant.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.downloaded.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let p = Progress::new();
        p.set_total(1000);
        p.add_downloaded(300);
        p.add_downloaded(200);
        assert_eq!(p.snapshot(), (500, 1000));
        p.reset();
        assert_eq!(p.snapshot(), (0, 0));
    }

    #[test]
    fn running_flag() {
        let p = Progress::new();
        assert!(!p.is_running());
        p.set_running(true);
        assert!(p.is_running());
        p.set_running(false);
        assert!(!p.is_running());
    }
}
