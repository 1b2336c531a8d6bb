/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for a bus instance.
///
/// All counters use relaxed ordering; they are diagnostics, not synchronization.
#[derive(Debug, Default)]
pub struct BusStats {
    published: AtomicU64,
    delivered: AtomicU64,
    subscriber_panics: AtomicU64,
    relayed: AtomicU64,
    relay_failures: AtomicU64,
    inbound_accepted: AtomicU64,
    inbound_ignored: AtomicU64,
    requests_resolved: AtomicU64,
    requests_timed_out: AtomicU64,
}

impl BusStats {
    /// Messages published on this bus (local origin only).
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Successful subscriber invocations.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Subscriber invocations that panicked and were isolated.
    #[must_use]
    pub fn subscriber_panics(&self) -> u64 {
        self.subscriber_panics.load(Ordering::Relaxed)
    }

    /// Envelopes handed to remote endpoints.
    #[must_use]
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    /// Remote sends that failed.
    #[must_use]
    pub fn relay_failures(&self) -> u64 {
        self.relay_failures.load(Ordering::Relaxed)
    }

    /// Inbound remote values recognized as envelopes.
    #[must_use]
    pub fn inbound_accepted(&self) -> u64 {
        self.inbound_accepted.load(Ordering::Relaxed)
    }

    /// Inbound remote values dropped by the envelope check.
    #[must_use]
    pub fn inbound_ignored(&self) -> u64 {
        self.inbound_ignored.load(Ordering::Relaxed)
    }

    /// Waiting dispatches that received a response.
    #[must_use]
    pub fn requests_resolved(&self) -> u64 {
        self.requests_resolved.load(Ordering::Relaxed)
    }

    /// Waiting dispatches that hit their deadline.
    #[must_use]
    pub fn requests_timed_out(&self) -> u64 {
        self.requests_timed_out.load(Ordering::Relaxed)
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_subscriber_panic(&self) {
        self.subscriber_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relay_failure(&self) {
        self.relay_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_inbound(&self, accepted: bool) {
        if accepted {
            self.inbound_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inbound_ignored.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_request_resolved(&self) {
        self.requests_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request_timed_out(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }
}
