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

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use crate::common::registry::ChannelRegistry;
use crate::common::BusStats;

/// Delivers payloads to the local subscribers of a channel.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    registry: Arc<ChannelRegistry>,
    stats: Arc<BusStats>,
}

impl Dispatcher {
    pub(crate) const fn new(registry: Arc<ChannelRegistry>, stats: Arc<BusStats>) -> Self {
        Self { registry, stats }
    }

    /// Invokes every subscriber of `channel` with its own clone of `payload`.
    ///
    /// Subscribers are those registered when the call starts; one that
    /// unsubscribes another mid-dispatch does not stop it from receiving this
    /// message. A panicking subscriber is isolated and the rest still run.
    /// Returns how many subscribers completed without panicking.
    pub(crate) fn local_dispatch(
        &self,
        channel: &str,
        payload: &Value,
        return_channel: Option<&str>,
    ) -> usize {
        let subscribers = self.registry.snapshot(channel);
        if subscribers.is_empty() {
            trace!(channel, "No subscribers found for channel");
            return 0;
        }
        trace!(channel, count = subscribers.len(), "Found subscribers");

        let mut delivered = 0;
        for subscriber in &subscribers {
            let copy = payload.clone();
            let return_channel = return_channel.map(str::to_owned);
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber(copy, return_channel))) {
                Ok(()) => delivered += 1,
                Err(cause) => {
                    self.stats.record_subscriber_panic();
                    warn!(channel, cause = panic_message(cause.as_ref()), "Subscriber panicked during dispatch");
                }
            }
        }

        self.stats.record_delivered(delivered);
        trace!(channel, delivered, "Local dispatch completed");
        delivered
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    cause
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| cause.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
