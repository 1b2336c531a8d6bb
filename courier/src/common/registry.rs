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

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

/// A subscriber callback: receives its own copy of the payload and the
/// return channel, if the publisher is waiting for a reply.
pub type Handler = Arc<dyn Fn(Value, Option<String>) + Send + Sync>;

/// Registry-minted identity of one (channel, callback) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Maps channel names to their active subscribers.
///
/// A channel entry exists iff it has at least one subscriber: it is created on
/// first subscribe and removed atomically (under the shard lock) when its last
/// subscriber leaves, so concurrent subscribe/unsubscribe cannot strand an
/// empty channel.
#[derive(Default)]
pub(crate) struct ChannelRegistry {
    channels: DashMap<String, HashMap<SubscriberId, Handler>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    pub(crate) fn mint_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn subscribe(self: &Arc<Self>, channel: impl Into<String>, handler: Handler) -> Subscription {
        let id = self.mint_id();
        self.insert(channel.into(), id, handler)
    }

    /// Registers `handler` under a previously minted `id`.
    pub(crate) fn insert(self: &Arc<Self>, channel: String, id: SubscriberId, handler: Handler) -> Subscription {
        self.channels
            .entry(channel.clone())
            .or_default()
            .insert(id, handler);
        trace!(channel = %channel, subscriber = %id, "Subscription added");
        Subscription {
            channel,
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Removes one pairing. Unknown channels and ids are a no-op.
    ///
    /// Returns whether a subscriber was actually removed.
    pub(crate) fn unsubscribe(&self, channel: &str, id: SubscriberId) -> bool {
        let removed = self
            .channels
            .get_mut(channel)
            .is_some_and(|mut subscribers| subscribers.remove(&id).is_some());
        if removed {
            if self
                .channels
                .remove_if(channel, |_, subscribers| subscribers.is_empty())
                .is_some()
            {
                trace!(channel, "Last subscriber left, channel removed");
            }
            trace!(channel, subscriber = %id, "Subscription removed");
        }
        removed
    }

    /// Handlers active on `channel` right now. The shard lock is released
    /// before the caller invokes any of them.
    pub(crate) fn snapshot(&self, channel: &str) -> Vec<Handler> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |subscribers| subscribers.len())
    }
}

/// Handle to a single subscription.
///
/// Dropping the handle does not unsubscribe. [`Subscription::unsubscribe`] is
/// idempotent, and becomes a no-op once the owning bus is gone.
#[derive(Clone)]
pub struct Subscription {
    channel: String,
    id: SubscriberId,
    registry: Weak<ChannelRegistry>,
}

impl Subscription {
    /// The subscribed channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The registry-assigned identity of this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Removes exactly this (channel, callback) pairing.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.channel, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}
