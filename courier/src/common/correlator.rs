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

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::common::config::DefaultsConfig;
use crate::common::registry::{ChannelRegistry, Handler, Subscription};
use crate::message::BusError;

/// Shortest random suffix used for return channels, whatever the configuration says.
pub(crate) const MIN_REPLY_SUFFIX_LEN: usize = 8;

/// Fresh names tried before falling back to an id-qualified one.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Builds a return-channel name for a request published on `origin`.
pub(crate) fn return_channel_name(origin: &str, defaults: &DefaultsConfig) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(defaults.reply_suffix_len.max(MIN_REPLY_SUFFIX_LEN))
        .map(char::from)
        .collect();
    format!("{origin}{}{suffix}", defaults.reply_infix)
}

/// A request waiting for its single response.
///
/// The one-shot subscription and the result slot are acquired together in
/// [`PendingRequest::open`] and released together when the request is dropped,
/// whichever of response, deadline, or caller cancellation comes first.
pub(crate) struct PendingRequest {
    origin: String,
    return_channel: String,
    subscription: Subscription,
    response: oneshot::Receiver<Value>,
    deadline: Instant,
    timeout: Duration,
}

impl PendingRequest {
    /// Subscribes the return channel and fixes the deadline at `timeout` from now.
    pub(crate) fn open(
        registry: &Arc<ChannelRegistry>,
        origin: &str,
        defaults: &DefaultsConfig,
        timeout: Duration,
    ) -> Self {
        let deadline = Instant::now() + timeout;
        let id = registry.mint_id();
        let return_channel = (0..MAX_NAME_ATTEMPTS)
            .map(|_| return_channel_name(origin, defaults))
            .find(|candidate| !registry.has_channel(candidate))
            .unwrap_or_else(|| {
                // Subscriber ids are never reused, so this name is free.
                let fallback = format!("{}-{id}", return_channel_name(origin, defaults));
                warn!(origin, return_channel = %fallback, "Return channel names kept colliding");
                fallback
            });

        let (sender, response) = oneshot::channel();
        let slot = Mutex::new(Some(sender));
        let weak_registry: Weak<ChannelRegistry> = Arc::downgrade(registry);
        let own_channel = return_channel.clone();

        let handler: Handler = Arc::new(move |payload: Value, _: Option<String>| {
            let Some(sender) = slot.lock().take() else {
                trace!(channel = %own_channel, "Ignoring duplicate response");
                return;
            };
            if let Some(registry) = weak_registry.upgrade() {
                registry.unsubscribe(&own_channel, id);
            }
            // The caller may have given up already.
            let _ = sender.send(payload);
        });

        let subscription = registry.insert(return_channel.clone(), id, handler);
        trace!(origin, return_channel = %return_channel, "Opened pending request");

        Self {
            origin: origin.to_string(),
            return_channel,
            subscription,
            response,
            deadline,
            timeout,
        }
    }

    pub(crate) fn return_channel(&self) -> &str {
        &self.return_channel
    }

    /// Waits for the response or the deadline fixed in [`open`](Self::open),
    /// whichever comes first.
    pub(crate) async fn wait(mut self) -> Result<Value, BusError> {
        let timeout = self.timeout;
        let outcome = tokio::time::timeout_at(self.deadline, &mut self.response).await;
        let origin = std::mem::take(&mut self.origin);
        let return_channel = std::mem::take(&mut self.return_channel);
        // Unsubscribe before the caller sees the result.
        drop(self);

        match outcome {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(BusError::ReplyChannelClosed {
                channel: return_channel,
            }),
            Err(_) => {
                trace!(channel = %origin, return_channel = %return_channel, "Request timed out");
                Err(BusError::Timeout {
                    channel: origin,
                    timeout,
                })
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_channel_embeds_origin_and_suffix() {
        let defaults = DefaultsConfig::default();
        let name = return_channel_name("prices", &defaults);
        let suffix = name
            .strip_prefix("prices:reply:")
            .expect("origin and infix prefix");
        assert_eq!(suffix.len(), defaults.reply_suffix_len);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(name, return_channel_name("prices", &defaults));
    }

    #[tokio::test]
    async fn first_response_wins_and_releases_subscription() {
        let registry = Arc::new(ChannelRegistry::default());
        let pending = PendingRequest::open(
            &registry,
            "echo",
            &DefaultsConfig::default(),
            Duration::from_secs(1),
        );
        let return_channel = pending.return_channel().to_string();
        assert!(registry.has_channel(&return_channel));

        let handlers = registry.snapshot(&return_channel);
        handlers[0](Value::from(1), None);
        handlers[0](Value::from(2), None);
        assert!(!registry.has_channel(&return_channel));

        let response = pending.wait().await;
        assert_eq!(response, Ok(Value::from(1)));
    }

    #[tokio::test]
    async fn deadline_releases_subscription() {
        let registry = Arc::new(ChannelRegistry::default());
        let pending = PendingRequest::open(
            &registry,
            "echo",
            &DefaultsConfig::default(),
            Duration::from_millis(10),
        );
        let return_channel = pending.return_channel().to_string();

        let response = pending.wait().await;
        assert!(matches!(response, Err(BusError::Timeout { ref channel, .. }) if channel == "echo"));
        assert!(!registry.has_channel(&return_channel));
    }

    #[test]
    fn dropping_request_releases_subscription() {
        let registry = Arc::new(ChannelRegistry::default());
        let pending = PendingRequest::open(
            &registry,
            "echo",
            &DefaultsConfig::default(),
            Duration::from_secs(1),
        );
        let return_channel = pending.return_channel().to_string();
        drop(pending);
        assert_eq!(registry.channel_count(), 0);
        assert!(!registry.has_channel(&return_channel));
    }

    #[tokio::test]
    async fn deadline_is_fixed_when_the_request_opens() {
        let registry = Arc::new(ChannelRegistry::default());
        let pending = PendingRequest::open(
            &registry,
            "echo",
            &DefaultsConfig::default(),
            Duration::from_millis(30),
        );
        // Time spent before waiting counts against the deadline.
        std::thread::sleep(Duration::from_millis(60));

        let started = std::time::Instant::now();
        let response = pending.wait().await;
        assert!(matches!(response, Err(BusError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn short_suffix_lengths_are_raised_to_the_minimum() {
        let defaults = DefaultsConfig {
            reply_suffix_len: 0,
            ..DefaultsConfig::default()
        };
        let name = return_channel_name("q", &defaults);
        let suffix = name.strip_prefix("q:reply:").expect("origin and infix prefix");
        assert_eq!(suffix.len(), MIN_REPLY_SUFFIX_LEN);
    }

    #[test]
    fn concurrent_requests_get_distinct_return_channels() {
        let registry = Arc::new(ChannelRegistry::default());
        let defaults = DefaultsConfig {
            reply_suffix_len: 0,
            ..DefaultsConfig::default()
        };
        let pending: Vec<_> = (0..32)
            .map(|_| PendingRequest::open(&registry, "q", &defaults, Duration::from_secs(1)))
            .collect();

        let mut names: Vec<_> = pending.iter().map(|p| p.return_channel().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 32);
        assert_eq!(registry.channel_count(), 32);

        drop(pending);
        assert_eq!(registry.channel_count(), 0);
    }
}
