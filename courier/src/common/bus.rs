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

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, instrument, trace, Span};

use crate::common::config::{BusConfig, BusRole, CONFIG};
use crate::common::correlator::PendingRequest;
use crate::common::dispatcher::Dispatcher;
use crate::common::registry::{ChannelRegistry, Handler, SubscriberId, Subscription};
use crate::common::relay::RemoteRelay;
use crate::common::BusStats;
use crate::message::{BusError, DispatchOptions, Envelope};
use crate::traits::{InboundListener, RemoteEndpoint};

/// A message bus instance.
///
/// `Bus` is a cheap handle (`Clone` shares the same instance). It owns:
///
/// - the channel registry (channel name to subscribers),
/// - the dispatcher that fans payloads out to local subscribers, each with its
///   own copy,
/// - the relay that forwards every locally published message, as an
///   [`Envelope`], to each attached [`RemoteEndpoint`],
/// - the correlator that turns a waiting [`dispatch`](Bus::dispatch) into a
///   round trip over an ephemeral return channel.
///
/// # Example
///
/// ```rust,ignore
/// use courier::prelude::*;
///
/// let bus = Bus::new();
/// let responder = bus.clone();
/// bus.subscribe("echo", move |payload, ret| {
///     if let Some(ret) = ret {
///         responder.reply(&ret, payload);
///     }
/// });
/// let answer = bus.request("echo", json!({ "x": 1 })).await?;
/// assert_eq!(answer, json!({ "x": 1 }));
/// ```
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    config: BusConfig,
    registry: Arc<ChannelRegistry>,
    dispatcher: Dispatcher,
    relay: RemoteRelay,
    stats: Arc<BusStats>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// Creates a bus using the global configuration loaded from XDG locations.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CONFIG.clone())
    }

    /// Creates a bus with an explicit configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let registry = Arc::new(ChannelRegistry::default());
        let stats = Arc::new(BusStats::default());
        let dispatcher = Dispatcher::new(registry.clone(), stats.clone());
        trace!(role = %config.role, "Bus created");
        Self {
            inner: Arc::new(BusInner {
                config,
                registry,
                dispatcher,
                relay: RemoteRelay::default(),
                stats,
            }),
        }
    }

    /// The role this bus was configured with.
    #[must_use]
    pub fn role(&self) -> BusRole {
        self.inner.config.role
    }

    /// The configuration this bus was created with.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Running counters for this bus.
    #[must_use]
    pub fn stats(&self) -> &BusStats {
        &self.inner.stats
    }

    /// Subscribes `handler` to `channel`, creating the channel on first use.
    ///
    /// The handler receives its own copy of each payload plus the return channel
    /// when the publisher is waiting for a reply. Handlers run synchronously
    /// inside `publish` and `reply`; a waiting dispatch runs them on Tokio's
    /// blocking pool. Spawn onto the runtime for async work.
    pub fn subscribe<F>(&self, channel: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Value, Option<String>) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.inner.registry.subscribe(channel, handler)
    }

    /// Removes the subscription `id` from `channel`.
    ///
    /// Idempotent: unknown channels and already-removed ids are a no-op.
    pub fn unsubscribe(&self, channel: &str, id: SubscriberId) {
        self.inner.registry.unsubscribe(channel, id);
    }

    /// Whether `channel` currently has at least one local subscriber.
    #[must_use]
    pub fn has_channel(&self, channel: &str) -> bool {
        self.inner.registry.has_channel(channel)
    }

    /// Number of channels with at least one local subscriber.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.registry.channel_count()
    }

    /// Number of local subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.registry.subscriber_count(channel)
    }

    /// Number of attached remote endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.inner.relay.endpoint_count()
    }

    /// Publishes `payload` on `channel` without waiting for a reply.
    ///
    /// Local subscribers run first, then every attached endpoint receives an
    /// envelope, whether or not anyone local was listening.
    pub fn publish(&self, channel: &str, payload: Value) {
        self.emit(channel, &payload, None);
    }

    /// Answers a waiting request by publishing onto its return channel.
    ///
    /// A reply arriving after the requester timed out finds no subscriber and
    /// is dropped.
    pub fn reply(&self, return_channel: &str, payload: Value) {
        self.emit(return_channel, &payload, None);
    }

    /// Publishes `payload` on `channel`, optionally waiting for a response.
    ///
    /// Fire-and-forget dispatches deliver synchronously and resolve to
    /// `Ok(None)`. Waiting dispatches fix their deadline first, publish on
    /// Tokio's blocking pool, and resolve to `Ok(Some(response))` with the first
    /// payload published on the request's return channel.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] if waiting and no response arrives before the
    /// deadline (`options.timeout`, or the configured default of 15 s).
    #[instrument(skip(self, payload), fields(role = %self.role()))]
    pub async fn dispatch(
        &self,
        channel: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Result<Option<Value>, BusError> {
        if !options.waiting {
            self.emit(channel, &payload, None);
            return Ok(None);
        }
        let timeout = options
            .timeout
            .unwrap_or_else(|| self.inner.config.request_timeout());
        self.round_trip(channel, payload, timeout).await.map(Some)
    }

    /// Publishes `payload` on `channel` and waits for the response using the
    /// configured default timeout.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] if no response arrives in time.
    pub async fn request(&self, channel: &str, payload: Value) -> Result<Value, BusError> {
        self.round_trip(channel, payload, self.inner.config.request_timeout())
            .await
    }

    /// Like [`request`](Bus::request) with an explicit deadline.
    ///
    /// # Errors
    ///
    /// [`BusError::Timeout`] if no response arrives within `timeout`.
    pub async fn request_with_timeout(
        &self,
        channel: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BusError> {
        self.round_trip(channel, payload, timeout).await
    }

    /// Attaches a remote endpoint.
    ///
    /// From now on every message published on this bus is also sent to the
    /// endpoint, and envelopes it delivers are dispatched to local subscribers
    /// only (they are not relayed on to other endpoints).
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidRemote`] if the endpoint cannot send or will not
    /// accept an inbound listener. The endpoint is not added.
    pub fn attach<E>(&self, endpoint: &E) -> Result<(), BusError>
    where
        E: RemoteEndpoint + ?Sized,
    {
        let listener = inbound_listener(Arc::downgrade(&self.inner));
        self.inner.relay.attach(endpoint, listener)
    }

    async fn round_trip(
        &self,
        channel: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BusError> {
        let pending = PendingRequest::open(
            &self.inner.registry,
            channel,
            &self.inner.config.defaults,
            timeout,
        );
        self.emit_detached(channel, payload, pending.return_channel());

        let response = pending.wait().await;
        match &response {
            Ok(_) => self.inner.stats.record_request_resolved(),
            Err(BusError::Timeout { .. }) => self.inner.stats.record_request_timed_out(),
            Err(_) => {}
        }
        response
    }

    /// Publishes a request on the blocking pool so slow subscribers cannot
    /// hold up the waiting caller. Outside a runtime it publishes inline.
    fn emit_detached(&self, channel: &str, payload: Value, return_channel: &str) {
        let Ok(runtime) = Handle::try_current() else {
            self.emit(channel, &payload, Some(return_channel));
            return;
        };
        let bus = self.clone();
        let channel = channel.to_string();
        let return_channel = return_channel.to_string();
        let span = Span::current();
        runtime.spawn_blocking(move || {
            span.in_scope(|| bus.emit(&channel, &payload, Some(&return_channel)));
        });
    }

    fn emit(&self, channel: &str, payload: &Value, return_channel: Option<&str>) {
        self.inner.stats.record_published();
        self.inner
            .dispatcher
            .local_dispatch(channel, payload, return_channel);

        if self.inner.relay.endpoint_count() > 0 {
            let envelope = Envelope::new(channel, payload.clone(), return_channel.map(str::to_owned));
            self.inner.relay.forward(&envelope, &self.inner.stats);
        }
    }
}

fn inbound_listener(bus: Weak<BusInner>) -> InboundListener {
    Arc::new(move |value: Value| {
        let Some(bus) = bus.upgrade() else {
            return;
        };
        match Envelope::recognize(&value) {
            Some(envelope) => {
                bus.stats.record_inbound(true);
                debug!(channel = envelope.channel(), "Inbound envelope from remote");
                bus.dispatcher.local_dispatch(
                    envelope.channel(),
                    envelope.payload(),
                    envelope.return_channel(),
                );
            }
            None => {
                bus.stats.record_inbound(false);
                trace!("Ignoring inbound value without the bus marker");
            }
        }
    })
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("role", &self.inner.config.role)
            .field("channels", &self.inner.registry.channel_count())
            .field("endpoints", &self.inner.relay.endpoint_names())
            .finish()
    }
}
