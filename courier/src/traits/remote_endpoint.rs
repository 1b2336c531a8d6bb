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

use std::sync::Arc;

use serde_json::Value;

use crate::message::{Envelope, TransportError};

/// Callback a remote endpoint invokes for every value it receives from its peer.
///
/// Values are handed over raw; the bus decides whether they are envelopes.
pub type InboundListener = Arc<dyn Fn(Value) + Send + Sync>;

/// The one-method capability needed to push envelopes to a peer.
///
/// Implementations must not block: queue the envelope and return.
pub trait Sendable: Send + Sync {
    /// Forwards `envelope` to the peer.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the envelope could not be queued. The bus
    /// logs the failure and carries on with its other endpoints.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// An opaque peer the bus can relay traffic to and receive traffic from.
///
/// [`Bus::attach`](crate::common::Bus::attach) probes both capabilities and
/// rejects the endpoint with
/// [`BusError::InvalidRemote`](crate::message::BusError::InvalidRemote) if
/// either is missing. Lifetime stays with the owner; the bus never detaches an
/// endpoint on its own.
pub trait RemoteEndpoint: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns the send capability, or `None` if this endpoint cannot send
    /// (receive-only, or its link is already closed).
    fn sender(&self) -> Option<Arc<dyn Sendable>>;

    /// Registers `listener` for inbound values.
    ///
    /// Returns `false` if the endpoint cannot deliver inbound traffic, for
    /// instance because a listener is already registered.
    fn listen(&self, listener: InboundListener) -> bool;
}
