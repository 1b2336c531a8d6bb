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

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

//! # Courier
//!
//! A lightweight message bus for one process or several: named channels that
//! any number of listeners subscribe to and any number of producers publish
//! on, with request/reply layered on top through ephemeral return channels.
//!
//! ## Key Concepts
//!
//! - **Channels**: created on first subscribe, removed with their last
//!   subscriber. Publishing to a channel nobody listens on is a silent no-op.
//! - **Dispatch**: every local subscriber gets its own deep copy of the
//!   payload; a panicking subscriber does not disturb the others.
//! - **Envelopes**: the tagged wire record (`type`, `channel`, `payload`,
//!   `returnChannel`) used whenever a message crosses a process boundary.
//! - **Relay**: attached [`RemoteEndpoint`](prelude::RemoteEndpoint)s receive
//!   every locally published message; envelopes arriving from them are
//!   dispatched locally and never relayed further.
//! - **Request/reply**: a waiting dispatch resolves with the first response
//!   on its return channel, or fails with `Timeout`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! let bus = Bus::new();
//! let responder = bus.clone();
//! bus.subscribe("echo", move |payload, ret| {
//!     if let Some(ret) = ret {
//!         responder.reply(&ret, payload);
//!     }
//! });
//!
//! let answer = bus
//!     .dispatch("echo", json!({ "x": 1 }), DispatchOptions::waiting())
//!     .await?;
//! assert_eq!(answer, Some(json!({ "x": 1 })));
//! ```

/// Bus engine, configuration and statistics.
pub(crate) mod common;

/// Envelope codec, dispatch options and error types.
pub(crate) mod message;

/// Capability traits for remote endpoints.
pub(crate) mod traits;

/// Reference transports.
pub mod transport;

/// Configuration types and loading.
pub mod config {
    pub use crate::common::config::*;
}

/// A prelude module for conveniently importing the most commonly used items.
pub mod prelude {
    pub use serde_json::{json, Value};

    pub use crate::common::{Bus, BusConfig, BusRole, BusStats, Handler, SubscriberId, Subscription};
    pub use crate::message::{
        is_envelope, BusError, DispatchOptions, Envelope, TransportError, BUS_MARKER, RELAY_CHANNEL,
    };
    pub use crate::traits::{InboundListener, RemoteEndpoint, Sendable};
    pub use crate::transport::{LinkFrame, MemoryEndpoint, StreamEndpoint};
}
