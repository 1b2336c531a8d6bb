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

//! Message types that travel on the bus: the wire [`Envelope`], the options
//! accepted by [`Bus::dispatch`](crate::common::Bus::dispatch), and the error
//! taxonomy surfaced to callers.

pub use bus_error::{BusError, TransportError};
pub use dispatch_options::DispatchOptions;
pub use envelope::{is_envelope, Envelope, BUS_MARKER, RELAY_CHANNEL};

/// Defines `BusError` and `TransportError`.
mod bus_error;
/// Defines `DispatchOptions` for fire-and-forget and waiting dispatches.
mod dispatch_options;
/// Defines the cross-process `Envelope` and its structural recognizer.
mod envelope;
