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

//! The bus engine: channel registry, local dispatcher, remote relay,
//! request/reply correlator, and the [`Bus`] facade tying them together,
//! plus configuration and statistics.

pub use bus::Bus;
pub use config::{BusConfig, BusRole, DefaultsConfig, LimitsConfig, TimeoutConfig, CONFIG};
pub use registry::{Handler, SubscriberId, Subscription};
pub use stats::BusStats;

/// Defines the `Bus` facade.
mod bus;
/// Defines configuration loading.
pub mod config;
/// Defines `PendingRequest`, the request/reply correlator.
mod correlator;
/// Defines local fan-out.
mod dispatcher;
/// Defines the channel registry and `Subscription` handles.
mod registry;
/// Defines the remote endpoint set.
mod relay;
/// Defines `BusStats`.
mod stats;
