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

use std::time::Duration;

/// Options controlling a single [`Bus::dispatch`](crate::common::Bus::dispatch).
///
/// The default is fire-and-forget. A waiting dispatch mints an ephemeral return
/// channel and resolves with the first payload published to it, or fails with
/// [`BusError::Timeout`](crate::message::BusError::Timeout) once `timeout`
/// elapses. When `timeout` is `None` the bus's configured default applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Whether the caller waits for a response.
    pub waiting: bool,
    /// Deadline for the response; falls back to the configured default.
    pub timeout: Option<Duration>,
}

impl DispatchOptions {
    /// Fire-and-forget dispatch.
    #[must_use]
    pub const fn fire_and_forget() -> Self {
        Self {
            waiting: false,
            timeout: None,
        }
    }

    /// Waiting dispatch using the configured default timeout.
    #[must_use]
    pub const fn waiting() -> Self {
        Self {
            waiting: true,
            timeout: None,
        }
    }

    /// Overrides the response deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
