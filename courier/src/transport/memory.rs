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
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

use crate::message::{Envelope, TransportError};
use crate::traits::{InboundListener, RemoteEndpoint, Sendable};
use crate::transport::LinkFrame;

/// One half of an in-process link.
///
/// Useful for wiring buses together inside one process (worker tasks, tests)
/// and as the model for real transports: frames on the relay channel reach the
/// bus, other link traffic is left alone.
///
/// ```rust,ignore
/// let (coordinator_side, worker_side) = MemoryEndpoint::pair("to-worker", "to-coordinator");
/// coordinator.attach(&coordinator_side)?;
/// worker.attach(&worker_side)?;
/// ```
pub struct MemoryEndpoint {
    name: String,
    outbound: mpsc::UnboundedSender<LinkFrame>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<LinkFrame>>>,
}

impl MemoryEndpoint {
    /// Creates two linked endpoints: what one sends, the other receives.
    #[must_use]
    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> (Self, Self) {
        let (to_second, from_first) = mpsc::unbounded_channel();
        let (to_first, from_second) = mpsc::unbounded_channel();
        (
            Self {
                name: first.into(),
                outbound: to_second,
                inbound: Mutex::new(Some(from_second)),
            },
            Self {
                name: second.into(),
                outbound: to_first,
                inbound: Mutex::new(Some(from_first)),
            },
        )
    }

    /// Sends an arbitrary frame to the peer, bypassing the bus.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionClosed`] once the peer half is gone.
    pub fn send_frame(&self, frame: LinkFrame) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl fmt::Debug for MemoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEndpoint")
            .field("name", &self.name)
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

struct MemorySender {
    outbound: mpsc::UnboundedSender<LinkFrame>,
}

impl Sendable for MemorySender {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.outbound
            .send(LinkFrame::relay(envelope))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl RemoteEndpoint for MemoryEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn sender(&self) -> Option<Arc<dyn Sendable>> {
        if self.outbound.is_closed() {
            return None;
        }
        Some(Arc::new(MemorySender {
            outbound: self.outbound.clone(),
        }))
    }

    /// Spawns the delivery task on the current Tokio runtime. Refuses when
    /// called outside a runtime or when a listener is already registered.
    fn listen(&self, listener: InboundListener) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };
        let Some(mut inbound) = self.inbound.lock().take() else {
            return false;
        };

        let name = self.name.clone();
        runtime.spawn(async move {
            while let Some(frame) = inbound.recv().await {
                if frame.is_relay() {
                    listener(frame.body);
                } else {
                    trace!(endpoint = %name, link_channel = %frame.channel, "Skipping non-relay frame");
                }
            }
            trace!(endpoint = %name, "Memory link closed");
        });
        true
    }
}
