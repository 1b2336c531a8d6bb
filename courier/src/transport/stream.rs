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
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::common::LimitsConfig;
use crate::message::{Envelope, TransportError};
use crate::traits::{InboundListener, RemoteEndpoint, Sendable};
use crate::transport::{read_frame, write_frame, LinkFrame};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A remote endpoint over any bidirectional byte stream: a Unix socket, a
/// child process's pipes joined with `tokio::io::join`, or an in-memory
/// `tokio::io::duplex`.
///
/// Outbound envelopes are queued (up to `limits.outbound_buffer`) and written
/// by a dedicated task; inbound frames are read by a task started in
/// [`listen`](RemoteEndpoint::listen).
pub struct StreamEndpoint {
    name: String,
    outbound: mpsc::Sender<LinkFrame>,
    reader: Mutex<Option<BoxedReader>>,
    max_frame_size: usize,
}

impl StreamEndpoint {
    /// Splits `io` and starts the writer task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<T>(name: impl Into<String>, io: T, limits: &LimitsConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let name = name.into();
        let (reader, mut writer) = tokio::io::split(io);
        let (outbound, mut queue) = mpsc::channel::<LinkFrame>(limits.outbound_buffer.max(1));
        let max_frame_size = limits.max_frame_size;

        let writer_name = name.clone();
        tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                match write_frame(&mut writer, &frame, max_frame_size).await {
                    Ok(()) => trace!(endpoint = %writer_name, "Frame written"),
                    Err(TransportError::FrameTooLarge { size, max }) => {
                        warn!(endpoint = %writer_name, size, max, "Dropping oversized frame");
                    }
                    Err(e) => {
                        debug!(endpoint = %writer_name, error = %e, "Writer stopped");
                        break;
                    }
                }
            }
        });

        Self {
            name,
            outbound,
            reader: Mutex::new(Some(Box::new(reader))),
            max_frame_size,
        }
    }

    /// Queues an arbitrary frame for the peer, bypassing the bus.
    ///
    /// # Errors
    ///
    /// [`TransportError::QueueFull`] when the outbound queue is at capacity,
    /// [`TransportError::ConnectionClosed`] once the writer has stopped.
    pub fn send_frame(&self, frame: LinkFrame) -> Result<(), TransportError> {
        enqueue(&self.outbound, frame)
    }
}

fn enqueue(outbound: &mpsc::Sender<LinkFrame>, frame: LinkFrame) -> Result<(), TransportError> {
    outbound.try_send(frame).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
    })
}

impl fmt::Debug for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEndpoint")
            .field("name", &self.name)
            .field("closed", &self.outbound.is_closed())
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

struct StreamSender {
    outbound: mpsc::Sender<LinkFrame>,
}

impl Sendable for StreamSender {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        enqueue(&self.outbound, LinkFrame::relay(envelope))
    }
}

impl RemoteEndpoint for StreamEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn sender(&self) -> Option<Arc<dyn Sendable>> {
        if self.outbound.is_closed() {
            return None;
        }
        Some(Arc::new(StreamSender {
            outbound: self.outbound.clone(),
        }))
    }

    fn listen(&self, listener: InboundListener) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };
        let Some(mut reader) = self.reader.lock().take() else {
            return false;
        };

        let name = self.name.clone();
        let max_frame_size = self.max_frame_size;
        runtime.spawn(async move {
            loop {
                match read_frame(&mut reader, max_frame_size).await {
                    Ok(frame) if frame.is_relay() => listener(frame.body),
                    Ok(frame) => {
                        trace!(endpoint = %name, link_channel = %frame.channel, "Skipping non-relay frame");
                    }
                    Err(TransportError::Serialization(e)) => {
                        debug!(endpoint = %name, error = %e, "Skipping undecodable frame");
                    }
                    Err(TransportError::ConnectionClosed) => {
                        debug!(endpoint = %name, "Peer closed the stream");
                        break;
                    }
                    Err(e) => {
                        warn!(endpoint = %name, error = %e, "Reader stopped");
                        break;
                    }
                }
            }
        });
        true
    }
}
