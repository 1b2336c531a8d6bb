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
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier::prelude::*;
use parking_lot::Mutex;

/// An endpoint that records every envelope it is asked to send and lets the
/// test inject inbound values by hand.
#[derive(Clone, Default)]
pub struct RecordingEndpoint {
    pub sent: Arc<Mutex<Vec<Envelope>>>,
    pub failing: Arc<AtomicBool>,
    listener: Arc<Mutex<Option<InboundListener>>>,
}

impl RecordingEndpoint {
    pub fn failing() -> Self {
        let endpoint = Self::default();
        endpoint.failing.store(true, Ordering::SeqCst);
        endpoint
    }

    /// Delivers `value` as if it came from the peer.
    pub fn inject(&self, value: Value) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(value);
        }
    }

    pub fn sent_channels(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|envelope| envelope.channel().to_string())
            .collect()
    }
}

struct RecordingSender(RecordingEndpoint);

impl Sendable for RecordingSender {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        self.0.sent.lock().push(envelope.clone());
        Ok(())
    }
}

impl RemoteEndpoint for RecordingEndpoint {
    fn name(&self) -> &str {
        "recording"
    }

    fn sender(&self) -> Option<Arc<dyn Sendable>> {
        Some(Arc::new(RecordingSender(self.clone())))
    }

    fn listen(&self, listener: InboundListener) -> bool {
        let mut slot = self.listener.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(listener);
        true
    }
}

/// An endpoint that can only receive; attaching it must fail.
#[derive(Default)]
pub struct ReceiveOnlyEndpoint {
    pub listened: AtomicBool,
}

impl RemoteEndpoint for ReceiveOnlyEndpoint {
    fn name(&self) -> &str {
        "receive-only"
    }

    fn sender(&self) -> Option<Arc<dyn Sendable>> {
        None
    }

    fn listen(&self, _listener: InboundListener) -> bool {
        self.listened.store(true, Ordering::SeqCst);
        true
    }
}
