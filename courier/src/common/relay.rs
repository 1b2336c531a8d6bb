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

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::common::BusStats;
use crate::message::{BusError, Envelope};
use crate::traits::{InboundListener, RemoteEndpoint, Sendable};

struct AttachedEndpoint {
    name: String,
    sender: Arc<dyn Sendable>,
}

/// The set of remote endpoints this bus relays its traffic to.
///
/// Endpoints are never removed: a failing send is logged and counted, and the
/// endpoint stays attached.
#[derive(Default)]
pub(crate) struct RemoteRelay {
    endpoints: RwLock<Vec<AttachedEndpoint>>,
}

impl RemoteRelay {
    /// Probes `endpoint` for both capabilities and, if present, adds it.
    ///
    /// `listener` is registered only after the send capability checks out, so
    /// a rejected endpoint is left untouched.
    pub(crate) fn attach<E>(&self, endpoint: &E, listener: InboundListener) -> Result<(), BusError>
    where
        E: RemoteEndpoint + ?Sized,
    {
        let name = endpoint.name().to_string();
        let Some(sender) = endpoint.sender() else {
            debug!(endpoint = %name, "Rejected endpoint without send capability");
            return Err(BusError::InvalidRemote { name });
        };
        if !endpoint.listen(listener) {
            debug!(endpoint = %name, "Rejected endpoint that refused an inbound listener");
            return Err(BusError::InvalidRemote { name });
        }

        debug!(endpoint = %name, "Remote endpoint attached");
        self.endpoints.write().push(AttachedEndpoint { name, sender });
        Ok(())
    }

    /// Sends `envelope` to every attached endpoint. Returns how many accepted it.
    pub(crate) fn forward(&self, envelope: &Envelope, stats: &BusStats) -> usize {
        let targets: Vec<(String, Arc<dyn Sendable>)> = self
            .endpoints
            .read()
            .iter()
            .map(|endpoint| (endpoint.name.clone(), endpoint.sender.clone()))
            .collect(); // Release lock before sending

        let mut relayed = 0;
        for (name, sender) in targets {
            match sender.send(envelope) {
                Ok(()) => {
                    relayed += 1;
                    stats.record_relayed();
                    trace!(endpoint = %name, channel = envelope.channel(), "Relayed envelope");
                }
                Err(e) => {
                    stats.record_relay_failure();
                    warn!(endpoint = %name, channel = envelope.channel(), error = %e, "Failed to relay envelope");
                }
            }
        }
        relayed
    }

    pub(crate) fn endpoint_count(&self) -> usize {
        self.endpoints.read().len()
    }

    pub(crate) fn endpoint_names(&self) -> Vec<String> {
        self.endpoints
            .read()
            .iter()
            .map(|endpoint| endpoint.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};

    use super::*;
    use crate::message::TransportError;

    struct CountingSender {
        fail: bool,
        sends: AtomicUsize,
    }

    impl Sendable for CountingSender {
        fn send(&self, _envelope: &Envelope) -> Result<(), TransportError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::ConnectionClosed)
            } else {
                Ok(())
            }
        }
    }

    struct StubEndpoint {
        name: &'static str,
        sender: Option<Arc<CountingSender>>,
        accepts_listener: bool,
    }

    impl RemoteEndpoint for StubEndpoint {
        fn name(&self) -> &str {
            self.name
        }

        fn sender(&self) -> Option<Arc<dyn Sendable>> {
            self.sender.clone().map(|sender| sender as Arc<dyn Sendable>)
        }

        fn listen(&self, _listener: InboundListener) -> bool {
            self.accepts_listener
        }
    }

    fn counting(fail: bool) -> Arc<CountingSender> {
        Arc::new(CountingSender {
            fail,
            sends: AtomicUsize::new(0),
        })
    }

    fn listener() -> InboundListener {
        Arc::new(|_: Value| {})
    }

    #[test]
    fn rejects_endpoints_missing_a_capability() {
        let relay = RemoteRelay::default();
        let mute = StubEndpoint {
            name: "mute",
            sender: None,
            accepts_listener: true,
        };
        let deaf = StubEndpoint {
            name: "deaf",
            sender: Some(counting(false)),
            accepts_listener: false,
        };

        assert_eq!(
            relay.attach(&mute, listener()),
            Err(BusError::InvalidRemote { name: "mute".into() })
        );
        assert!(relay.attach(&deaf, listener()).is_err());
        assert_eq!(relay.endpoint_count(), 0);
    }

    #[test]
    fn failing_endpoint_does_not_stop_the_rest() {
        let relay = RemoteRelay::default();
        let stats = BusStats::default();
        let broken = counting(true);
        let healthy = counting(false);
        for (name, sender) in [("broken", &broken), ("healthy", &healthy)] {
            let endpoint = StubEndpoint {
                name,
                sender: Some(sender.clone()),
                accepts_listener: true,
            };
            relay.attach(&endpoint, listener()).expect("attach");
        }

        let envelope = Envelope::new("c", json!(1), None);
        assert_eq!(relay.forward(&envelope, &stats), 1);
        assert_eq!(relay.forward(&envelope, &stats), 1);

        assert_eq!(broken.sends.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.sends.load(Ordering::SeqCst), 2);
        assert_eq!(stats.relay_failures(), 2);
        assert_eq!(relay.endpoint_names(), vec!["broken", "healthy"]);
    }
}
