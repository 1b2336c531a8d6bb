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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved marker carried in the `type` field of every bus envelope.
///
/// Inbound remote values are admitted only when their `type` equals this
/// exact string.
pub const BUS_MARKER: &str = "courier:bus-message";

/// Reserved link channel used to multiplex all bus traffic over one transport link.
///
/// The `courier:` namespace keeps it apart from user-chosen channel names.
pub const RELAY_CHANNEL: &str = "courier:relay";

/// A structural record describing a message that crosses a remote boundary.
///
/// On the wire an envelope is a JSON object of the form
///
/// ```json
/// { "type": "courier:bus-message", "channel": "prices", "payload": { "x": 1 }, "returnChannel": "prices:reply:Xk3..." }
/// ```
///
/// where `returnChannel` is omitted when absent. The payload is carried opaquely;
/// the bus never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    marker: String,
    channel: String,
    #[serde(default)]
    payload: Value,
    #[serde(
        rename = "returnChannel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    return_channel: Option<String>,
}

impl Envelope {
    /// Builds an envelope for `channel`, stamping it with [`BUS_MARKER`].
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        payload: Value,
        return_channel: Option<String>,
    ) -> Self {
        Self {
            marker: BUS_MARKER.to_string(),
            channel: channel.into(),
            payload,
            return_channel,
        }
    }

    /// Structurally decodes an inbound remote value.
    ///
    /// Returns `None` for anything that is not an object carrying the exact
    /// marker, and for marked objects whose `channel` is not a string. A missing
    /// payload decodes as `null`; a non-string `returnChannel` is treated as absent.
    #[must_use]
    pub fn recognize(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !has_marker(object) {
            return None;
        }
        let channel = object.get("channel")?.as_str()?;
        Some(Self::new(
            channel,
            object.get("payload").cloned().unwrap_or(Value::Null),
            object
                .get("returnChannel")
                .and_then(Value::as_str)
                .map(str::to_owned),
        ))
    }

    /// The channel this envelope is addressed to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The opaque payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// The return channel a responder should publish to, if the sender is waiting.
    #[must_use]
    pub fn return_channel(&self) -> Option<&str> {
        self.return_channel.as_deref()
    }

    /// Consumes the envelope, yielding `(channel, payload, return_channel)`.
    #[must_use]
    pub fn into_parts(self) -> (String, Value, Option<String>) {
        (self.channel, self.payload, self.return_channel)
    }

    /// Renders the envelope in its on-wire shape.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(4);
        object.insert("type".into(), Value::String(self.marker.clone()));
        object.insert("channel".into(), Value::String(self.channel.clone()));
        object.insert("payload".into(), self.payload.clone());
        if let Some(return_channel) = &self.return_channel {
            object.insert("returnChannel".into(), Value::String(return_channel.clone()));
        }
        Value::Object(object)
    }
}

/// Returns `true` iff `value` is an object whose `type` field equals [`BUS_MARKER`].
///
/// This is the sole admission test for values arriving from a remote endpoint.
#[must_use]
pub fn is_envelope(value: &Value) -> bool {
    value.as_object().is_some_and(has_marker)
}

fn has_marker(object: &Map<String, Value>) -> bool {
    object.get("type").and_then(Value::as_str) == Some(BUS_MARKER)
}
