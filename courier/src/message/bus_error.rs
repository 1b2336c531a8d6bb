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

use thiserror::Error;

/// Errors surfaced by bus operations.
///
/// Failures stay local to the operation that detected them. Publishing to a
/// channel without subscribers and receiving foreign remote input are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A waiting dispatch received no response before its deadline.
    #[error("no response on channel '{channel}' within {timeout:?}")]
    Timeout {
        /// The channel the request was published on.
        channel: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// `attach` was given an endpoint lacking the send or receive capability.
    #[error("remote endpoint '{name}' does not expose the send/receive capability")]
    InvalidRemote {
        /// Name reported by the rejected endpoint.
        name: String,
    },

    /// The pending request's result slot was dropped without a response.
    #[error("return channel '{channel}' closed before a response arrived")]
    ReplyChannelClosed {
        /// The ephemeral return channel.
        channel: String,
    },
}

/// Errors raised by transports while moving envelopes between processes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer or the local writer has gone away.
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue is full; the envelope was dropped.
    #[error("outbound queue full")]
    QueueFull,

    /// A frame body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A frame violated the link protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Socket or pipe failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err.to_string())
        }
    }
}
