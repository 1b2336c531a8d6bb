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

//! Link framing for byte-stream transports.
//!
//! # Wire Format
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Frame Length (4 bytes, big-endian u32, excludes header)       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Protocol Version (1 byte, currently 0x01)                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Body (JSON-encoded LinkFrame)                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::{Envelope, TransportError, RELAY_CHANNEL};

/// Protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Frame header size: 4 bytes length + 1 byte version.
pub const HEADER_SIZE: usize = 5;

/// Maximum frame size (16 MiB hard limit).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// One unit of traffic on a transport link.
///
/// A link may carry traffic for several purposes; bus envelopes travel on
/// [`RELAY_CHANNEL`] and everything else is left to the transport's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkFrame {
    /// Link-level channel the body belongs to.
    pub channel: String,
    /// The raw body.
    pub body: Value,
}

impl LinkFrame {
    /// Wraps a bus envelope for the relay channel.
    #[must_use]
    pub fn relay(envelope: &Envelope) -> Self {
        Self {
            channel: RELAY_CHANNEL.to_string(),
            body: envelope.to_value(),
        }
    }

    /// Whether this frame carries bus traffic.
    #[must_use]
    pub fn is_relay(&self) -> bool {
        self.channel == RELAY_CHANNEL
    }
}

/// Read one frame from the stream.
///
/// A body that fails to decode is reported as [`TransportError::Serialization`]
/// after it has been fully consumed, so the stream stays aligned on the next frame.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<LinkFrame, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let version = header[4];

    if version != PROTOCOL_VERSION {
        return Err(TransportError::Protocol(format!(
            "Unsupported protocol version: {version}, expected {PROTOCOL_VERSION}"
        )));
    }

    let limit = max_size.min(MAX_FRAME_SIZE);
    if length > limit {
        return Err(TransportError::FrameTooLarge {
            size: length,
            max: limit,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    Ok(serde_json::from_slice(&body)?)
}

/// Write one frame to the stream and flush it.
pub async fn write_frame<W>(
    writer: &mut W,
    frame: &LinkFrame,
    max_size: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(frame)?;
    let limit = max_size.min(MAX_FRAME_SIZE);
    if body.len() > limit {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max: limit,
        });
    }
    let length: u32 = body
        .len()
        .try_into()
        .map_err(|_| TransportError::Protocol("Payload too large for u32".to_string()))?;

    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&length.to_be_bytes());
    header[4] = PROTOCOL_VERSION;

    writer.write_all(&header).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn frames_survive_a_duplex_link() {
        let (mut near, mut far) = tokio::io::duplex(1024);
        let envelope = Envelope::new("prices", json!({ "x": 1 }), Some("prices:reply:a".into()));

        write_frame(&mut near, &LinkFrame::relay(&envelope), MAX_FRAME_SIZE)
            .await
            .expect("write");
        let frame = read_frame(&mut far, MAX_FRAME_SIZE).await.expect("read");

        assert!(frame.is_relay());
        assert_eq!(Envelope::recognize(&frame.body), Some(envelope));
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected_on_write() {
        let (mut near, _far) = tokio::io::duplex(64);
        let frame = LinkFrame {
            channel: "bulk".into(),
            body: json!("x".repeat(128)),
        };
        let result = write_frame(&mut near, &frame, 32).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge { max: 32, .. })));
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected_on_read() {
        let (mut near, mut far) = tokio::io::duplex(1024);
        let frame = LinkFrame {
            channel: "bulk".into(),
            body: json!("x".repeat(128)),
        };
        write_frame(&mut near, &frame, MAX_FRAME_SIZE).await.expect("write");
        let result = read_frame(&mut far, 32).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge { max: 32, .. })));
    }

    #[tokio::test]
    async fn wrong_version_is_a_protocol_error() {
        let (mut near, mut far) = tokio::io::duplex(64);
        near.write_all(&[0, 0, 0, 2, 0x7f, b'{', b'}']).await.expect("write");
        let result = read_frame(&mut far, MAX_FRAME_SIZE).await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }

    #[tokio::test]
    async fn closed_stream_reports_connection_closed() {
        let (near, mut far) = tokio::io::duplex(64);
        drop(near);
        let result = read_frame(&mut far, MAX_FRAME_SIZE).await;
        assert_eq!(result, Err(TransportError::ConnectionClosed));
    }
}
