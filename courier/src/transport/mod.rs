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

//! Reference transports implementing [`RemoteEndpoint`](crate::traits::RemoteEndpoint).
//!
//! The bus itself only needs "send an envelope" and "deliver inbound values";
//! these transports supply both over an in-process link and over any byte stream.

pub use frame::{read_frame, write_frame, LinkFrame, HEADER_SIZE, MAX_FRAME_SIZE, PROTOCOL_VERSION};
pub use memory::MemoryEndpoint;
pub use stream::StreamEndpoint;

/// Length-prefixed link framing.
mod frame;
/// In-process linked endpoint pairs.
mod memory;
/// Endpoints over `AsyncRead + AsyncWrite` streams.
mod stream;
