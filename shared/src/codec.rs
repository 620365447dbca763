//! Frame codec for the two channels.
//!
//! The reliable channel is a byte stream, so messages are framed with a
//! 4-byte little-endian length prefix followed by the bincode body. The
//! best-effort channel is datagram based and carries bare bincode bodies.

use crate::error::SyncError;
use crate::messages::Message;

/// Length of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Upper bound for a single frame body. A full-catchup message for a large
/// world is the biggest thing on the wire; anything beyond this is a
/// protocol violation.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// Encodes a message as a length-prefixed frame for the reliable channel.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, SyncError> {
    let body = bincode::serialize(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(SyncError::FrameTooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reads the body length out of a frame header, bounds-checked.
pub fn frame_len(header: [u8; FRAME_HEADER_LEN]) -> Result<usize, SyncError> {
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SyncError::FrameTooLarge(len));
    }
    Ok(len)
}

/// Encodes a message as a bare datagram for the best-effort channel.
pub fn encode_datagram(message: &Message) -> Result<Vec<u8>, SyncError> {
    Ok(bincode::serialize(message)?)
}

/// Decodes a frame body or datagram back into a message.
pub fn decode_message(body: &[u8]) -> Result<Message, SyncError> {
    Ok(bincode::deserialize(body)?)
}
