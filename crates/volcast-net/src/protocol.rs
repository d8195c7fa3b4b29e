//! Wire protocol between coordinator and participants.

use std::io::{ErrorKind, Read, Write};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use volcast_core::{Brick, FrameImage, TransferFunction};

use crate::error::{NetError, Result};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest accepted frame (64 MiB).
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Tag sent ahead of every command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommReason {
    /// Projection + modelview matrices; answered with one image.
    Matrix,
    /// Window dimensions.
    Resize,
    /// Time step index.
    CurrentFrame,
    /// Maximum intensity projection mode.
    MipMode,
    ObjectDirection,
    ViewingDirection,
    Position,
    /// Region of interest on/off.
    ToggleRoi,
    RoiPosition,
    RoiSize,
    /// No payload.
    ToggleBoundingBox,
    TransferFunction,
    Quality,
    Interpolation,
    /// Brick list for one time step.
    Bricks,
    /// No payload; the connection is closed afterwards.
    Exit,
}

/// A single framed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Version handshake, sent by both sides on connect.
    Hello { version: u8 },
    Reason(CommReason),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    Vector3(Vec3),
    Matrix(Mat4),
    WinDims { width: i32, height: i32 },
    TransferFunction(TransferFunction),
    Bricks(Vec<Brick>),
    Image(FrameImage),
}

impl Message {
    /// Short name of the message kind, for diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Reason(_) => "reason",
            Self::Int32(_) => "int32",
            Self::Float32(_) => "float32",
            Self::Bool(_) => "bool",
            Self::Vector3(_) => "vector3",
            Self::Matrix(_) => "matrix",
            Self::WinDims { .. } => "window dimensions",
            Self::TransferFunction(_) => "transfer function",
            Self::Bricks(_) => "bricks",
            Self::Image(_) => "image",
        }
    }
}

/// Encode a message to bytes with length prefix.
pub fn encode<T: Serialize>(msg: &T) -> std::result::Result<Vec<u8>, bincode::Error> {
    let data = bincode::serialize(msg)?;
    let len = data.len() as u32;
    let mut result = Vec::with_capacity(4 + data.len());
    result.extend_from_slice(&len.to_le_bytes());
    result.extend(data);
    Ok(result)
}

/// Decode a message from bytes (without length prefix).
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> std::result::Result<T, bincode::Error> {
    bincode::deserialize(data)
}

/// Write one framed message.
pub fn write_frame<W: Write>(writer: &mut W, msg: &Message) -> Result<()> {
    let data = encode(msg)?;
    if data.len() - 4 > MAX_MESSAGE_LEN {
        return Err(NetError::MessageTooLarge(data.len() - 4));
    }
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

/// Read one framed message. A clean end of stream maps to [`NetError::Closed`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(NetError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(NetError::MessageTooLarge(len));
    }

    let mut data = vec![0u8; len];
    match reader.read_exact(&mut data) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(NetError::Closed),
        Err(e) => return Err(e.into()),
    }
    Ok(decode(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_reason() {
        let msg = Message::Reason(CommReason::Matrix);
        let encoded = encode(&msg).unwrap();

        // Skip length prefix (4 bytes)
        let decoded: Message = decode(&encoded[4..]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn length_prefix_matches_payload() {
        let encoded = encode(&Message::Int32(7)).unwrap();
        let len = u32::from_le_bytes(encoded[..4].try_into().unwrap()) as usize;
        assert_eq!(len, encoded.len() - 4);
    }

    #[test]
    fn read_frame_rejects_oversized_length() {
        let mut data = ((MAX_MESSAGE_LEN + 1) as u32).to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 8]);
        let err = read_frame(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, NetError::MessageTooLarge(_)));
    }

    #[test]
    fn truncated_stream_is_closed() {
        let mut encoded = encode(&Message::Float32(1.5)).unwrap();
        encoded.truncate(encoded.len() - 1);
        let err = read_frame(&mut Cursor::new(encoded)).unwrap_err();
        assert!(matches!(err, NetError::Closed));

        let err = read_frame(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn frames_are_read_in_order() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Message::Reason(CommReason::Quality)).unwrap();
        write_frame(&mut buf, &Message::Float32(0.25)).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(
            read_frame(&mut cursor).unwrap(),
            Message::Reason(CommReason::Quality)
        );
        assert_eq!(read_frame(&mut cursor).unwrap(), Message::Float32(0.25));
        assert!(matches!(read_frame(&mut cursor), Err(NetError::Closed)));
    }
}
