//! Typed puts and gets on top of the framed protocol.

use std::io::{BufReader, Read, Write};

use glam::{Mat4, Vec3};
use volcast_core::{Brick, FrameImage, TransferFunction};

use crate::error::{NetError, Result};
use crate::protocol::{read_frame, write_frame, CommReason, Message, PROTOCOL_VERSION};

/// Write half of a transport channel.
pub struct MessageWriter<W: Write> {
    inner: W,
}

impl<W: Write> MessageWriter<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Send one message.
    pub fn put(&mut self, msg: &Message) -> Result<()> {
        write_frame(&mut self.inner, msg)
    }

    pub fn put_hello(&mut self) -> Result<()> {
        self.put(&Message::Hello {
            version: PROTOCOL_VERSION,
        })
    }

    pub fn put_reason(&mut self, reason: CommReason) -> Result<()> {
        self.put(&Message::Reason(reason))
    }

    pub fn put_int32(&mut self, value: i32) -> Result<()> {
        self.put(&Message::Int32(value))
    }

    pub fn put_float(&mut self, value: f32) -> Result<()> {
        self.put(&Message::Float32(value))
    }

    pub fn put_bool(&mut self, value: bool) -> Result<()> {
        self.put(&Message::Bool(value))
    }

    pub fn put_vector3(&mut self, value: Vec3) -> Result<()> {
        self.put(&Message::Vector3(value))
    }

    pub fn put_matrix(&mut self, value: &Mat4) -> Result<()> {
        self.put(&Message::Matrix(*value))
    }

    pub fn put_win_dims(&mut self, width: i32, height: i32) -> Result<()> {
        self.put(&Message::WinDims { width, height })
    }

    pub fn put_transfer_function(&mut self, tf: &TransferFunction) -> Result<()> {
        self.put(&Message::TransferFunction(tf.clone()))
    }

    pub fn put_bricks(&mut self, bricks: &[Brick]) -> Result<()> {
        self.put(&Message::Bricks(bricks.to_vec()))
    }

    pub fn put_image(&mut self, image: &FrameImage) -> Result<()> {
        self.put(&Message::Image(image.clone()))
    }
}

/// Read half of a transport channel.
pub struct MessageReader<R: Read> {
    inner: BufReader<R>,
}

/// Generates a typed get that fails on any other message kind.
macro_rules! typed_get {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $expected:literal, $pat:pat => $value:expr) => {
        $(#[$meta])*
        pub fn $name(&mut self) -> Result<$ty> {
            match self.get_message()? {
                $pat => Ok($value),
                other => Err(NetError::UnexpectedMessage {
                    expected: $expected,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl<R: Read> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Block until the next message arrives.
    pub fn get_message(&mut self) -> Result<Message> {
        read_frame(&mut self.inner)
    }

    typed_get!(
        /// Read the handshake and return the peer's protocol version.
        get_hello, u8, "hello", Message::Hello { version } => version
    );
    typed_get!(get_reason, CommReason, "reason", Message::Reason(r) => r);
    typed_get!(get_int32, i32, "int32", Message::Int32(v) => v);
    typed_get!(get_float, f32, "float32", Message::Float32(v) => v);
    typed_get!(get_bool, bool, "bool", Message::Bool(v) => v);
    typed_get!(get_vector3, Vec3, "vector3", Message::Vector3(v) => v);
    typed_get!(get_matrix, Mat4, "matrix", Message::Matrix(m) => m);
    typed_get!(
        get_win_dims, (i32, i32), "window dimensions",
        Message::WinDims { width, height } => (width, height)
    );
    typed_get!(
        get_transfer_function, TransferFunction, "transfer function",
        Message::TransferFunction(tf) => tf
    );
    typed_get!(get_bricks, Vec<Brick>, "bricks", Message::Bricks(b) => b);

    /// Block until a complete, well-formed image arrives.
    pub fn get_image(&mut self) -> Result<FrameImage> {
        match self.get_message()? {
            Message::Image(image) => {
                image.validate()?;
                Ok(image)
            }
            other => Err(NetError::UnexpectedMessage {
                expected: "image",
                found: other.kind(),
            }),
        }
    }
}
