//! Message payload writer.

use bytes::{BufMut, Bytes, BytesMut};

use std::ops::{Deref, DerefMut};

/// Payload builder computing the length header at freeze time.
#[derive(Debug, Clone)]
pub struct Payload {
    code: Option<char>,
    bytes: BytesMut,
}

impl Payload {
    /// Payload for a message with a code, e.g. 'Q'.
    pub fn named(code: char) -> Self {
        Self {
            code: Some(code),
            bytes: BytesMut::new(),
        }
    }

    /// Payload for a message without a code, e.g. startup.
    pub fn wrapped() -> Self {
        Self {
            code: None,
            bytes: BytesMut::new(),
        }
    }

    /// Write a NUL-terminated string.
    pub fn put_string(&mut self, string: &str) {
        self.bytes.put_slice(string.as_bytes());
        self.bytes.put_u8(0);
    }

    /// Finish the message, writing the code and length header.
    pub fn freeze(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.bytes.len() + 5);
        if let Some(code) = self.code {
            buf.put_u8(code as u8);
        }
        buf.put_i32(self.bytes.len() as i32 + 4);
        buf.put_slice(&self.bytes);
        buf.freeze()
    }
}

impl Deref for Payload {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl DerefMut for Payload {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}
