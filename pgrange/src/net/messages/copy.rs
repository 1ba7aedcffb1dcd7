//! COPY subprotocol messages.

use super::prelude::*;

/// CopyData (F & B) message.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyData {
    pub data: Bytes,
}

impl CopyData {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl FromBytes for CopyData {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'd');
        let _len = bytes.get_i32();

        Ok(Self { data: bytes })
    }
}

impl ToBytes for CopyData {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_slice(&self.data);

        Ok(payload.freeze())
    }
}

impl Protocol for CopyData {
    fn code(&self) -> char {
        'd'
    }
}

/// CopyDone (F & B) message.
#[derive(Debug, Clone)]
pub struct CopyDone;

impl FromBytes for CopyDone {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'c');
        let _len = bytes.get_i32();

        Ok(CopyDone)
    }
}

impl ToBytes for CopyDone {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let payload = Payload::named(self.code());
        Ok(payload.freeze())
    }
}

impl Protocol for CopyDone {
    fn code(&self) -> char {
        'c'
    }
}

/// CopyFail (F) message.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyFail {
    pub message: String,
}

impl CopyFail {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl FromBytes for CopyFail {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'f');
        let _len = bytes.get_i32();
        let message = super::c_string_buf(&mut bytes);

        Ok(Self { message })
    }
}

impl ToBytes for CopyFail {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_string(&self.message);

        Ok(payload.freeze())
    }
}

impl Protocol for CopyFail {
    fn code(&self) -> char {
        'f'
    }
}
