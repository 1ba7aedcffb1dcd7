//! ReadyForQuery (B) message.

use super::prelude::*;

/// ReadyForQuery (B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadyForQuery {
    pub status: char,
}

impl ReadyForQuery {
    /// Not inside a transaction.
    pub fn idle() -> Self {
        ReadyForQuery { status: 'I' }
    }

    /// Inside a transaction.
    pub fn in_transaction() -> Self {
        ReadyForQuery { status: 'T' }
    }

    /// Inside an aborted transaction.
    pub fn error() -> Self {
        ReadyForQuery { status: 'E' }
    }

    pub fn status(&self) -> char {
        self.status
    }
}

impl ToBytes for ReadyForQuery {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_u8(self.status as u8);

        Ok(payload.freeze())
    }
}

impl FromBytes for ReadyForQuery {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'Z');

        let _len = bytes.get_i32();
        let status = bytes.get_u8() as char;

        Ok(Self { status })
    }
}

impl Protocol for ReadyForQuery {
    fn code(&self) -> char {
        'Z'
    }
}
