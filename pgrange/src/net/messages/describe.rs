//! Describe (F) message.
use std::str::from_utf8;

use super::prelude::*;

/// Describe a prepared statement or portal.
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    payload: Bytes,
}

impl Describe {
    pub fn new_statement(name: &str) -> Describe {
        let mut payload = Payload::named('D');
        payload.put_u8(b'S');
        payload.put_string(name);
        Describe {
            payload: payload.freeze(),
        }
    }

    pub fn new_portal(name: &str) -> Describe {
        let mut payload = Payload::named('D');
        payload.put_u8(b'P');
        payload.put_string(name);
        Describe {
            payload: payload.freeze(),
        }
    }

    pub fn is_statement(&self) -> bool {
        self.kind() == 'S'
    }

    pub fn name(&self) -> &str {
        from_utf8(&self.payload[6..self.payload.len() - 1]).unwrap_or("")
    }

    pub fn kind(&self) -> char {
        self.payload[5] as char
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl FromBytes for Describe {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        let original = bytes.clone();
        code!(bytes, 'D');

        Ok(Self { payload: original })
    }
}

impl ToBytes for Describe {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        Ok(self.payload.clone())
    }
}

impl Protocol for Describe {
    fn code(&self) -> char {
        'D'
    }
}
