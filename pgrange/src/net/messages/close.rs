//! Close (F) message.
use std::str::from_utf8;

use super::prelude::*;

/// Close a prepared statement or portal.
#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    payload: Bytes,
}

impl Close {
    pub fn named(name: &str) -> Self {
        let mut payload = Payload::named('C');
        payload.put_u8(b'S');
        payload.put_string(name);
        Self {
            payload: payload.freeze(),
        }
    }

    pub fn portal(name: &str) -> Self {
        let mut payload = Payload::named('C');
        payload.put_u8(b'P');
        payload.put_string(name);
        Self {
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

impl FromBytes for Close {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        let original = bytes.clone();
        code!(bytes, 'C');

        Ok(Self { payload: original })
    }
}

impl ToBytes for Close {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        Ok(self.payload.clone())
    }
}

impl Protocol for Close {
    fn code(&self) -> char {
        'C'
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_close() {
        let close = Close::named("test");
        assert_eq!(close.len(), close.to_bytes().unwrap().len());
        assert_eq!(close.name(), "test");
    }
}
