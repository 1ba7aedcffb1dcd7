//! Execute (F) message.

use super::prelude::*;

/// Execute a bound portal.
#[derive(Debug, Clone, PartialEq)]
pub struct Execute {
    pub portal: String,
    pub max_rows: i32,
}

impl Execute {
    /// Execute the anonymous portal.
    pub fn new() -> Self {
        Self {
            portal: "".into(),
            max_rows: 0,
        }
    }

    pub fn portal(&self) -> &str {
        &self.portal
    }
}

impl Default for Execute {
    fn default() -> Self {
        Self::new()
    }
}

impl FromBytes for Execute {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'E');

        let _len = bytes.get_i32();
        let portal = super::c_string_buf(&mut bytes);
        let max_rows = bytes.get_i32();

        Ok(Self { portal, max_rows })
    }
}

impl ToBytes for Execute {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_string(&self.portal);
        payload.put_i32(self.max_rows);

        Ok(payload.freeze())
    }
}

impl Protocol for Execute {
    fn code(&self) -> char {
        'E'
    }
}
