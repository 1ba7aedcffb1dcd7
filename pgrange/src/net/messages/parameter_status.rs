//! ParameterStatus (B) message.

use super::prelude::*;
use crate::net::c_string_buf;

/// ParameterStatus (B) message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl ParameterStatus {
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl FromBytes for ParameterStatus {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'S');

        let _len = bytes.get_i32();
        let name = c_string_buf(&mut bytes);
        let value = c_string_buf(&mut bytes);

        Ok(Self { name, value })
    }
}

impl ToBytes for ParameterStatus {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_string(&self.name);
        payload.put_string(&self.value);

        Ok(payload.freeze())
    }
}

impl Protocol for ParameterStatus {
    fn code(&self) -> char {
        'S'
    }
}
