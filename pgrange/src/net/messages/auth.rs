//! Authentication (B) messages.

use super::prelude::*;

/// Authentication request. Only trust auth is supported:
/// anything other than AuthenticationOk is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Authentication {
    Ok,
}

impl FromBytes for Authentication {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'R');

        let _len = bytes.get_i32();
        let status = bytes.get_i32();

        match status {
            0 => Ok(Authentication::Ok),
            status => Err(Error::UnsupportedAuthentication(status)),
        }
    }
}

impl ToBytes for Authentication {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_i32(0);

        Ok(payload.freeze())
    }
}

impl Protocol for Authentication {
    fn code(&self) -> char {
        'R'
    }
}
