//! NoticeResponse (B) message.

use super::prelude::*;
use crate::net::c_string_buf;

/// NoticeResponse (B) message.
#[derive(Debug, Clone)]
pub struct NoticeResponse {
    pub severity: String,
    pub message: String,
}

impl NoticeResponse {
    pub fn notice(message: impl ToString) -> Self {
        Self {
            severity: "NOTICE".into(),
            message: message.to_string(),
        }
    }
}

impl FromBytes for NoticeResponse {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'N');

        let _len = bytes.get_i32();

        let mut severity = String::new();
        let mut message = String::new();

        while bytes.has_remaining() {
            let field = bytes.get_u8() as char;
            let value = c_string_buf(&mut bytes);

            match field {
                'S' => severity = value,
                'M' => message = value,
                _ => continue,
            }
        }

        Ok(Self { severity, message })
    }
}

impl ToBytes for NoticeResponse {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());

        payload.put_u8(b'S');
        payload.put_string(&self.severity);

        payload.put_u8(b'M');
        payload.put_string(&self.message);

        payload.put_u8(0);

        Ok(payload.freeze())
    }
}

impl Protocol for NoticeResponse {
    fn code(&self) -> char {
        'N'
    }
}
