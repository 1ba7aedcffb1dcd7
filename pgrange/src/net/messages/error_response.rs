//! ErrorResponse (B) message.
use std::fmt::Display;

use super::prelude::*;
use crate::net::c_string_buf;

/// ErrorResponse (B) message.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub severity: String,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            severity: "ERROR".into(),
            code: String::default(),
            message: String::default(),
            detail: None,
        }
    }
}

impl ErrorResponse {
    /// Routing error surfaced to the client; the session stays open.
    pub fn routing(message: impl ToString) -> ErrorResponse {
        ErrorResponse {
            severity: "ERROR".into(),
            code: "58000".into(),
            message: message.to_string(),
            detail: None,
        }
    }

    /// Syntax error.
    pub fn syntax(err: &str) -> ErrorResponse {
        Self {
            severity: "ERROR".into(),
            code: "42601".into(),
            message: err.into(),
            detail: None,
        }
    }

    pub fn from_err(err: &impl std::error::Error) -> Self {
        Self {
            severity: "ERROR".into(),
            code: "58000".into(),
            message: err.to_string(),
            detail: None,
        }
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} {}", self.severity, self.code, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, "\n{}", detail)?
        }
        Ok(())
    }
}

impl FromBytes for ErrorResponse {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'E');

        let _len = bytes.get_i32();

        let mut error_response = ErrorResponse::default();

        while bytes.has_remaining() {
            let field = bytes.get_u8() as char;
            let value = c_string_buf(&mut bytes);

            match field {
                'S' => error_response.severity = value,
                'C' => error_response.code = value,
                'M' => error_response.message = value,
                'D' => error_response.detail = Some(value),
                _ => continue,
            }
        }

        Ok(error_response)
    }
}

impl ToBytes for ErrorResponse {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());

        payload.put_u8(b'S');
        payload.put_string(&self.severity);

        payload.put_u8(b'V');
        payload.put_string(&self.severity);

        payload.put_u8(b'C');
        payload.put_string(&self.code);

        payload.put_u8(b'M');
        payload.put_string(&self.message);

        if let Some(ref detail) = self.detail {
            payload.put_u8(b'D');
            payload.put_string(detail);
        }

        payload.put_u8(0);

        Ok(payload.freeze())
    }
}

impl Protocol for ErrorResponse {
    fn code(&self) -> char {
        'E'
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::routing("failed to match any datashard");
        let decoded = ErrorResponse::from_bytes(err.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.severity, "ERROR");
        assert_eq!(decoded.code, "58000");
        assert_eq!(decoded.message, "failed to match any datashard");
    }
}
