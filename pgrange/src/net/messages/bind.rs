//! Bind (F) message.

use std::str::from_utf8;

use super::prelude::*;

/// Bind a portal to a prepared statement.
///
/// Parameter values are relayed as-is; the router only ever
/// inspects literals in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    payload: Bytes,
}

impl Bind {
    /// Bind the anonymous portal to a statement, with no parameters.
    pub fn new_statement(statement: &str) -> Self {
        let mut payload = Payload::named('B');
        payload.put_string(""); // portal
        payload.put_string(statement);
        payload.put_i16(0); // parameter format codes
        payload.put_i16(0); // parameters
        payload.put_i16(0); // result format codes
        Self {
            payload: payload.freeze(),
        }
    }

    /// Destination portal name.
    pub fn portal(&self) -> &str {
        let end = 5 + self.payload[5..]
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.payload.len() - 5);
        from_utf8(&self.payload[5..end]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl FromBytes for Bind {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        let original = bytes.clone();
        code!(bytes, 'B');

        Ok(Self { payload: original })
    }
}

impl ToBytes for Bind {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        Ok(self.payload.clone())
    }
}

impl Protocol for Bind {
    fn code(&self) -> char {
        'B'
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bind() {
        let bind = Bind::new_statement("stmt_1");
        assert_eq!(bind.len(), bind.to_bytes().unwrap().len());
        assert_eq!(bind.portal(), "");
    }
}
