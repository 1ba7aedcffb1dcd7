//! Parse (F) message.

use super::prelude::*;

/// Prepare a statement on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    pub name: String,
    pub query: String,
    pub data_types: Vec<i32>,
}

impl Parse {
    /// Named prepared statement.
    pub fn named(name: impl ToString, query: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            query: query.to_string(),
            data_types: vec![],
        }
    }

    /// Anonymous prepared statement.
    pub fn new_anonymous(query: impl ToString) -> Self {
        Self::named("", query)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

impl FromBytes for Parse {
    fn from_bytes(mut bytes: Bytes) -> Result<Self, Error> {
        code!(bytes, 'P');

        let _len = bytes.get_i32();
        let name = super::c_string_buf(&mut bytes);
        let query = super::c_string_buf(&mut bytes);

        let params = bytes.get_i16();
        let mut data_types = Vec::with_capacity(params as usize);
        for _ in 0..params {
            data_types.push(bytes.get_i32());
        }

        Ok(Self {
            name,
            query,
            data_types,
        })
    }
}

impl ToBytes for Parse {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::named(self.code());
        payload.put_string(&self.name);
        payload.put_string(&self.query);
        payload.put_i16(self.data_types.len() as i16);
        for data_type in &self.data_types {
            payload.put_i32(*data_type);
        }

        Ok(payload.freeze())
    }
}

impl Protocol for Parse {
    fn code(&self) -> char {
        'P'
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let parse = Parse::named("stmt_1", "SELECT $1");
        let decoded = Parse::from_bytes(parse.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.name(), "stmt_1");
        assert_eq!(decoded.query(), "SELECT $1");
        assert!(!decoded.anonymous());
    }
}
