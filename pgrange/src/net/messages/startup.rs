//! Startup (F) message.

use super::prelude::*;
use crate::net::{c_string_buf, Parameter};

const PROTOCOL_VERSION: i32 = 196608; // 3.0
const SSL_REQUEST: i32 = 80877103;
const CANCEL_REQUEST: i32 = 80877102;

/// Startup packet. Unlike all other messages,
/// it has no code byte, only a length header.
#[derive(Debug, Clone, PartialEq)]
pub enum Startup {
    Startup { params: Vec<Parameter> },
    Ssl,
    Cancel { pid: i32, secret: i32 },
}

impl Startup {
    /// Startup packet for a backend connection.
    pub fn new(user: &str, database: &str) -> Self {
        Self::Startup {
            params: vec![
                Parameter::new("user", user),
                Parameter::new("database", database),
            ],
        }
    }

    /// Decode the packet body. The length header has
    /// already been consumed by the caller.
    pub fn from_body(mut bytes: Bytes) -> Result<Self, Error> {
        let version = bytes.get_i32();

        match version {
            SSL_REQUEST => Ok(Startup::Ssl),
            CANCEL_REQUEST => {
                let pid = bytes.get_i32();
                let secret = bytes.get_i32();
                Ok(Startup::Cancel { pid, secret })
            }
            PROTOCOL_VERSION => {
                let mut params = vec![];
                while bytes.has_remaining() {
                    let name = c_string_buf(&mut bytes);
                    if name.is_empty() {
                        break;
                    }
                    let value = c_string_buf(&mut bytes);
                    params.push(Parameter { name, value });
                }
                Ok(Startup::Startup { params })
            }
            version => Err(Error::UnsupportedProtocolVersion(version)),
        }
    }
}

impl ToBytes for Startup {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut payload = Payload::wrapped();

        match self {
            Startup::Startup { params } => {
                payload.put_i32(PROTOCOL_VERSION);
                for param in params {
                    payload.put_string(&param.name);
                    payload.put_string(&param.value);
                }
                payload.put_u8(0);
            }
            Startup::Ssl => {
                payload.put_i32(SSL_REQUEST);
            }
            Startup::Cancel { pid, secret } => {
                payload.put_i32(CANCEL_REQUEST);
                payload.put_i32(*pid);
                payload.put_i32(*secret);
            }
        }

        Ok(payload.freeze())
    }
}
