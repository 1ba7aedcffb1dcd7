//! PostgreSQL wire protocol messages.

pub mod auth;
pub mod bind;
pub mod close;
pub mod command_complete;
pub mod copy;
pub mod describe;
pub mod error_response;
pub mod execute;
pub mod notice_response;
pub mod parameter_status;
pub mod parse;
pub mod payload;
pub mod query;
pub mod rfq;
pub mod startup;
pub mod sync;
pub mod terminate;

pub use auth::Authentication;
pub use bind::Bind;
pub use close::Close;
pub use command_complete::CommandComplete;
pub use copy::{CopyData, CopyDone, CopyFail};
pub use describe::Describe;
pub use error_response::ErrorResponse;
pub use execute::Execute;
pub use notice_response::NoticeResponse;
pub use parameter_status::ParameterStatus;
pub use parse::Parse;
pub use payload::Payload;
pub use query::Query;
pub use rfq::ReadyForQuery;
pub use startup::Startup;
pub use sync::Sync;
pub use terminate::Terminate;

use super::Error;
use bytes::{Buf, Bytes};

pub mod prelude {
    pub(crate) use super::code;
    pub use super::{FromBytes, Message, Payload, Protocol, ToBytes};
    pub use crate::net::Error;
    pub use bytes::{Buf, BufMut, Bytes};
}

/// Check the message code before decoding the rest of it.
macro_rules! code {
    ($bytes:expr, $code:expr) => {
        let code = $bytes.get_u8() as char;
        if code != $code {
            return Err(Error::UnexpectedMessage {
                expected: $code,
                got: code,
            });
        }
    };
}

pub(crate) use code;

/// Convert a message to its wire representation.
pub trait ToBytes {
    fn to_bytes(&self) -> Result<Bytes, Error>;
}

/// Decode a message from its wire representation.
pub trait FromBytes: Sized {
    fn from_bytes(bytes: Bytes) -> Result<Self, Error>;
}

/// A Postgres protocol message.
pub trait Protocol: ToBytes + std::fmt::Debug {
    /// Message code, e.g. 'Q' for Query.
    fn code(&self) -> char;

    /// Erase the message type, keeping only the wire bytes.
    fn message(&self) -> Result<Message, Error> {
        Ok(Message::new(self.to_bytes()?))
    }
}

/// Type-erased protocol message, as read off a socket.
#[derive(Clone, PartialEq)]
pub struct Message {
    payload: Bytes,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("code", &self.code())
            .field("len", &self.payload.len())
            .finish()
    }
}

impl Message {
    /// Wrap wire bytes. The first byte is the message code.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Full message bytes, including the code and length header.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl Protocol for Message {
    fn code(&self) -> char {
        *self.payload.first().unwrap_or(&0) as char
    }
}

impl ToBytes for Message {
    fn to_bytes(&self) -> Result<Bytes, Error> {
        Ok(self.payload.clone())
    }
}

impl FromBytes for Message {
    fn from_bytes(bytes: Bytes) -> Result<Self, Error> {
        Ok(Self::new(bytes))
    }
}

/// Read a NUL-terminated string out of the buffer.
pub fn c_string_buf(bytes: &mut Bytes) -> String {
    let mut buf = Vec::new();

    while bytes.has_remaining() {
        let byte = bytes.get_u8();
        if byte == 0 {
            break;
        }
        buf.push(byte);
    }

    String::from_utf8_lossy(&buf).into_owned()
}
