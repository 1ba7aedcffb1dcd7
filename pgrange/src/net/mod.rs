//! Network protocol plumbing.

pub mod error;
pub mod messages;
pub mod parameter;
pub mod stream;

pub use error::Error;
pub use messages::c_string_buf;
pub use messages::{
    Authentication, Bind, Close, CommandComplete, CopyData, CopyDone, CopyFail, Describe,
    ErrorResponse, Execute, FromBytes, Message, NoticeResponse, ParameterStatus, Parse, Payload,
    Protocol, Query, ReadyForQuery, Startup, Sync, Terminate, ToBytes,
};
pub use parameter::{Parameter, Parameters};
pub use stream::Stream;
