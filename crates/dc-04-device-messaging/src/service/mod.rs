//! Message protocol service.

pub mod protocol;

pub use protocol::MessageProtocol;
