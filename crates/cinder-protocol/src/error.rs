//! Protocol error types.

use thiserror::Error;

/// Fatal protocol violations. Any of these drops the connection;
/// recoverable problems (unknown command, bad arity, bad bulk count)
/// are reported inline as [`Parsed::Error`](crate::Parsed::Error)
/// and leave the connection open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The client sent more than the inline limit without a newline.
    #[error("unterminated command line exceeds {0} bytes")]
    LineTooLong(usize),
}
