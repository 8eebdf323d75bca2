//! cinder-protocol: the line-oriented wire protocol.
//!
//! Requests are single lines tokenized on spaces; commands marked as
//! *bulk* carry a length-prefixed payload after the command line.
//! Replies are raw byte sequences (status lines, bare integers, bulks,
//! multi-bulks) serialized directly into the connection's write buffer.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use cinder_protocol::{Command, Parsed, Reply, RequestParser};
//!
//!
//! let mut parser = RequestParser::new();
//! let mut buf = BytesMut::from(&b"ping\r\n"[..]);
//! match parser.next(&mut buf).unwrap() {
//!     Some(Parsed::Command(Command::Ping)) => {}
//!     other => panic!("expected PING, got {other:?}"),
//! }
//!
//! let mut out = BytesMut::new();
//! Reply::Status("PONG").serialize(&mut out);
//! assert_eq!(&out[..], b"+PONG\r\n");
//! ```

pub mod command;
pub mod error;
pub mod parser;
pub mod reply;

pub use command::{lookup, Command, CommandSpec};
pub use error::ProtocolError;
pub use parser::{Parsed, RequestParser};
pub use reply::Reply;
