//! Direct-to-buffer reply serialization.
//!
//! Replies are raw byte sequences with no uniform framing: status lines
//! carry a `+` prefix, errors a `-`, integers are bare digits, bulks are
//! length-prefixed, and a handful of commands emit a bare line. Every
//! shape ends in CRLF. Integer-to-string conversion uses `itoa`.

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};

/// Type mismatch, shared between the inline and bulk-framed variants.
pub const WRONG_TYPE: &str = "ERR Operation against a key holding the wrong kind of value";
/// Missing key where the command demands one (RENAME, LSET, LTRIM).
pub const NO_SUCH_KEY: &str = "ERR no such key";
pub const UNKNOWN_COMMAND: &str = "ERR unknown command";
pub const WRONG_ARG_COUNT: &str = "ERR wrong number of arguments";
pub const INVALID_BULK_COUNT: &str = "ERR invalid bulk write count";
pub const INVALID_DB_INDEX: &str = "ERR invalid DB index";
pub const INDEX_OUT_OF_RANGE: &str = "ERR index out of range";
pub const SAME_KEY: &str = "ERR src and dest key are the same";
pub const BGSAVE_IN_PROGRESS: &str = "ERR background save already in progress";
/// The bare failure reply SAVE and BGSAVE use.
pub const SAVE_FAILED: &str = "ERR";
pub const SHUTDOWN_SAVE_FAILED: &str = "ERR can't quit, problems saving the DB";

/// A reply staged for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+<status>\r\n` — OK, PONG.
    Status(&'static str),
    /// `-<message>\r\n`.
    Error(Cow<'static, str>),
    /// The bulk-framed error: a bulk whose length is the negated byte
    /// length of the error line, followed by the error line itself.
    ErrorBulk(&'static str),
    /// `<n>\r\n` — integers and the sentinel family (0, 1, -1 … -4).
    Int(i64),
    /// `<len>\r\n<bytes>\r\n`.
    Bulk(Bytes),
    /// `nil\r\n` — the missing-value bulk.
    Nil,
    /// `<bytes>\r\n` with no length prefix (TYPE, RANDOMKEY).
    Line(Bytes),
    /// `<count>\r\n` followed by `count` bulks (LRANGE, SINTER).
    MultiBulk(Vec<Bytes>),
}

impl Reply {
    pub fn error(message: &'static str) -> Reply {
        Reply::Error(Cow::Borrowed(message))
    }

    /// Serializes this reply into the connection's write buffer.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Reply::Status(status) => {
                dst.put_u8(b'+');
                dst.put_slice(status.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Error(message) => {
                dst.put_u8(b'-');
                dst.put_slice(message.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::ErrorBulk(message) => {
                // the error line is "-<message>\r\n"; its length without
                // the CRLF, negated, is the advertised bulk length
                write_i64(-(message.len() as i64 + 1), dst);
                dst.put_slice(b"\r\n-");
                dst.put_slice(message.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Int(n) => {
                write_i64(*n, dst);
                dst.put_slice(b"\r\n");
            }
            Reply::Bulk(data) => {
                write_bulk(data, dst);
            }
            Reply::Nil => {
                dst.put_slice(b"nil\r\n");
            }
            Reply::Line(data) => {
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Reply::MultiBulk(items) => {
                write_i64(items.len() as i64, dst);
                dst.put_slice(b"\r\n");
                for item in items {
                    write_bulk(item, dst);
                }
            }
        }
    }
}

fn write_bulk(data: &[u8], dst: &mut BytesMut) {
    write_i64(data.len() as i64, dst);
    dst.put_slice(b"\r\n");
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
}

/// Writes an i64 as decimal ASCII directly into the buffer.
fn write_i64(val: i64, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(val).as_bytes());
}
