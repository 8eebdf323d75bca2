//! The request parser: a two-mode state machine over buffered bytes.
//!
//! *Inline mode* waits for a newline-terminated command line and
//! tokenizes it on spaces. If the line names a bulk command, the parser
//! switches to *bulk mode*: the last inline token is the byte length of
//! a payload that follows, terminated by CRLF. The caller owns the read
//! buffer and calls [`RequestParser::next`] after every read; `Ok(None)`
//! means "need more bytes".
//!
//! Recoverable problems (unknown command, wrong arity, bad bulk count)
//! come back as [`Parsed::Error`] so the connection can reply and keep
//! going; only an oversized unterminated line is fatal.

use bytes::{Bytes, BytesMut};

use crate::command::{self, atoi, Command, CommandSpec};
use crate::error::ProtocolError;
use crate::reply;

/// Longest inline command line we accept before declaring a protocol
/// error on the connection.
pub const MAX_INLINE_LEN: usize = 1024;

/// Inline arguments beyond this are dropped.
pub const MAX_ARGS: usize = 16;

/// Upper bound for a bulk payload (1 GiB).
pub const MAX_BULK_LEN: i64 = 1024 * 1024 * 1024;

/// One parsing outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A complete command ready for execution.
    Command(Command),
    /// An inline error reply; the connection survives and parsing
    /// continues with the next line.
    Error(&'static str),
}

/// Bulk-mode state: the inline argv parsed so far and the bytes still
/// owed on the wire (payload plus trailing CRLF).
#[derive(Debug)]
struct PendingBulk {
    spec: &'static CommandSpec,
    args: Vec<Bytes>,
    remaining: usize,
}

/// Per-connection parser state.
#[derive(Debug, Default)]
pub struct RequestParser {
    bulk: Option<PendingBulk>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the next command (or inline error) from `buf`,
    /// consuming exactly the bytes it used. Returns `Ok(None)` when the
    /// buffer doesn't hold a complete unit of work yet.
    pub fn next(&mut self, buf: &mut BytesMut) -> Result<Option<Parsed>, ProtocolError> {
        loop {
            // bulk mode: wait for the full payload plus CRLF
            if let Some(pending) = self.bulk.take() {
                if buf.len() < pending.remaining {
                    self.bulk = Some(pending);
                    return Ok(None);
                }
                let mut payload = buf.split_to(pending.remaining);
                payload.truncate(pending.remaining - 2);
                let mut args = pending.args;
                args.push(payload.freeze());
                return Ok(Some(Parsed::Command(Command::build(pending.spec, args))));
            }

            // inline mode: find the first newline
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                if buf.len() > MAX_INLINE_LEN {
                    return Err(ProtocolError::LineTooLong(MAX_INLINE_LEN));
                }
                return Ok(None);
            };

            let mut line = buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let line = line.freeze();

            let args: Vec<Bytes> = split_args(&line);
            if args.is_empty() {
                continue; // empty lines are silently skipped
            }

            let name = args[0].to_ascii_lowercase();
            if name == b"quit" {
                return Ok(Some(Parsed::Command(Command::Quit)));
            }

            let Some(spec) = command::lookup(&name) else {
                return Ok(Some(Parsed::Error(reply::UNKNOWN_COMMAND)));
            };

            let argc = args.len() as i32;
            if (spec.arity > 0 && argc != spec.arity) || argc < -spec.arity {
                return Ok(Some(Parsed::Error(reply::WRONG_ARG_COUNT)));
            }

            if spec.bulk {
                // the last inline token is the payload length
                let mut args = args;
                let len_arg = args.pop().unwrap_or_default();
                let len = atoi(&len_arg);
                if !(0..=MAX_BULK_LEN).contains(&len) {
                    return Ok(Some(Parsed::Error(reply::INVALID_BULK_COUNT)));
                }
                self.bulk = Some(PendingBulk {
                    spec,
                    args,
                    remaining: len as usize + 2,
                });
                continue; // the payload may already be buffered
            }

            return Ok(Some(Parsed::Command(Command::build(spec, args))));
        }
    }
}

/// Tokenizes an inline command line: split on single spaces, drop empty
/// tokens, keep at most [`MAX_ARGS`].
fn split_args(line: &Bytes) -> Vec<Bytes> {
    let mut args = Vec::new();
    let mut start = 0;
    for i in 0..=line.len() {
        if i == line.len() || line[i] == b' ' {
            if i > start {
                args.push(line.slice(start..i));
                if args.len() == MAX_ARGS {
                    break;
                }
            }
            start = i + 1;
        }
    }
    args
}
