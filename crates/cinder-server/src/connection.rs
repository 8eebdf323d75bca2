//! Per-connection handler.
//!
//! Reads bytes into a buffer, feeds them through the request parser,
//! routes complete commands to the store task, and batches serialized
//! replies into a single write per read burst. The connection closes on
//! QUIT, protocol violations, idle timeout, or any socket error.
//!
//! This module is also where semantic store responses become wire
//! shapes: the same [`StoreResponse::WrongType`] turns into an inline
//! error for LPUSH, a bulk-framed error for GET, and the `-2` sentinel
//! for SADD, because that is what each command speaks on the wire.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use cinder_core::{StoreError, StoreHandle, StoreRequest, StoreResponse};
use cinder_protocol::{reply, Command, Parsed, Reply, RequestParser};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Initial read/write buffer capacity.
const BUF_CAPACITY: usize = 1024;

/// Drives one client connection to completion.
pub async fn handle(
    mut stream: TcpStream,
    store: StoreHandle,
    databases: usize,
    idle_timeout: Duration,
) -> std::io::Result<()> {
    stream.set_nodelay(true)?;

    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);
    let mut parser = RequestParser::new();

    // every connection starts on database 0
    let mut db: usize = 0;

    loop {
        match tokio::time::timeout(idle_timeout, stream.read_buf(&mut buf)).await {
            Ok(Ok(0)) => return Ok(()), // clean disconnect
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                debug!("closing idle client");
                return Ok(());
            }
        }

        // drain as many complete commands as the buffer holds,
        // batching every reply into one write
        out.clear();
        loop {
            match parser.next(&mut buf) {
                Ok(Some(Parsed::Command(Command::Quit))) => {
                    // no reply; flush whatever was already queued
                    if !out.is_empty() {
                        let _ = stream.write_all(&out).await;
                    }
                    return Ok(());
                }
                Ok(Some(Parsed::Command(command))) => {
                    let Ok(reply) = execute(command, &mut db, &store, databases).await else {
                        // the store is gone; nothing useful left to say
                        return Ok(());
                    };
                    reply.serialize(&mut out);
                }
                Ok(Some(Parsed::Error(message))) => {
                    Reply::error(message).serialize(&mut out);
                }
                Ok(None) => break, // need more bytes
                Err(e) => {
                    debug!("client protocol error: {e}");
                    return Ok(());
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }
    }
}

/// Executes one command and produces its wire reply.
///
/// PING, ECHO and SELECT are handled here — they never touch the
/// keyspace. Everything else routes through the store and maps the
/// semantic response onto the command's reply shape.
async fn execute(
    command: Command,
    db: &mut usize,
    store: &StoreHandle,
    databases: usize,
) -> Result<Reply, StoreError> {
    let reply = match command {
        // -- connection-local --
        Command::Ping => Reply::Status("PONG"),
        Command::Echo { message } => Reply::Bulk(message),
        Command::Select { index } => match usize::try_from(index) {
            Ok(index) if index < databases => {
                *db = index;
                Reply::Status("OK")
            }
            _ => Reply::error(reply::INVALID_DB_INDEX),
        },
        Command::Quit => unreachable!("QUIT is handled by the connection loop"),

        // -- strings --
        Command::Get { key } => {
            match store.send(*db, StoreRequest::Get { key }).await? {
                StoreResponse::Bulk(data) => Reply::Bulk(data),
                StoreResponse::Nil => Reply::Nil,
                StoreResponse::WrongType => Reply::ErrorBulk(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::Set { key, value, nx } => {
            match store.send(*db, StoreRequest::Set { key, value, nx }).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::Bool(created) => Reply::Int(i64::from(created)),
                other => unexpected(other),
            }
        }
        Command::IncrBy { key, delta } => {
            match store.send(*db, StoreRequest::IncrBy { key, delta }).await? {
                StoreResponse::Integer(n) => Reply::Int(n),
                other => unexpected(other),
            }
        }

        // -- keyspace --
        Command::Del { key } => {
            match store.send(*db, StoreRequest::Del { key }).await? {
                StoreResponse::Bool(removed) => Reply::Int(i64::from(removed)),
                other => unexpected(other),
            }
        }
        Command::Exists { key } => {
            match store.send(*db, StoreRequest::Exists { key }).await? {
                StoreResponse::Bool(present) => Reply::Int(i64::from(present)),
                other => unexpected(other),
            }
        }
        Command::Type { key } => {
            match store.send(*db, StoreRequest::TypeOf { key }).await? {
                StoreResponse::TypeName(name) => {
                    Reply::Line(Bytes::from_static(name.as_bytes()))
                }
                other => unexpected(other),
            }
        }
        Command::Keys { pattern } => {
            match store.send(*db, StoreRequest::Keys { pattern }).await? {
                StoreResponse::Elements(keys) => Reply::Bulk(join_with_spaces(&keys)),
                other => unexpected(other),
            }
        }
        Command::RandomKey => {
            match store.send(*db, StoreRequest::RandomKey).await? {
                StoreResponse::Bulk(key) => Reply::Line(key),
                StoreResponse::Nil => Reply::Line(Bytes::new()),
                other => unexpected(other),
            }
        }
        Command::Rename { src, dst, nx } => {
            let response = store.send(*db, StoreRequest::Rename { src, dst, nx }).await?;
            if nx {
                match response {
                    StoreResponse::Bool(renamed) => Reply::Int(i64::from(renamed)),
                    StoreResponse::SameSourceAndDest => Reply::Int(-3),
                    StoreResponse::NoSuchKey => Reply::Int(-1),
                    other => unexpected(other),
                }
            } else {
                match response {
                    StoreResponse::Ok => Reply::Status("OK"),
                    StoreResponse::SameSourceAndDest => Reply::error(reply::SAME_KEY),
                    StoreResponse::NoSuchKey => Reply::error(reply::NO_SUCH_KEY),
                    other => unexpected(other),
                }
            }
        }
        Command::Move { key, db: dst } => {
            match store.send(*db, StoreRequest::Move { key, dst }).await? {
                StoreResponse::Bool(moved) => Reply::Int(i64::from(moved)),
                StoreResponse::InvalidDbIndex => Reply::Int(-4),
                StoreResponse::SameDb => Reply::Int(-3),
                other => unexpected(other),
            }
        }
        Command::DbSize => {
            match store.send(*db, StoreRequest::DbSize).await? {
                StoreResponse::Integer(n) => Reply::Int(n),
                other => unexpected(other),
            }
        }

        // -- lists --
        Command::Push { key, value, head } => {
            match store.send(*db, StoreRequest::Push { key, value, head }).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::WrongType => Reply::error(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::Pop { key, head } => {
            match store.send(*db, StoreRequest::Pop { key, head }).await? {
                StoreResponse::Bulk(element) => Reply::Bulk(element),
                StoreResponse::Nil => Reply::Nil,
                StoreResponse::WrongType => Reply::ErrorBulk(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::LLen { key } => {
            match store.send(*db, StoreRequest::LLen { key }).await? {
                StoreResponse::Integer(n) => Reply::Int(n),
                StoreResponse::WrongType => Reply::Int(-2),
                other => unexpected(other),
            }
        }
        Command::LIndex { key, index } => {
            match store.send(*db, StoreRequest::LIndex { key, index }).await? {
                StoreResponse::Bulk(element) => Reply::Bulk(element),
                StoreResponse::Nil => Reply::Nil,
                StoreResponse::WrongType => Reply::ErrorBulk(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::LSet { key, index, value } => {
            match store.send(*db, StoreRequest::LSet { key, index, value }).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::NoSuchKey => Reply::error(reply::NO_SUCH_KEY),
                StoreResponse::IndexOutOfRange => Reply::error(reply::INDEX_OUT_OF_RANGE),
                StoreResponse::WrongType => Reply::error(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::LRange { key, start, stop } => {
            match store.send(*db, StoreRequest::LRange { key, start, stop }).await? {
                StoreResponse::Elements(elements) => Reply::MultiBulk(elements),
                StoreResponse::Nil => Reply::Nil,
                StoreResponse::WrongType => Reply::ErrorBulk(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }
        Command::LTrim { key, start, stop } => {
            match store.send(*db, StoreRequest::LTrim { key, start, stop }).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::NoSuchKey => Reply::error(reply::NO_SUCH_KEY),
                StoreResponse::WrongType => Reply::error(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }

        // -- sets --
        Command::SAdd { key, member } => {
            match store.send(*db, StoreRequest::SAdd { key, member }).await? {
                StoreResponse::Bool(added) => Reply::Int(i64::from(added)),
                StoreResponse::WrongType => Reply::Int(-2),
                other => unexpected(other),
            }
        }
        Command::SRem { key, member } => {
            match store.send(*db, StoreRequest::SRem { key, member }).await? {
                StoreResponse::Bool(removed) => Reply::Int(i64::from(removed)),
                StoreResponse::WrongType => Reply::Int(-2),
                other => unexpected(other),
            }
        }
        Command::SIsMember { key, member } => {
            match store.send(*db, StoreRequest::SIsMember { key, member }).await? {
                StoreResponse::Bool(present) => Reply::Int(i64::from(present)),
                StoreResponse::WrongType => Reply::Int(-2),
                other => unexpected(other),
            }
        }
        Command::SCard { key } => {
            match store.send(*db, StoreRequest::SCard { key }).await? {
                StoreResponse::Integer(n) => Reply::Int(n),
                StoreResponse::WrongType => Reply::Int(-2),
                other => unexpected(other),
            }
        }
        Command::SInter { keys } => {
            match store.send(*db, StoreRequest::SInter { keys }).await? {
                StoreResponse::Elements(members) => Reply::MultiBulk(members),
                StoreResponse::Nil => Reply::Nil,
                StoreResponse::WrongType => Reply::ErrorBulk(reply::WRONG_TYPE),
                other => unexpected(other),
            }
        }

        // -- admin --
        Command::Save => {
            match store.send(*db, StoreRequest::Save).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::SaveFailed => Reply::error(reply::SAVE_FAILED),
                other => unexpected(other),
            }
        }
        Command::BgSave => {
            match store.send(*db, StoreRequest::BgSave).await? {
                StoreResponse::Ok => Reply::Status("OK"),
                StoreResponse::BgSaveInProgress => Reply::error(reply::BGSAVE_IN_PROGRESS),
                StoreResponse::SaveFailed => Reply::error(reply::SAVE_FAILED),
                other => unexpected(other),
            }
        }
        Command::LastSave => {
            match store.send(*db, StoreRequest::LastSave).await? {
                StoreResponse::Integer(t) => Reply::Int(t),
                other => unexpected(other),
            }
        }
        Command::Shutdown => {
            // only a failed save comes back; success exits the process
            match store.send(*db, StoreRequest::Shutdown).await? {
                StoreResponse::SaveFailed => Reply::error(reply::SHUTDOWN_SAVE_FAILED),
                other => unexpected(other),
            }
        }
    };

    Ok(reply)
}

/// A store response no command expects; reported rather than panicking
/// the connection task.
fn unexpected(response: StoreResponse) -> Reply {
    Reply::Error(format!("ERR unexpected store response: {response:?}").into())
}

/// Joins key names with single spaces for the KEYS reply.
fn join_with_spaces(keys: &[Bytes]) -> Bytes {
    let total: usize = keys.iter().map(|k| k.len()).sum::<usize>() + keys.len().saturating_sub(1);
    let mut joined = Vec::with_capacity(total);
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            joined.push(b' ');
        }
        joined.extend_from_slice(key);
    }
    Bytes::from(joined)
}
