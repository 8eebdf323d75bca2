//! Binary format primitives for snapshot files.
//!
//! All multi-byte lengths are stored as u32 in network (big-endian)
//! byte order. The file opens with a 9-byte magic, each populated
//! database is introduced by a select-db opcode, and a terminator
//! opcode closes the stream.

use std::io::{self, Read, Write};

use thiserror::Error;

/// File magic, version zero.
pub const MAGIC: &[u8; 9] = b"REDIS0000";

/// Value type tags, doubling as entry opcodes.
pub const TAG_STRING: u8 = 0;
pub const TAG_LIST: u8 = 1;
pub const TAG_SET: u8 = 2;

/// Opcode introducing a database: followed by a u32 database index.
pub const OP_SELECT_DB: u8 = 0xFE;
/// Opcode terminating the file.
pub const OP_EOF: u8 = 0xFF;

/// Longest length-prefixed field we will read back (1 GiB, the same cap
/// the wire protocol places on bulk payloads). A corrupt length prefix
/// must not translate into an arbitrary allocation.
pub const MAX_FIELD_LEN: usize = 1024 * 1024 * 1024;

/// Errors raised while reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file ended in the middle of a record.
    #[error("short read loading snapshot")]
    UnexpectedEof,

    /// The file doesn't start with the expected magic.
    #[error("wrong signature in snapshot file")]
    BadMagic,

    /// An opcode byte that is neither a type tag nor a control opcode.
    #[error("unknown value type tag: {0:#04x}")]
    UnknownTag(u8),

    /// A length prefix above [`MAX_FIELD_LEN`].
    #[error("field length {0} exceeds maximum")]
    FieldTooLong(usize),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Writes a u32 in network byte order.
pub fn write_u32(w: &mut impl Write, val: u32) -> io::Result<()> {
    w.write_all(&val.to_be_bytes())
}

/// Writes a length-prefixed byte slice: `[len: u32][data]`.
pub fn write_bytes(w: &mut impl Write, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("field length {} exceeds u32::MAX", data.len()),
        )
    })?;
    write_u32(w, len)?;
    w.write_all(data)
}

/// Reads a single byte, mapping EOF to [`SnapshotError::UnexpectedEof`].
pub fn read_u8(r: &mut impl Read) -> Result<u8, SnapshotError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

/// Reads a u32 in network byte order.
pub fn read_u32(r: &mut impl Read) -> Result<u32, SnapshotError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Reads a length-prefixed byte vector, rejecting lengths above
/// [`MAX_FIELD_LEN`].
pub fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>, SnapshotError> {
    let len = read_u32(r)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(SnapshotError::FieldTooLong(len));
    }
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), SnapshotError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SnapshotError::UnexpectedEof
        } else {
            SnapshotError::Io(e)
        }
    })
}
