//! Point-in-time snapshot files.
//!
//! One file captures every database. Writes go to a
//! `temp-<epoch>.<random>.rdb` file beside the target and are atomically
//! renamed on completion, so a partial or crashed save never clobbers
//! the previous snapshot.
//!
//! File layout:
//! ```text
//! [magic: 9B]
//! per populated database:
//!   [0xFE][db index: u32 BE]
//!   per entry:
//!     [type tag: 1B][key len: u32 BE][key]
//!     tag 0 (string): [value len: u32 BE][value]
//!     tag 1/2 (list/set): [count: u32 BE] then per element [len: u32 BE][bytes]
//! [0xFF]
//! ```

use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::format::{self, SnapshotError};

/// The value carried by one snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapValue {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
}

/// One record read back from a snapshot stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapRecord {
    /// Switch the target database for subsequent entries.
    SelectDb(u32),
    /// A key/value entry for the current database.
    Entry { key: Bytes, value: SnapValue },
}

/// Streams a snapshot out to disk.
///
/// The file won't appear at the target path until [`finish`] runs;
/// dropping an unfinished writer removes the temp file.
///
/// [`finish`]: SnapshotWriter::finish
pub struct SnapshotWriter {
    final_path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    finished: bool,
}

impl SnapshotWriter {
    /// Creates the temp file and writes the magic.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let final_path = path.into();
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let tmp_path =
            final_path.with_file_name(format!("temp-{epoch}.{}.rdb", rand::random::<u32>()));

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(format::MAGIC)?;

        Ok(Self {
            final_path,
            tmp_path,
            writer,
            finished: false,
        })
    }

    /// Writes the select-db opcode. Entries written afterwards belong
    /// to database `index`.
    pub fn select_db(&mut self, index: u32) -> Result<(), SnapshotError> {
        self.writer.write_all(&[format::OP_SELECT_DB])?;
        format::write_u32(&mut self.writer, index)?;
        Ok(())
    }

    /// Writes one key/value entry into the current database.
    pub fn write_entry(&mut self, key: &[u8], value: &SnapValue) -> Result<(), SnapshotError> {
        let tag = match value {
            SnapValue::String(_) => format::TAG_STRING,
            SnapValue::List(_) => format::TAG_LIST,
            SnapValue::Set(_) => format::TAG_SET,
        };
        self.writer.write_all(&[tag])?;
        format::write_bytes(&mut self.writer, key)?;

        match value {
            SnapValue::String(data) => {
                format::write_bytes(&mut self.writer, data)?;
            }
            SnapValue::List(items) => {
                format::write_u32(&mut self.writer, items.len() as u32)?;
                for item in items {
                    format::write_bytes(&mut self.writer, item)?;
                }
            }
            SnapValue::Set(members) => {
                format::write_u32(&mut self.writer, members.len() as u32)?;
                for member in members {
                    format::write_bytes(&mut self.writer, member)?;
                }
            }
        }
        Ok(())
    }

    /// Writes the terminator, flushes, and atomically renames the temp
    /// file over the target.
    pub fn finish(mut self) -> Result<(), SnapshotError> {
        self.writer.write_all(&[format::OP_EOF])?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        if !self.finished {
            // best-effort cleanup of an incomplete temp file
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Reads records back from a snapshot file.
#[derive(Debug)]
pub struct SnapshotReader {
    reader: BufReader<File>,
    done: bool,
}

impl SnapshotReader {
    /// Opens a snapshot and validates the magic.
    ///
    /// Returns `Ok(None)` if the file doesn't exist — an absent
    /// snapshot just means an empty server.
    pub fn open(path: impl AsRef<Path>) -> Result<Option<Self>, SnapshotError> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 9];
        std::io::Read::read_exact(&mut reader, &mut magic)
            .map_err(|_| SnapshotError::BadMagic)?;
        if &magic != format::MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        Ok(Some(Self {
            reader,
            done: false,
        }))
    }

    /// Reads the next record, or `None` once the terminator is reached.
    /// A short read anywhere mid-record is an error.
    pub fn next_record(&mut self) -> Result<Option<SnapRecord>, SnapshotError> {
        if self.done {
            return Ok(None);
        }

        let opcode = format::read_u8(&mut self.reader)?;
        match opcode {
            format::OP_EOF => {
                self.done = true;
                Ok(None)
            }
            format::OP_SELECT_DB => {
                let index = format::read_u32(&mut self.reader)?;
                Ok(Some(SnapRecord::SelectDb(index)))
            }
            tag @ (format::TAG_STRING | format::TAG_LIST | format::TAG_SET) => {
                let key = Bytes::from(format::read_bytes(&mut self.reader)?);
                let value = match tag {
                    format::TAG_STRING => {
                        SnapValue::String(Bytes::from(format::read_bytes(&mut self.reader)?))
                    }
                    format::TAG_LIST => {
                        let count = format::read_u32(&mut self.reader)?;
                        let mut items = VecDeque::new();
                        for _ in 0..count {
                            items.push_back(Bytes::from(format::read_bytes(&mut self.reader)?));
                        }
                        SnapValue::List(items)
                    }
                    _ => {
                        let count = format::read_u32(&mut self.reader)?;
                        let mut members = HashSet::new();
                        for _ in 0..count {
                            members.insert(Bytes::from(format::read_bytes(&mut self.reader)?));
                        }
                        SnapValue::Set(members)
                    }
                };
                Ok(Some(SnapRecord::Entry { key, value }))
            }
            other => Err(SnapshotError::UnknownTag(other)),
        }
    }
}
