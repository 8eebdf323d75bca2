//! cinder-persistence: the snapshot durability layer.
//!
//! A snapshot is a single binary file capturing every database in one
//! pass. Writes land in a temp file that is atomically renamed over the
//! target, so a crashed save never corrupts the previous snapshot.

pub mod format;
pub mod snapshot;

pub use format::SnapshotError;
pub use snapshot::{SnapRecord, SnapValue, SnapshotReader, SnapshotWriter};
