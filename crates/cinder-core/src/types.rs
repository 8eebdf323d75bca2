//! Data type representations for stored values.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;

/// A stored value in the keyspace.
///
/// Each variant maps to one wire-level data type. Payload bytes are
/// `Bytes`, so handing a value to the reply path shares the underlying
/// storage with the keyspace entry instead of copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Binary-safe string data.
    String(Bytes),

    /// Ordered list of binary-safe elements. `VecDeque` gives O(1)
    /// push/pop at both ends.
    List(VecDeque<Bytes>),

    /// Unordered set of unique binary-safe members.
    Set(HashSet<Bytes>),
}

/// Returns the type name for a value, as reported by TYPE.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::List(_) => "list",
        Value::Set(_) => "set",
    }
}

/// Converts range indices (supporting negative values) to a clamped
/// `(start, stop)` pair.
///
/// Negative indices count back from `len` (-1 = last element). The stop
/// index is clamped to `len - 1`; a hugely-negative stop resolves below
/// the start so the caller sees `start > stop` (empty range). Returns
/// `(0, -1)` for empty collections.
pub fn normalize_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    if len == 0 {
        return (0, -1);
    }

    let s = if start < 0 {
        (len + start).max(0)
    } else {
        start
    };

    let e = if stop < 0 {
        (len + stop).max(-1)
    } else {
        stop.min(len - 1)
    };

    (s, e)
}
