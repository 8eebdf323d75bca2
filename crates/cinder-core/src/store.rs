//! The store task: exclusive owner of every database.
//!
//! All commands execute serially inside one task — no locks, no
//! cross-task sharing of the keyspace. Connections send a
//! [`StoreRequest`] plus a oneshot reply channel through a bounded mpsc
//! channel; responses are semantic values that the connection layer
//! turns into wire replies.
//!
//! The same task runs the once-per-second cron: it reaps a finished
//! background save and, when none is in flight, walks the
//! `(seconds, changes)` save rules against the dirty counter.
//!
//! A background save takes a point-in-time copy of the databases while
//! still inside the store task (values hold reference-counted `Bytes`,
//! so the copy shares payload storage) and serializes it on a blocking
//! worker. This stands in for the fork/copy-on-write trick the snapshot
//! contract describes: the emitted file reflects the keyspace at the
//! instant the save was accepted.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use cinder_persistence::{SnapRecord, SnapValue, SnapshotError, SnapshotReader, SnapshotWriter};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::types::{normalize_range, type_name, Value};

/// The snapshot file, relative to the working directory.
pub const DUMP_FILE: &str = "dump.rdb";

/// Cron period.
const CRON_PERIOD: Duration = Duration::from_secs(1);

/// Request channel capacity. Large enough to absorb pipelined bursts
/// without meaningful back-pressure on connections.
const CHANNEL_BUFFER: usize = 256;

/// One snapshot trigger rule: save when at least `changes` writes have
/// accumulated and more than `seconds` have passed since the last save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRule {
    pub seconds: u64,
    pub changes: u64,
}

impl SaveRule {
    pub const fn new(seconds: u64, changes: u64) -> Self {
        Self { seconds, changes }
    }
}

/// The default rules: after 1 hour and 1 change, 5 minutes and 100
/// changes, or 1 minute and 10000 changes.
pub fn default_save_rules() -> Vec<SaveRule> {
    vec![
        SaveRule::new(60 * 60, 1),
        SaveRule::new(300, 100),
        SaveRule::new(60, 10000),
    ]
}

/// Store-level configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Snapshot trigger rules checked by the cron.
    pub save_rules: Vec<SaveRule>,
    /// Where snapshots are written and loaded from.
    pub dump_path: PathBuf,
}

/// A command to execute against one database. The database index rides
/// on the message envelope.
#[derive(Debug)]
pub enum StoreRequest {
    Get { key: Bytes },
    Set { key: Bytes, value: Bytes, nx: bool },
    IncrBy { key: Bytes, delta: i64 },

    Del { key: Bytes },
    Exists { key: Bytes },
    TypeOf { key: Bytes },
    Keys { pattern: Bytes },
    RandomKey,
    Rename { src: Bytes, dst: Bytes, nx: bool },
    Move { key: Bytes, dst: i64 },
    DbSize,

    Push { key: Bytes, value: Bytes, head: bool },
    Pop { key: Bytes, head: bool },
    LLen { key: Bytes },
    LIndex { key: Bytes, index: i64 },
    LSet { key: Bytes, index: i64, value: Bytes },
    LRange { key: Bytes, start: i64, stop: i64 },
    LTrim { key: Bytes, start: i64, stop: i64 },

    SAdd { key: Bytes, member: Bytes },
    SRem { key: Bytes, member: Bytes },
    SIsMember { key: Bytes, member: Bytes },
    SCard { key: Bytes },
    SInter { keys: Vec<Bytes> },

    Save,
    BgSave,
    LastSave,
    Shutdown,
}

/// Semantic command outcome. The connection layer maps these onto the
/// wire shapes each command uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResponse {
    Ok,
    Bool(bool),
    Integer(i64),
    Bulk(Bytes),
    Nil,
    Elements(Vec<Bytes>),
    TypeName(&'static str),

    WrongType,
    NoSuchKey,
    IndexOutOfRange,
    SameSourceAndDest,
    InvalidDbIndex,
    SameDb,
    SaveFailed,
    BgSaveInProgress,
}

/// Errors surfaced to callers of [`StoreHandle::send`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store task has stopped.
    #[error("store unavailable")]
    Unavailable,
}

struct StoreMessage {
    db: usize,
    request: StoreRequest,
    reply: oneshot::Sender<StoreResponse>,
}

/// Cloneable handle for sending commands to the store task.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreMessage>,
}

impl StoreHandle {
    /// Executes `request` against database `db` and waits for the
    /// response.
    pub async fn send(
        &self,
        db: usize,
        request: StoreRequest,
    ) -> Result<StoreResponse, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StoreMessage {
                db,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable)?;
        reply_rx.await.map_err(|_| StoreError::Unavailable)
    }
}

/// Spawns the store task and returns its handle.
///
/// `databases` is the full keyspace, normally the result of
/// [`load_databases`].
pub fn spawn_store(databases: Vec<Database>, config: StoreConfig) -> StoreHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);
    tokio::spawn(run_store(rx, databases, config));
    StoreHandle { tx }
}

/// The store's main loop: process requests, run the cron, until every
/// handle is dropped.
async fn run_store(
    mut rx: mpsc::Receiver<StoreMessage>,
    databases: Vec<Database>,
    config: StoreConfig,
) {
    let mut store = Store::new(databases, config);

    let mut cron = tokio::time::interval(CRON_PERIOD);
    cron.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        store.process(msg);
                        // drain pending messages without re-entering
                        // select!, amortizing wake-up overhead across
                        // pipelined bursts
                        while let Ok(msg) = rx.try_recv() {
                            store.process(msg);
                        }
                    }
                    None => break,
                }
            }
            _ = cron.tick() => {
                store.cron().await;
            }
        }
    }
}

/// The store state: the database array plus snapshot bookkeeping.
struct Store {
    dbs: Vec<Database>,
    config: StoreConfig,
    /// Write operations since the last successful save.
    dirty: u64,
    /// UNIX time of the last successful save.
    last_save: u64,
    /// The in-flight background save, if any.
    bgsave: Option<JoinHandle<bool>>,
}

impl Store {
    fn new(dbs: Vec<Database>, config: StoreConfig) -> Self {
        Self {
            dbs,
            config,
            dirty: 0,
            last_save: now_secs(),
            bgsave: None,
        }
    }

    fn process(&mut self, msg: StoreMessage) {
        let response = self.execute(msg.db, msg.request);
        // a dropped receiver just means the client went away mid-command
        let _ = msg.reply.send(response);
    }

    fn execute(&mut self, db: usize, request: StoreRequest) -> StoreResponse {
        match request {
            StoreRequest::Get { key } => self.get(db, &key),
            StoreRequest::Set { key, value, nx } => self.set(db, key, value, nx),
            StoreRequest::IncrBy { key, delta } => self.incr_by(db, key, delta),

            StoreRequest::Del { key } => self.del(db, &key),
            StoreRequest::Exists { key } => {
                StoreResponse::Bool(self.dbs[db].contains_key(&key))
            }
            StoreRequest::TypeOf { key } => match self.dbs[db].get(&key) {
                Some(value) => StoreResponse::TypeName(type_name(value)),
                None => StoreResponse::TypeName("none"),
            },
            StoreRequest::Keys { pattern } => {
                StoreResponse::Elements(self.dbs[db].keys_matching(&pattern))
            }
            StoreRequest::RandomKey => match self.dbs[db].random_key() {
                Some(key) => StoreResponse::Bulk(key),
                None => StoreResponse::Nil,
            },
            StoreRequest::Rename { src, dst, nx } => self.rename(db, src, dst, nx),
            StoreRequest::Move { key, dst } => self.move_key(db, key, dst),
            StoreRequest::DbSize => StoreResponse::Integer(self.dbs[db].len() as i64),

            StoreRequest::Push { key, value, head } => self.push(db, key, value, head),
            StoreRequest::Pop { key, head } => self.pop(db, &key, head),
            StoreRequest::LLen { key } => self.llen(db, &key),
            StoreRequest::LIndex { key, index } => self.lindex(db, &key, index),
            StoreRequest::LSet { key, index, value } => self.lset(db, &key, index, value),
            StoreRequest::LRange { key, start, stop } => self.lrange(db, &key, start, stop),
            StoreRequest::LTrim { key, start, stop } => self.ltrim(db, &key, start, stop),

            StoreRequest::SAdd { key, member } => self.sadd(db, key, member),
            StoreRequest::SRem { key, member } => self.srem(db, &key, member),
            StoreRequest::SIsMember { key, member } => self.sismember(db, &key, &member),
            StoreRequest::SCard { key } => self.scard(db, &key),
            StoreRequest::SInter { keys } => self.sinter(db, &keys),

            StoreRequest::Save => {
                if self.save() {
                    StoreResponse::Ok
                } else {
                    StoreResponse::SaveFailed
                }
            }
            StoreRequest::BgSave => self.begin_background_save(),
            StoreRequest::LastSave => StoreResponse::Integer(self.last_save as i64),
            StoreRequest::Shutdown => {
                warn!("user requested shutdown, saving database");
                if self.save() {
                    warn!("server exiting");
                    std::process::exit(0);
                }
                StoreResponse::SaveFailed
            }
        }
    }

    // -- strings --

    fn get(&self, db: usize, key: &[u8]) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Nil,
            Some(Value::String(data)) => StoreResponse::Bulk(data.clone()),
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn set(&mut self, db: usize, key: Bytes, value: Bytes, nx: bool) -> StoreResponse {
        if nx && self.dbs[db].contains_key(&key) {
            return StoreResponse::Bool(false);
        }
        self.dbs[db].insert(key, Value::String(value));
        self.dirty += 1;
        if nx {
            StoreResponse::Bool(true)
        } else {
            StoreResponse::Ok
        }
    }

    /// Adds `delta` to the integer interpretation of the value at
    /// `key`. An absent key, a non-string value, and a non-numeric
    /// string all count as 0; the result always replaces the entry
    /// with its stringified sum.
    fn incr_by(&mut self, db: usize, key: Bytes, delta: i64) -> StoreResponse {
        let current = match self.dbs[db].get(&key) {
            Some(Value::String(data)) => parse_integer(data),
            _ => 0,
        };
        let next = current.wrapping_add(delta);
        self.dbs[db]
            .insert(key, Value::String(Bytes::from(next.to_string())));
        self.dirty += 1;
        StoreResponse::Integer(next)
    }

    // -- keyspace --

    fn del(&mut self, db: usize, key: &[u8]) -> StoreResponse {
        if self.dbs[db].remove(key).is_some() {
            self.dirty += 1;
            StoreResponse::Bool(true)
        } else {
            StoreResponse::Bool(false)
        }
    }

    fn rename(&mut self, db: usize, src: Bytes, dst: Bytes, nx: bool) -> StoreResponse {
        if src == dst {
            return StoreResponse::SameSourceAndDest;
        }
        if !self.dbs[db].contains_key(&src) {
            return StoreResponse::NoSuchKey;
        }
        if nx && self.dbs[db].contains_key(&dst) {
            return StoreResponse::Bool(false);
        }
        let Some(value) = self.dbs[db].remove(&src) else {
            return StoreResponse::NoSuchKey;
        };
        self.dbs[db].insert(dst, value);
        self.dirty += 1;
        if nx {
            StoreResponse::Bool(true)
        } else {
            StoreResponse::Ok
        }
    }

    fn move_key(&mut self, db: usize, key: Bytes, dst: i64) -> StoreResponse {
        let Ok(dst) = usize::try_from(dst) else {
            return StoreResponse::InvalidDbIndex;
        };
        if dst >= self.dbs.len() {
            return StoreResponse::InvalidDbIndex;
        }
        if dst == db {
            return StoreResponse::SameDb;
        }
        // missing source and destination collision both report failure
        if !self.dbs[db].contains_key(&key) || self.dbs[dst].contains_key(&key) {
            return StoreResponse::Bool(false);
        }
        let Some(value) = self.dbs[db].remove(&key) else {
            return StoreResponse::Bool(false);
        };
        self.dbs[dst].insert(key, value);
        self.dirty += 1;
        StoreResponse::Bool(true)
    }

    // -- lists --

    fn push(&mut self, db: usize, key: Bytes, value: Bytes, head: bool) -> StoreResponse {
        match self.dbs[db].get_mut(&key) {
            Some(Value::List(list)) => {
                if head {
                    list.push_front(value);
                } else {
                    list.push_back(value);
                }
            }
            Some(_) => return StoreResponse::WrongType,
            None => {
                let mut list = VecDeque::new();
                list.push_back(value);
                self.dbs[db].insert(key, Value::List(list));
            }
        }
        self.dirty += 1;
        StoreResponse::Ok
    }

    fn pop(&mut self, db: usize, key: &[u8], head: bool) -> StoreResponse {
        match self.dbs[db].get_mut(key) {
            None => StoreResponse::Nil,
            Some(Value::List(list)) => {
                let popped = if head {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                match popped {
                    Some(element) => {
                        self.dirty += 1;
                        StoreResponse::Bulk(element)
                    }
                    None => StoreResponse::Nil,
                }
            }
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn llen(&self, db: usize, key: &[u8]) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Integer(0),
            Some(Value::List(list)) => StoreResponse::Integer(list.len() as i64),
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn lindex(&self, db: usize, key: &[u8], index: i64) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Nil,
            Some(Value::List(list)) => {
                match resolve_index(index, list.len()) {
                    Some(i) => StoreResponse::Bulk(list[i].clone()),
                    None => StoreResponse::Nil,
                }
            }
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn lset(&mut self, db: usize, key: &[u8], index: i64, value: Bytes) -> StoreResponse {
        match self.dbs[db].get_mut(key) {
            None => StoreResponse::NoSuchKey,
            Some(Value::List(list)) => match resolve_index(index, list.len()) {
                Some(i) => {
                    list[i] = value;
                    self.dirty += 1;
                    StoreResponse::Ok
                }
                None => StoreResponse::IndexOutOfRange,
            },
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn lrange(&self, db: usize, key: &[u8], start: i64, stop: i64) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Nil,
            Some(Value::List(list)) => {
                let (s, e) = normalize_range(start, stop, list.len() as i64);
                if s > e {
                    return StoreResponse::Elements(Vec::new());
                }
                StoreResponse::Elements(
                    list.iter()
                        .skip(s as usize)
                        .take((e - s + 1) as usize)
                        .cloned()
                        .collect(),
                )
            }
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn ltrim(&mut self, db: usize, key: &[u8], start: i64, stop: i64) -> StoreResponse {
        match self.dbs[db].get_mut(key) {
            None => StoreResponse::NoSuchKey,
            Some(Value::List(list)) => {
                let (s, e) = normalize_range(start, stop, list.len() as i64);
                if s > e {
                    list.clear();
                } else {
                    list.truncate(e as usize + 1);
                    list.drain(..s as usize);
                }
                self.dirty += 1;
                StoreResponse::Ok
            }
            Some(_) => StoreResponse::WrongType,
        }
    }

    // -- sets --

    fn sadd(&mut self, db: usize, key: Bytes, member: Bytes) -> StoreResponse {
        match self.dbs[db].get_mut(&key) {
            Some(Value::Set(set)) => {
                if set.insert(member) {
                    self.dirty += 1;
                    StoreResponse::Bool(true)
                } else {
                    StoreResponse::Bool(false)
                }
            }
            Some(_) => StoreResponse::WrongType,
            None => {
                let mut set = HashSet::new();
                set.insert(member);
                self.dbs[db].insert(key, Value::Set(set));
                self.dirty += 1;
                StoreResponse::Bool(true)
            }
        }
    }

    fn srem(&mut self, db: usize, key: &[u8], member: Bytes) -> StoreResponse {
        match self.dbs[db].get_mut(key) {
            None => StoreResponse::Bool(false),
            Some(Value::Set(set)) => {
                if set.remove(&member) {
                    self.dirty += 1;
                    StoreResponse::Bool(true)
                } else {
                    StoreResponse::Bool(false)
                }
            }
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn sismember(&self, db: usize, key: &[u8], member: &[u8]) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Bool(false),
            Some(Value::Set(set)) => StoreResponse::Bool(set.contains(member)),
            Some(_) => StoreResponse::WrongType,
        }
    }

    fn scard(&self, db: usize, key: &[u8]) -> StoreResponse {
        match self.dbs[db].get(key) {
            None => StoreResponse::Integer(0),
            Some(Value::Set(set)) => StoreResponse::Integer(set.len() as i64),
            Some(_) => StoreResponse::WrongType,
        }
    }

    /// Intersects the listed sets. Any missing key makes the whole
    /// result nil; any non-set participant is a type error. The
    /// smallest set drives the scan and every candidate is probed
    /// against the rest.
    fn sinter(&self, db: usize, keys: &[Bytes]) -> StoreResponse {
        let database = &self.dbs[db];
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match database.get(key) {
                None => return StoreResponse::Nil,
                Some(Value::Set(set)) => sets.push(set),
                Some(_) => return StoreResponse::WrongType,
            }
        }
        // stable sort keeps input order among equal cardinalities
        sets.sort_by_key(|set| set.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return StoreResponse::Elements(Vec::new());
        };

        let members = smallest
            .iter()
            .filter(|member| rest.iter().all(|set| set.contains(*member)))
            .cloned()
            .collect();
        StoreResponse::Elements(members)
    }

    // -- snapshots --

    /// Synchronous save. On success resets the dirty counter and stamps
    /// the save time.
    fn save(&mut self) -> bool {
        match write_snapshot(&self.config.dump_path, &self.dbs) {
            Ok(()) => {
                self.dirty = 0;
                self.last_save = now_secs();
                info!("database saved on disk");
                true
            }
            Err(e) => {
                warn!("error saving database: {e}");
                false
            }
        }
    }

    /// Starts a background save unless one is already running. The
    /// point-in-time copy happens here, inside the store task; only the
    /// serialization runs on the blocking pool.
    fn begin_background_save(&mut self) -> StoreResponse {
        if self.bgsave.is_some() {
            return StoreResponse::BgSaveInProgress;
        }
        let path = self.config.dump_path.clone();
        let dbs = self.dbs.clone();
        info!("background save started");
        self.bgsave = Some(tokio::task::spawn_blocking(move || {
            match write_snapshot(&path, &dbs) {
                Ok(()) => true,
                Err(e) => {
                    warn!("background save failed: {e}");
                    false
                }
            }
        }));
        StoreResponse::Ok
    }

    /// The once-per-second cron: reap a finished background save, or
    /// check the save rules when none is running.
    async fn cron(&mut self) {
        if let Some(handle) = &self.bgsave {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(handle) = self.bgsave.take() {
            match handle.await {
                Ok(true) => {
                    self.dirty = 0;
                    self.last_save = now_secs();
                    info!("background save finished with success");
                }
                Ok(false) => warn!("background save error"),
                Err(e) => warn!("background save task failed: {e}"),
            }
            return;
        }

        let now = now_secs();
        let due = self
            .config
            .save_rules
            .iter()
            .find(|rule| {
                self.dirty >= rule.changes
                    && now.saturating_sub(self.last_save) > rule.seconds
            })
            .copied();
        if let Some(rule) = due {
            info!(
                changes = self.dirty,
                seconds = rule.seconds,
                "save point reached, starting background save"
            );
            self.begin_background_save();
        }
    }
}

/// Resolves a possibly-negative list index against `len`. Negative
/// indexes count from the tail.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    if (0..len).contains(&i) {
        Some(i as usize)
    } else {
        None
    }
}

/// Integer interpretation of a stored string: optional sign and leading
/// digits, anything else counts as 0.
fn parse_integer(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    let mut negative = false;
    match rest.first() {
        Some(b'-') => {
            negative = true;
            rest = &rest[1..];
        }
        Some(b'+') => rest = &rest[1..],
        _ => {}
    }
    let mut value: i64 = 0;
    for &b in rest {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// snapshot conversion
// ---------------------------------------------------------------------------

fn to_snap_value(value: &Value) -> SnapValue {
    match value {
        Value::String(data) => SnapValue::String(data.clone()),
        Value::List(items) => SnapValue::List(items.clone()),
        Value::Set(members) => SnapValue::Set(members.clone()),
    }
}

fn from_snap_value(value: SnapValue) -> Value {
    match value {
        SnapValue::String(data) => Value::String(data),
        SnapValue::List(items) => Value::List(items),
        SnapValue::Set(members) => Value::Set(members),
    }
}

/// Serializes every populated database to `path` via a temp file and
/// atomic rename.
fn write_snapshot(path: &Path, dbs: &[Database]) -> Result<(), SnapshotError> {
    let mut writer = SnapshotWriter::create(path)?;
    for (index, db) in dbs.iter().enumerate() {
        if db.is_empty() {
            continue;
        }
        writer.select_db(index as u32)?;
        for (key, value) in db.iter() {
            writer.write_entry(key, &to_snap_value(value))?;
        }
    }
    writer.finish()
}

/// Errors that make a snapshot unusable at startup. All of these are
/// fatal: a half-loaded keyspace is worse than refusing to start.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The file selects a database beyond the configured count.
    #[error("snapshot selects database {index} but only {count} are configured")]
    DbIndexOutOfRange { index: u32, count: usize },

    /// The same key appears twice within one database.
    #[error("duplicate key '{key}' in snapshot")]
    DuplicateKey { key: String },
}

/// Loads the snapshot at `path` into `count` fresh databases. A missing
/// file yields an empty keyspace.
pub fn load_databases(path: &Path, count: usize) -> Result<Vec<Database>, LoadError> {
    let mut dbs: Vec<Database> = (0..count).map(|_| Database::new()).collect();

    let Some(mut reader) = SnapshotReader::open(path)? else {
        return Ok(dbs);
    };

    let mut current = 0usize;
    let mut loaded = 0usize;
    while let Some(record) = reader.next_record()? {
        match record {
            SnapRecord::SelectDb(index) => {
                if index as usize >= count {
                    return Err(LoadError::DbIndexOutOfRange { index, count });
                }
                current = index as usize;
            }
            SnapRecord::Entry { key, value } => {
                let display = String::from_utf8_lossy(&key).into_owned();
                if dbs[current].insert(key, from_snap_value(value)).is_some() {
                    return Err(LoadError::DuplicateKey { key: display });
                }
                loaded += 1;
            }
        }
    }

    debug!(keys = loaded, "snapshot loaded");
    Ok(dbs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        store_with(16, PathBuf::from("dump.rdb"))
    }

    fn store_with(databases: usize, dump_path: PathBuf) -> Store {
        let dbs = (0..databases).map(|_| Database::new()).collect();
        Store::new(
            dbs,
            StoreConfig {
                save_rules: default_save_rules(),
                dump_path,
            },
        )
    }

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false }),
            StoreResponse::Ok
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("k") }),
            StoreResponse::Bulk(b("v"))
        );
    }

    #[test]
    fn get_missing_is_nil() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("nope") }),
            StoreResponse::Nil
        );
    }

    #[test]
    fn setnx_only_sets_absent() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::Set { key: b("k"), value: b("v1"), nx: true }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Set { key: b("k"), value: b("v2"), nx: true }),
            StoreResponse::Bool(false)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("k") }),
            StoreResponse::Bulk(b("v1"))
        );
    }

    #[test]
    fn every_write_bumps_dirty() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        store.execute(0, StoreRequest::IncrBy { key: b("n"), delta: 1 });
        store.execute(0, StoreRequest::Del { key: b("k") });
        assert_eq!(store.dirty, 3);
        // reads don't
        store.execute(0, StoreRequest::Get { key: b("n") });
        store.execute(0, StoreRequest::Exists { key: b("n") });
        assert_eq!(store.dirty, 3);
    }

    #[test]
    fn failed_setnx_is_not_dirty() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: true });
        let before = store.dirty;
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v2"), nx: true });
        assert_eq!(store.dirty, before);
    }

    #[test]
    fn incr_on_missing_key_yields_one() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::IncrBy { key: b("n"), delta: 1 }),
            StoreResponse::Integer(1)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("n") }),
            StoreResponse::Bulk(b("1"))
        );
    }

    #[test]
    fn incr_on_list_treats_value_as_zero() {
        let mut store = store();
        store.execute(0, StoreRequest::Push { key: b("k"), value: b("x"), head: false });
        assert_eq!(
            store.execute(0, StoreRequest::IncrBy { key: b("k"), delta: 1 }),
            StoreResponse::Integer(1)
        );
        // the list was replaced with a string
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("k") }),
            StoreResponse::TypeName("string")
        );
    }

    #[test]
    fn incr_accumulates() {
        let mut store = store();
        for _ in 0..100 {
            store.execute(0, StoreRequest::IncrBy { key: b("n"), delta: 1 });
        }
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("n") }),
            StoreResponse::Bulk(b("100"))
        );
    }

    #[test]
    fn del_and_exists() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Exists { key: b("k") }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Del { key: b("k") }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Del { key: b("k") }),
            StoreResponse::Bool(false)
        );
        assert_eq!(
            store.execute(0, StoreRequest::Exists { key: b("k") }),
            StoreResponse::Bool(false)
        );
    }

    #[test]
    fn type_reports_tag_or_none() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("s"), value: b("v"), nx: false });
        store.execute(0, StoreRequest::Push { key: b("l"), value: b("v"), head: false });
        store.execute(0, StoreRequest::SAdd { key: b("t"), member: b("m") });
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("s") }),
            StoreResponse::TypeName("string")
        );
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("l") }),
            StoreResponse::TypeName("list")
        );
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("t") }),
            StoreResponse::TypeName("set")
        );
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("x") }),
            StoreResponse::TypeName("none")
        );
    }

    #[test]
    fn rename_moves_the_value() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("a"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Rename { src: b("a"), dst: b("b"), nx: false }),
            StoreResponse::Ok
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("a") }),
            StoreResponse::Nil
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("b") }),
            StoreResponse::Bulk(b("v"))
        );
    }

    #[test]
    fn rename_error_cases() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::Rename { src: b("a"), dst: b("a"), nx: false }),
            StoreResponse::SameSourceAndDest
        );
        assert_eq!(
            store.execute(0, StoreRequest::Rename { src: b("a"), dst: b("b"), nx: false }),
            StoreResponse::NoSuchKey
        );
    }

    #[test]
    fn renamenx_refuses_existing_destination() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("a"), value: b("1"), nx: false });
        store.execute(0, StoreRequest::Set { key: b("b"), value: b("2"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Rename { src: b("a"), dst: b("b"), nx: true }),
            StoreResponse::Bool(false)
        );
        // both keys intact
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("a") }),
            StoreResponse::Bulk(b("1"))
        );
    }

    #[test]
    fn move_between_databases() {
        let mut store = store();
        store.execute(1, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(1, StoreRequest::Move { key: b("k"), dst: 0 }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(1, StoreRequest::Get { key: b("k") }),
            StoreResponse::Nil
        );
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("k") }),
            StoreResponse::Bulk(b("v"))
        );
    }

    #[test]
    fn move_error_cases() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Move { key: b("k"), dst: 99 }),
            StoreResponse::InvalidDbIndex
        );
        assert_eq!(
            store.execute(0, StoreRequest::Move { key: b("k"), dst: -1 }),
            StoreResponse::InvalidDbIndex
        );
        assert_eq!(
            store.execute(0, StoreRequest::Move { key: b("k"), dst: 0 }),
            StoreResponse::SameDb
        );
        assert_eq!(
            store.execute(0, StoreRequest::Move { key: b("missing"), dst: 1 }),
            StoreResponse::Bool(false)
        );
        // destination collision
        store.execute(1, StoreRequest::Set { key: b("k"), value: b("other"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Move { key: b("k"), dst: 1 }),
            StoreResponse::Bool(false)
        );
    }

    #[test]
    fn databases_are_independent() {
        let mut store = store();
        store.execute(1, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Get { key: b("k") }),
            StoreResponse::Nil
        );
        assert_eq!(store.execute(0, StoreRequest::DbSize), StoreResponse::Integer(0));
        assert_eq!(store.execute(1, StoreRequest::DbSize), StoreResponse::Integer(1));
    }

    #[test]
    fn push_pop_order() {
        let mut store = store();
        for v in ["a", "b", "c"] {
            store.execute(0, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        assert_eq!(
            store.execute(0, StoreRequest::Pop { key: b("l"), head: true }),
            StoreResponse::Bulk(b("a"))
        );
        assert_eq!(
            store.execute(0, StoreRequest::Pop { key: b("l"), head: false }),
            StoreResponse::Bulk(b("c"))
        );
        assert_eq!(
            store.execute(0, StoreRequest::LLen { key: b("l") }),
            StoreResponse::Integer(1)
        );
    }

    #[test]
    fn pop_empty_or_missing_is_nil() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::Pop { key: b("l"), head: true }),
            StoreResponse::Nil
        );
        store.execute(0, StoreRequest::Push { key: b("l"), value: b("x"), head: false });
        store.execute(0, StoreRequest::Pop { key: b("l"), head: true });
        // the key remains, holding an empty list
        assert_eq!(
            store.execute(0, StoreRequest::TypeOf { key: b("l") }),
            StoreResponse::TypeName("list")
        );
        assert_eq!(
            store.execute(0, StoreRequest::Pop { key: b("l"), head: true }),
            StoreResponse::Nil
        );
    }

    #[test]
    fn list_ops_reject_wrong_type() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("s"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::Push { key: b("s"), value: b("x"), head: true }),
            StoreResponse::WrongType
        );
        assert_eq!(
            store.execute(0, StoreRequest::LLen { key: b("s") }),
            StoreResponse::WrongType
        );
        assert_eq!(
            store.execute(0, StoreRequest::Pop { key: b("s"), head: true }),
            StoreResponse::WrongType
        );
    }

    #[test]
    fn lindex_supports_negative_indexes() {
        let mut store = store();
        for v in ["a", "b", "c"] {
            store.execute(0, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        assert_eq!(
            store.execute(0, StoreRequest::LIndex { key: b("l"), index: 0 }),
            StoreResponse::Bulk(b("a"))
        );
        assert_eq!(
            store.execute(0, StoreRequest::LIndex { key: b("l"), index: -1 }),
            StoreResponse::Bulk(b("c"))
        );
        assert_eq!(
            store.execute(0, StoreRequest::LIndex { key: b("l"), index: 3 }),
            StoreResponse::Nil
        );
        assert_eq!(
            store.execute(0, StoreRequest::LIndex { key: b("l"), index: -4 }),
            StoreResponse::Nil
        );
    }

    #[test]
    fn lset_replaces_in_place() {
        let mut store = store();
        for v in ["a", "b", "c"] {
            store.execute(0, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        assert_eq!(
            store.execute(0, StoreRequest::LSet { key: b("l"), index: 1, value: b("B") }),
            StoreResponse::Ok
        );
        assert_eq!(
            store.execute(0, StoreRequest::LIndex { key: b("l"), index: 1 }),
            StoreResponse::Bulk(b("B"))
        );
        assert_eq!(
            store.execute(0, StoreRequest::LSet { key: b("l"), index: 9, value: b("X") }),
            StoreResponse::IndexOutOfRange
        );
        assert_eq!(
            store.execute(0, StoreRequest::LSet { key: b("m"), index: 0, value: b("X") }),
            StoreResponse::NoSuchKey
        );
    }

    #[test]
    fn lrange_boundaries() {
        let mut store = store();
        for v in ["a", "b", "c"] {
            store.execute(0, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("l"), start: 0, stop: -1 }),
            StoreResponse::Elements(vec![b("a"), b("b"), b("c")])
        );
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("l"), start: -3, stop: -1 }),
            StoreResponse::Elements(vec![b("a"), b("b"), b("c")])
        );
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("l"), start: 5, stop: 2 }),
            StoreResponse::Elements(vec![])
        );
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("l"), start: 0, stop: 1000 }),
            StoreResponse::Elements(vec![b("a"), b("b"), b("c")])
        );
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("missing"), start: 0, stop: -1 }),
            StoreResponse::Nil
        );
    }

    #[test]
    fn ltrim_keeps_the_window() {
        let mut store = store();
        for v in ["a", "b", "c", "d", "e"] {
            store.execute(0, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        assert_eq!(
            store.execute(0, StoreRequest::LTrim { key: b("l"), start: 1, stop: 3 }),
            StoreResponse::Ok
        );
        assert_eq!(
            store.execute(0, StoreRequest::LRange { key: b("l"), start: 0, stop: -1 }),
            StoreResponse::Elements(vec![b("b"), b("c"), b("d")])
        );
        // inverted window clears the list
        store.execute(0, StoreRequest::LTrim { key: b("l"), start: 2, stop: 1 });
        assert_eq!(
            store.execute(0, StoreRequest::LLen { key: b("l") }),
            StoreResponse::Integer(0)
        );
        assert_eq!(
            store.execute(0, StoreRequest::LTrim { key: b("x"), start: 0, stop: 1 }),
            StoreResponse::NoSuchKey
        );
    }

    #[test]
    fn sadd_srem_sismember() {
        let mut store = store();
        assert_eq!(
            store.execute(0, StoreRequest::SAdd { key: b("s"), member: b("m") }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::SAdd { key: b("s"), member: b("m") }),
            StoreResponse::Bool(false)
        );
        assert_eq!(
            store.execute(0, StoreRequest::SIsMember { key: b("s"), member: b("m") }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::SRem { key: b("s"), member: b("m") }),
            StoreResponse::Bool(true)
        );
        assert_eq!(
            store.execute(0, StoreRequest::SRem { key: b("s"), member: b("m") }),
            StoreResponse::Bool(false)
        );
        assert_eq!(
            store.execute(0, StoreRequest::SCard { key: b("s") }),
            StoreResponse::Integer(0)
        );
    }

    #[test]
    fn set_ops_reject_wrong_type() {
        let mut store = store();
        store.execute(0, StoreRequest::Set { key: b("s"), value: b("v"), nx: false });
        assert_eq!(
            store.execute(0, StoreRequest::SAdd { key: b("s"), member: b("m") }),
            StoreResponse::WrongType
        );
        assert_eq!(
            store.execute(0, StoreRequest::SCard { key: b("s") }),
            StoreResponse::WrongType
        );
    }

    #[test]
    fn sinter_intersects() {
        let mut store = store();
        for m in ["x", "y"] {
            store.execute(0, StoreRequest::SAdd { key: b("s1"), member: b(m) });
        }
        store.execute(0, StoreRequest::SAdd { key: b("s2"), member: b("y") });
        assert_eq!(
            store.execute(0, StoreRequest::SInter { keys: vec![b("s1"), b("s2")] }),
            StoreResponse::Elements(vec![b("y")])
        );
    }

    #[test]
    fn sinter_with_itself_is_identity() {
        let mut store = store();
        for m in ["x", "y"] {
            store.execute(0, StoreRequest::SAdd { key: b("s"), member: b(m) });
        }
        match store.execute(0, StoreRequest::SInter { keys: vec![b("s"), b("s")] }) {
            StoreResponse::Elements(mut members) => {
                members.sort();
                assert_eq!(members, vec![b("x"), b("y")]);
            }
            other => panic!("expected Elements, got {other:?}"),
        }
    }

    #[test]
    fn sinter_missing_participant_is_nil() {
        let mut store = store();
        store.execute(0, StoreRequest::SAdd { key: b("s"), member: b("m") });
        assert_eq!(
            store.execute(0, StoreRequest::SInter { keys: vec![b("s"), b("missing")] }),
            StoreResponse::Nil
        );
    }

    #[test]
    fn keys_and_randomkey() {
        let mut store = store();
        assert_eq!(store.execute(0, StoreRequest::RandomKey), StoreResponse::Nil);
        store.execute(0, StoreRequest::Set { key: b("foo"), value: b("1"), nx: false });
        store.execute(0, StoreRequest::Set { key: b("bar"), value: b("2"), nx: false });
        match store.execute(0, StoreRequest::Keys { pattern: b("f*") }) {
            StoreResponse::Elements(keys) => assert_eq!(keys, vec![b("foo")]),
            other => panic!("expected Elements, got {other:?}"),
        }
        match store.execute(0, StoreRequest::RandomKey) {
            StoreResponse::Bulk(key) => assert!(key == b("foo") || key == b("bar")),
            other => panic!("expected Bulk, got {other:?}"),
        }
    }

    #[test]
    fn save_resets_dirty_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DUMP_FILE);
        let mut store = store_with(16, path.clone());

        store.execute(0, StoreRequest::Set { key: b("greeting"), value: b("hello"), nx: false });
        for v in ["a", "b"] {
            store.execute(2, StoreRequest::Push { key: b("l"), value: b(v), head: false });
        }
        store.execute(5, StoreRequest::SAdd { key: b("s"), member: b("m") });
        assert!(store.dirty > 0);

        assert_eq!(store.execute(0, StoreRequest::Save), StoreResponse::Ok);
        assert_eq!(store.dirty, 0);
        assert!(store.last_save > 0);

        // reload into a fresh store and compare observable state
        let dbs = load_databases(&path, 16).unwrap();
        let mut reloaded = Store::new(
            dbs,
            StoreConfig { save_rules: Vec::new(), dump_path: path },
        );
        assert_eq!(
            reloaded.execute(0, StoreRequest::Get { key: b("greeting") }),
            StoreResponse::Bulk(b("hello"))
        );
        assert_eq!(
            reloaded.execute(2, StoreRequest::LRange { key: b("l"), start: 0, stop: -1 }),
            StoreResponse::Elements(vec![b("a"), b("b")])
        );
        assert_eq!(
            reloaded.execute(5, StoreRequest::SIsMember { key: b("s"), member: b("m") }),
            StoreResponse::Bool(true)
        );
        // db 1 was never touched
        assert_eq!(reloaded.execute(1, StoreRequest::DbSize), StoreResponse::Integer(0));
    }

    #[test]
    fn save_failure_reports_and_keeps_dirty() {
        let dir = tempfile::tempdir().unwrap();
        // a dump path whose parent doesn't exist makes the temp file
        // creation fail
        let path = dir.path().join("no-such-dir").join(DUMP_FILE);
        let mut store = store_with(1, path);
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });
        assert_eq!(store.execute(0, StoreRequest::Save), StoreResponse::SaveFailed);
        assert_eq!(store.dirty, 1);
    }

    #[test]
    fn load_missing_file_is_empty_server() {
        let dir = tempfile::tempdir().unwrap();
        let dbs = load_databases(&dir.path().join(DUMP_FILE), 4).unwrap();
        assert_eq!(dbs.len(), 4);
        assert!(dbs.iter().all(Database::is_empty));
    }

    #[test]
    fn load_rejects_out_of_range_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DUMP_FILE);
        {
            let mut writer = SnapshotWriter::create(&path).unwrap();
            writer.select_db(7).unwrap();
            writer
                .write_entry(b"k", &SnapValue::String(b("v")))
                .unwrap();
            writer.finish().unwrap();
        }
        let err = load_databases(&path, 4).unwrap_err();
        assert!(matches!(err, LoadError::DbIndexOutOfRange { index: 7, count: 4 }));
    }

    #[test]
    fn load_rejects_duplicate_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DUMP_FILE);
        {
            let mut writer = SnapshotWriter::create(&path).unwrap();
            writer.select_db(0).unwrap();
            writer.write_entry(b"k", &SnapValue::String(b("1"))).unwrap();
            writer.write_entry(b"k", &SnapValue::String(b("2"))).unwrap();
            writer.finish().unwrap();
        }
        let err = load_databases(&path, 4).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn bgsave_refuses_second_save_then_reaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DUMP_FILE);
        let mut store = store_with(1, path.clone());
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });

        assert_eq!(store.execute(0, StoreRequest::BgSave), StoreResponse::Ok);
        // a second request while one is in flight is refused
        assert_eq!(
            store.execute(0, StoreRequest::BgSave),
            StoreResponse::BgSaveInProgress
        );

        // wait for the writer, then let the cron reap it
        while !store.bgsave.as_ref().is_some_and(|h| h.is_finished()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        store.cron().await;
        assert!(store.bgsave.is_none());
        assert_eq!(store.dirty, 0);
        assert!(path.exists());

        let dbs = load_databases(&path, 1).unwrap();
        assert_eq!(dbs[0].len(), 1);
    }

    #[tokio::test]
    async fn cron_triggers_save_when_rule_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DUMP_FILE);
        let mut store = store_with(1, path.clone());
        store.config.save_rules = vec![SaveRule::new(0, 1)];
        store.execute(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false });

        // force the "more than `seconds` since last save" clause
        store.last_save = now_secs().saturating_sub(10);
        store.cron().await;
        let handle = store.bgsave.take().expect("cron should start a background save");
        assert!(handle.await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn spawned_store_round_trips_over_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_store(
            (0..2).map(|_| Database::new()).collect(),
            StoreConfig {
                save_rules: Vec::new(),
                dump_path: dir.path().join(DUMP_FILE),
            },
        );
        assert_eq!(
            handle
                .send(0, StoreRequest::Set { key: b("k"), value: b("v"), nx: false })
                .await
                .unwrap(),
            StoreResponse::Ok
        );
        assert_eq!(
            handle.send(0, StoreRequest::Get { key: b("k") }).await.unwrap(),
            StoreResponse::Bulk(b("v"))
        );
        assert_eq!(
            handle.send(1, StoreRequest::Get { key: b("k") }).await.unwrap(),
            StoreResponse::Nil
        );
    }
}
