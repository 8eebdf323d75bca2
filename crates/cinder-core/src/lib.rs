//! cinder-core: the in-memory store.
//!
//! Owns the value model, the per-database keyspace, and the store task
//! that executes every command serially. Connections talk to the store
//! through a [`StoreHandle`]; the store runs its own one-second cron
//! for snapshot scheduling and background-save reaping.

pub mod db;
pub mod store;
pub mod types;

pub use db::Database;
pub use store::{
    default_save_rules, load_databases, spawn_store, LoadError, SaveRule, StoreConfig,
    StoreError, StoreHandle, StoreRequest, StoreResponse, DUMP_FILE,
};
pub use types::Value;
