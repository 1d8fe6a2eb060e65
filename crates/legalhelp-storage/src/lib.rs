//! LegalHelp Storage crate - durable key-value backends and typed chat persistence.
//!
//! Provides the `KeyValueStore` seam with in-memory, JSON-file and SQLite
//! implementations, and the `PersistenceStore` that loads and commits the
//! language preference and conversation log.

pub mod db;
pub mod kv;
pub mod migrations;
pub mod persistence;

pub use db::SqliteStore;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use persistence::{PersistenceStore, Snapshot, HISTORY_KEY, LANGUAGE_KEY};
