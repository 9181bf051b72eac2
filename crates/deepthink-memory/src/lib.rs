//! Memory store for deepthink
//!
//! The memory store is the only writer of persisted session state. Session
//! transitions are plain value operations: each takes a [`Session`] and
//! returns the updated one, so the cycle executor never mutates shared state
//! in place. Durability is delegated to a [`SessionBackend`].
//!
//! [`Session`]: deepthink_core::Session

pub mod backend;
pub mod config;
pub mod schema;
pub mod store;

pub use backend::{FileBackend, InMemoryBackend, STALE_TEMP_AGE, SessionBackend, write_atomic};
pub use config::SessionDefaults;
pub use schema::{SCHEMA_VERSION, SessionDocument};
pub use store::{MemoryStore, export_file_name};
