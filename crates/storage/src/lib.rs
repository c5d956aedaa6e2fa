//! SQLite-backed record store for caller-owned domain records.
//!
//! This crate persists the domain records the capability handlers operate
//! on (todos, projects, and test cases), each row owned by the caller who
//! created it. Reads, updates, and deletes are always filtered by owner, so
//! ownership violations are detected here and surface distinctly from
//! missing records.
//!
//! # Example
//!
//! ```no_run
//! use storage::{Record, RecordKind, RecordStore};
//!
//! let store = RecordStore::open("records.db")?;
//!
//! let todo = Record::new("u1", RecordKind::Todo, "review parser changes");
//! store.create(&todo)?;
//!
//! let mine = store.list("u1", RecordKind::Todo)?;
//! assert_eq!(mine.len(), 1);
//!
//! store.set_done("u1", todo.id, true)?;
//! store.delete("u1", todo.id)?;
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::{Record, RecordId, RecordKind};
pub use store::RecordStore;
