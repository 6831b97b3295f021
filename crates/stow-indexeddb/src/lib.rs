//! IndexedDB engine for stow (browser WASM)
//!
//! Implements the `stow-core` engine traits on top of `window.indexedDB` via
//! web-sys, so a [`stow_core::Connection`] can drive the browser's storage:
//! every IDB request becomes a single-resolution [`stow_core::Request`], and the
//! upgrade hook runs inside `onupgradeneeded` with the version change
//! transaction as its mutation context.
//!
//! # Example
//!
//! ```rust,ignore
//! use stow_core::{Connection, StoreOptions};
//! use stow_indexeddb::IndexedDbEngine;
//!
//! let mut conn = Connection::new(IndexedDbEngine::new());
//! conn.open_with_upgrade("app", 1, |upgrade| {
//!     upgrade.create_store("users", StoreOptions::new().key_path("id"))
//! })
//! .await?;
//!
//! conn.put("users", &serde_json::json!({"id": "1", "name": "John"})).await?;
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

pub use engine::{IndexedDbDatabase, IndexedDbEngine, IndexedDbMutation, IndexedDbStore};
pub use error::{IndexedDbError, Result};
