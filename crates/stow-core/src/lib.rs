//! Stow core
//!
//! A thin, sequential connection handle over versioned key/value storage engines
//! such as the browser's IndexedDB. Every engine request is converted into a
//! single-resolution future, and schema changes are only reachable through a
//! scoped [`Upgrade`] capability that exists for the duration of a version upgrade.
//!
//! This crate is engine-neutral and runs identically in browser (WASM) and native
//! environments. The browser engine lives in `stow-indexeddb`; [`MemoryEngine`]
//! is a complete in-memory engine for tests and non-browser hosts.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use stow_core::{Connection, MemoryEngine, StoreOptions};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut conn = Connection::new(MemoryEngine::new());
//!
//! conn.open_with_upgrade("app", 1, |upgrade| {
//!     upgrade.create_store("users", StoreOptions::new().key_path("id"))?;
//!     Ok(())
//! })
//! .await
//! .unwrap();
//!
//! conn.put("users", &json!({"id": "1", "name": "John"})).await.unwrap();
//! let user: Option<serde_json::Value> = conn.get("users", "1").await.unwrap();
//! assert_eq!(user, Some(json!({"id": "1", "name": "John"})));
//! # });
//! ```

pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod key;
pub mod options;
pub mod request;
pub mod upgrade;

pub use config::ConnectionConfig;
pub use connection::{Connection, UpgradeFn};
pub use engine::{
    Database, Engine, EngineError, EngineErrorKind, EngineResult, MemoryEngine, Mutation,
    StoreAccess, TransactionMode, UpgradeHook, VersionChange,
};
pub use error::{Result, StowError};
pub use key::{Key, KeyRef};
pub use options::{IndexOptions, StoreOptions};
pub use request::{Request, Responder};
pub use upgrade::Upgrade;
