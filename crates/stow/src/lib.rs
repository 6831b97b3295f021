//! # Stow
//!
//! A thin, promise-style handle over versioned key/value storage:
//! - **core**: [`Connection`], [`Upgrade`], keys, options and errors, re-exported from `stow-core`
//! - **engines**: [`MemoryEngine`] everywhere; `IndexedDbEngine` in browsers with the `indexeddb` feature
//! - **tracing**: Logging setup for native hosts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stow::{Connection, MemoryEngine, StoreOptions};
//!
//! stow::tracing::init();
//!
//! let mut conn = Connection::new(MemoryEngine::new());
//! conn.open_with_upgrade("app", 1, |upgrade| {
//!     upgrade.create_store("users", StoreOptions::new().key_path("id"))
//! })
//! .await?;
//! ```

#[cfg(not(target_arch = "wasm32"))]
pub mod tracing;

pub use stow_core::{
    config, engine, key, options, request, Connection, ConnectionConfig, Database, Engine,
    EngineError, EngineErrorKind, EngineResult, IndexOptions, Key, KeyRef, MemoryEngine, Mutation,
    Request, Responder, Result, StoreAccess, StoreOptions, StowError, TransactionMode, Upgrade,
    UpgradeFn, UpgradeHook, VersionChange,
};

#[cfg(feature = "indexeddb")]
pub use stow_indexeddb::{IndexedDbEngine, IndexedDbError};
