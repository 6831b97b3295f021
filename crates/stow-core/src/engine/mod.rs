//! Storage engine abstraction
//!
//! This module defines the boundary between the connection handle and the host
//! storage facility. Implementations exist for:
//!
//! - **Memory**: In-memory engine with IndexedDB semantics (`MemoryEngine`)
//! - **IndexedDB**: Browser storage via web-sys (`stow-indexeddb` crate, WASM only)
//!
//! Engines are single-threaded and callback-driven. Every asynchronous call
//! returns a one-shot [`Request`](crate::Request); schema declarations are only
//! reachable through the [`Mutation`] context handed to the upgrade hook.

mod error;
mod memory;
mod traits;

pub use error::{EngineError, EngineErrorKind, EngineResult};
pub use memory::{MemoryDatabase, MemoryEngine, MemoryMutation, MemoryStore};
pub use traits::{
    Database, Engine, Mutation, StoreAccess, TransactionMode, UpgradeHook, VersionChange,
};
