//! Engine trait definitions

use serde_json::Value;

use crate::engine::error::EngineResult;
use crate::key::Key;
use crate::options::{IndexOptions, StoreOptions};
use crate::request::Request;

/// Callback run synchronously inside the engine's upgrade-needed notification.
///
/// Receives the database being upgraded, the schema-mutation context for this
/// upgrade and the version transition. Returning `Err` aborts the upgrade and
/// the pending open request rejects.
pub type UpgradeHook<D> = Box<
    dyn FnOnce(&D, &<D as Database>::Mutation, VersionChange) -> EngineResult<()>,
>;

/// Transaction mode for data requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Version transition reported with an upgrade-needed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    /// Stored version before the upgrade; 0 when the database is new.
    pub old_version: u32,
    pub new_version: u32,
}

/// Entry point to a host storage facility (`window.indexedDB` in browsers).
pub trait Engine {
    type Database: Database;

    /// Whether the host exposes the storage capability at all.
    fn is_available(&self) -> bool;

    /// Issue a single open request for `name` at `version`.
    ///
    /// When the requested version exceeds the stored one (or the database does
    /// not exist yet), `on_upgrade` runs before the request resolves.
    fn open(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHook<Self::Database>,
    ) -> Request<Self::Database>;

    /// Delete a database. Deleting a database that does not exist succeeds.
    fn delete_database(&self, name: &str) -> Request<()>;
}

/// An open database reference.
pub trait Database {
    type Mutation: Mutation;
    type Store: StoreAccess;

    fn name(&self) -> String;

    fn version(&self) -> u32;

    /// Names of all object stores, including ones declared by an in-flight upgrade.
    fn store_names(&self) -> Vec<String>;

    /// Start a transaction scoped to one store and return its store accessor.
    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Self::Store>;

    fn close(&self);
}

/// Schema-mutation context, only valid during an upgrade.
///
/// Engines throw synchronously on constraint violations (duplicate names,
/// missing stores), so these calls return plain results.
pub trait Mutation {
    fn create_store(&self, name: &str, options: &StoreOptions) -> EngineResult<()>;

    fn delete_store(&self, name: &str) -> EngineResult<()>;

    fn index_names(&self, store: &str) -> EngineResult<Vec<String>>;

    fn create_index(
        &self,
        store: &str,
        index: &str,
        key_path: &str,
        options: &IndexOptions,
    ) -> EngineResult<()>;
}

/// Transaction-scoped store accessor. Each call issues exactly one request.
pub trait StoreAccess {
    /// Insert a new record; resolves with the effective key.
    fn add(&self, value: Value, key: Option<Key>) -> Request<Key>;

    /// Insert or overwrite a record; resolves with the effective key.
    fn put(&self, value: Value, key: Option<Key>) -> Request<Key>;

    /// Resolves with `None` when no record has the key.
    fn get(&self, key: &Key) -> Request<Option<Value>>;

    fn delete(&self, key: &Key) -> Request<()>;

    fn clear(&self) -> Request<()>;

    /// All records in key order.
    fn get_all(&self) -> Request<Vec<Value>>;

    fn count(&self) -> Request<u64>;
}
