//! Connection handle
//!
//! [`Connection`] owns at most one open database and drives it through
//! single-request transactions. Data operations never batch: each call opens
//! one transaction on one store, issues one request and settles with that
//! request's outcome.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::engine::{
    Database, Engine, EngineError, StoreAccess, TransactionMode, UpgradeHook, VersionChange,
};
use crate::error::{Result, StowError};
use crate::key::Key;
use crate::options::{IndexOptions, StoreOptions};
use crate::upgrade::{self, MutationOf, Upgrade};

/// Boxed upgrade callback, run synchronously while the engine upgrades the database.
pub type UpgradeFn<E> = Box<dyn FnOnce(&Upgrade<'_, E>) -> Result<()>>;

/// Sequential, future-returning handle over a storage engine.
///
/// The handle starts empty, is populated by [`open`](Self::open), and is
/// emptied again by [`close`](Self::close); it can be reopened afterwards.
/// Calls must be serialized by the caller: nothing may run before `open`
/// settles.
pub struct Connection<E: Engine> {
    engine: E,
    db: Option<E::Database>,
}

impl<E: Engine + 'static> Connection<E> {
    /// Create an empty handle over the given engine.
    pub fn new(engine: E) -> Self {
        Self { engine, db: None }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    /// Name of the open database.
    pub fn name(&self) -> Option<String> {
        self.db.as_ref().map(Database::name)
    }

    /// Version of the open database.
    pub fn version(&self) -> Option<u32> {
        self.db.as_ref().map(Database::version)
    }

    pub fn store_names(&self) -> Result<Vec<String>> {
        Ok(self.database()?.store_names())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open `name` at `version` without upgrade logic.
    pub async fn open(&mut self, name: &str, version: u32) -> Result<()> {
        self.open_inner(name, version, None).await
    }

    /// Open `name` at `version`, running `upgrade` if the engine reports that
    /// the stored version is older (or the database is new).
    ///
    /// The callback runs synchronously inside the engine's upgrade notification
    /// and must not suspend. Returning `Err` aborts the upgrade and the open
    /// fails with [`StowError::OpenFailed`].
    pub async fn open_with_upgrade<F>(&mut self, name: &str, version: u32, upgrade: F) -> Result<()>
    where
        F: FnOnce(&Upgrade<'_, E>) -> Result<()> + 'static,
    {
        self.open_inner(name, version, Some(Box::new(upgrade))).await
    }

    /// Open the database described by `config`.
    pub async fn open_with(
        &mut self,
        config: &ConnectionConfig,
        upgrade: Option<UpgradeFn<E>>,
    ) -> Result<()> {
        config.validate()?;
        self.open_inner(&config.name, config.version, upgrade).await
    }

    async fn open_inner(
        &mut self,
        name: &str,
        version: u32,
        upgrade: Option<UpgradeFn<E>>,
    ) -> Result<()> {
        if !self.engine.is_available() {
            return Err(StowError::UnsupportedEnvironment);
        }
        self.close();

        info!(database = name, version, "opening database");

        let hook: UpgradeHook<E::Database> = Box::new(
            move |db: &E::Database, mutation: &MutationOf<E>, change: VersionChange| {
                info!(
                    old_version = change.old_version,
                    new_version = change.new_version,
                    "upgrading database"
                );
                let context = Upgrade::<E>::new(db, mutation, change);
                let result = match upgrade {
                    Some(callback) => callback(&context),
                    None => Ok(()),
                };
                result.map_err(|e| EngineError::abort(e.to_string()))
            },
        );

        let db = self
            .engine
            .open(name, version, hook)
            .await
            .map_err(|e| StowError::OpenFailed(e.to_string()))?;

        info!(database = name, version = db.version(), "database open");
        self.db = Some(db);
        Ok(())
    }

    /// Close the open database. Safe to call repeatedly or before any open.
    pub fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close();
            info!(database = %db.name(), "database closed");
        }
    }

    /// Delete a database, closing this handle first if it holds that database.
    pub async fn delete_database(&mut self, name: &str) -> Result<()> {
        if !self.engine.is_available() {
            return Err(StowError::UnsupportedEnvironment);
        }
        if self.name().as_deref() == Some(name) {
            self.close();
        }
        self.engine
            .delete_database(name)
            .await
            .map_err(|e| StowError::DeleteDatabaseFailed(e.to_string()))?;
        info!(database = name, "database deleted");
        Ok(())
    }

    // ========================================================================
    // Schema (outside an upgrade window)
    // ========================================================================

    /// Declare a store through the handle.
    ///
    /// Succeeds as a no-op when the store exists. Otherwise the handle refuses
    /// on its own, without consulting the engine: it holds no mutation
    /// context outside an upgrade, so the call fails with
    /// [`StowError::CreateStoreFailed`] carrying an `InvalidStateError`
    /// diagnostic (what IndexedDB throws for the same call). Create stores
    /// through [`Upgrade::create_store`].
    pub fn create_store(&self, store: &str, options: StoreOptions) -> Result<()> {
        upgrade::create_store(self.database()?, None, store, &options)
    }

    /// Declare an index through the handle. Always fails with
    /// [`StowError::IndexCreationOutsideUpgrade`] once open; use
    /// [`Upgrade::create_index`].
    pub fn create_index(
        &self,
        store: &str,
        index: &str,
        key_path: &str,
        options: IndexOptions,
    ) -> Result<()> {
        upgrade::create_index(self.database()?, None, store, index, key_path, &options)
    }

    // ========================================================================
    // Data operations
    // ========================================================================

    /// Insert a new record; fails if its key is already taken. Resolves with the key.
    pub async fn add<T>(&self, store: &str, record: &T) -> Result<Key>
    where
        T: Serialize + ?Sized,
    {
        self.insert(store, record, None, false).await
    }

    /// Insert a new record under an out-of-line key.
    pub async fn add_with_key<T>(&self, store: &str, key: impl Into<Key>, record: &T) -> Result<Key>
    where
        T: Serialize + ?Sized,
    {
        self.insert(store, record, Some(key.into()), false).await
    }

    /// Insert or overwrite a record. Resolves with the key.
    pub async fn put<T>(&self, store: &str, record: &T) -> Result<Key>
    where
        T: Serialize + ?Sized,
    {
        self.insert(store, record, None, true).await
    }

    /// Insert or overwrite a record under an out-of-line key.
    pub async fn put_with_key<T>(&self, store: &str, key: impl Into<Key>, record: &T) -> Result<Key>
    where
        T: Serialize + ?Sized,
    {
        self.insert(store, record, Some(key.into()), true).await
    }

    async fn insert<T>(&self, store: &str, record: &T, key: Option<Key>, overwrite: bool) -> Result<Key>
    where
        T: Serialize + ?Sized,
    {
        let failed: fn(String) -> StowError = if overwrite {
            StowError::PutFailed
        } else {
            StowError::AddFailed
        };

        let db = self.database()?;
        let value = serde_json::to_value(record)?;
        let access = transaction(db, store, TransactionMode::ReadWrite, failed)?;

        let request = if overwrite {
            debug!(store, key = ?key, "put");
            access.put(value, key)
        } else {
            debug!(store, key = ?key, "add");
            access.add(value, key)
        };
        request.await.map_err(|e| failed(e.to_string()))
    }

    /// Fetch the record at `key`; `None` when there is no such record.
    pub async fn get<T>(&self, store: &str, key: impl Into<Key>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let key = key.into();
        let access = transaction(
            self.database()?,
            store,
            TransactionMode::ReadOnly,
            StowError::GetFailed,
        )?;

        debug!(store, %key, "get");
        let value = access
            .get(&key)
            .await
            .map_err(|e| StowError::GetFailed(e.to_string()))?;
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    /// Remove the record at `key`. Succeeds when there is no such record.
    pub async fn delete(&self, store: &str, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let access = transaction(
            self.database()?,
            store,
            TransactionMode::ReadWrite,
            StowError::DeleteFailed,
        )?;

        debug!(store, %key, "delete");
        access
            .delete(&key)
            .await
            .map_err(|e| StowError::DeleteFailed(e.to_string()))
    }

    /// Remove every record in the store.
    pub async fn clear(&self, store: &str) -> Result<()> {
        let access = transaction(
            self.database()?,
            store,
            TransactionMode::ReadWrite,
            StowError::ClearFailed,
        )?;

        debug!(store, "clear");
        access
            .clear()
            .await
            .map_err(|e| StowError::ClearFailed(e.to_string()))
    }

    /// All records in the store, in key order.
    pub async fn get_all<T>(&self, store: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let access = transaction(
            self.database()?,
            store,
            TransactionMode::ReadOnly,
            StowError::GetAllFailed,
        )?;

        debug!(store, "getAll");
        let values = access
            .get_all()
            .await
            .map_err(|e| StowError::GetAllFailed(e.to_string()))?;
        Ok(values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()?)
    }

    /// Number of records in the store.
    pub async fn count(&self, store: &str) -> Result<u64> {
        let access = transaction(
            self.database()?,
            store,
            TransactionMode::ReadOnly,
            StowError::CountFailed,
        )?;

        debug!(store, "count");
        access
            .count()
            .await
            .map_err(|e| StowError::CountFailed(e.to_string()))
    }

    fn database(&self) -> Result<&E::Database> {
        self.db.as_ref().ok_or(StowError::NotOpen)
    }
}

impl<E: Engine> Drop for Connection<E> {
    fn drop(&mut self) {
        if let Some(db) = self.db.take() {
            db.close();
        }
    }
}

/// Start a one-store transaction, mapping engine failures to the calling operation's error.
fn transaction<D: Database>(
    db: &D,
    store: &str,
    mode: TransactionMode,
    failed: fn(String) -> StowError,
) -> Result<D::Store> {
    db.transaction(store, mode).map_err(|e| failed(e.to_string()))
}
