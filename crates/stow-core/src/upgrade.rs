//! Scoped schema-upgrade capability
//!
//! Structural changes (stores, indexes) are only legal while the engine is
//! delivering an upgrade-needed notification. [`Upgrade`] borrows the database
//! and the engine's mutation context for exactly that window, so it cannot
//! outlive the notification. The handle-level schema calls on
//! [`Connection`](crate::Connection) run the same checks with no context.
//!
//! Re-declaring an existing store or index is a no-op. The options of the
//! second declaration are ignored, so changing a store's configuration
//! requires deleting and re-creating it in a later version.

use tracing::{debug, info};

use crate::engine::{Database, Engine, EngineError, Mutation, VersionChange};
use crate::error::{Result, StowError};
use crate::options::{IndexOptions, StoreOptions};

pub(crate) type MutationOf<E> = <<E as Engine>::Database as Database>::Mutation;

/// Schema-mutation capability handed to the upgrade callback of
/// [`Connection::open_with_upgrade`](crate::Connection::open_with_upgrade).
pub struct Upgrade<'a, E: Engine> {
    db: &'a E::Database,
    mutation: &'a MutationOf<E>,
    change: VersionChange,
}

impl<'a, E: Engine> Upgrade<'a, E> {
    pub(crate) fn new(db: &'a E::Database, mutation: &'a MutationOf<E>, change: VersionChange) -> Self {
        Self {
            db,
            mutation,
            change,
        }
    }

    /// Version stored before this upgrade; 0 for a new database.
    pub fn old_version(&self) -> u32 {
        self.change.old_version
    }

    pub fn new_version(&self) -> u32 {
        self.change.new_version
    }

    pub fn store_names(&self) -> Vec<String> {
        self.db.store_names()
    }

    pub fn has_store(&self, name: &str) -> bool {
        has_store(self.db, name)
    }

    /// Index names declared on a store.
    pub fn index_names(&self, store: &str) -> Result<Vec<String>> {
        if !self.has_store(store) {
            return Err(StowError::StoreNotFound(store.to_string()));
        }
        self.mutation
            .index_names(store)
            .map_err(|e| StowError::Upgrade(e.to_string()))
    }

    /// Declare a store. A no-op if a store with this name already exists.
    pub fn create_store(&self, name: &str, options: StoreOptions) -> Result<()> {
        create_store(self.db, Some(self.mutation), name, &options)
    }

    /// Declare an index on an existing store. A no-op if the index already exists.
    pub fn create_index(
        &self,
        store: &str,
        index: &str,
        key_path: &str,
        options: IndexOptions,
    ) -> Result<()> {
        create_index(self.db, Some(self.mutation), store, index, key_path, &options)
    }

    /// Remove a store and all its records. A no-op if the store does not exist.
    pub fn delete_store(&self, name: &str) -> Result<()> {
        if !self.has_store(name) {
            return Ok(());
        }
        self.mutation
            .delete_store(name)
            .map_err(|e| StowError::DeleteStoreFailed(e.to_string()))?;
        info!(store = name, "deleted object store");
        Ok(())
    }
}

fn has_store<D: Database>(db: &D, name: &str) -> bool {
    db.store_names().iter().any(|s| s == name)
}

pub(crate) fn create_store<D: Database>(
    db: &D,
    mutation: Option<&D::Mutation>,
    name: &str,
    options: &StoreOptions,
) -> Result<()> {
    if has_store(db, name) {
        debug!(store = name, "object store already exists, keeping its configuration");
        return Ok(());
    }

    // No mutation context outside an upgrade; the engine is never consulted
    let mutation = mutation.ok_or_else(|| {
        StowError::CreateStoreFailed(
            EngineError::invalid_state("object stores can only be created during a version upgrade")
                .to_string(),
        )
    })?;
    mutation
        .create_store(name, options)
        .map_err(|e| StowError::CreateStoreFailed(e.to_string()))?;

    info!(
        store = name,
        key_path = ?options.key_path,
        auto_increment = options.auto_increment,
        "created object store"
    );
    Ok(())
}

pub(crate) fn create_index<D: Database>(
    db: &D,
    mutation: Option<&D::Mutation>,
    store: &str,
    index: &str,
    key_path: &str,
    options: &IndexOptions,
) -> Result<()> {
    let Some(mutation) = mutation else {
        return Err(StowError::IndexCreationOutsideUpgrade {
            store: store.to_string(),
            index: index.to_string(),
        });
    };
    if !has_store(db, store) {
        return Err(StowError::StoreNotFound(store.to_string()));
    }

    let existing = mutation
        .index_names(store)
        .map_err(|e| StowError::CreateIndexFailed(e.to_string()))?;
    if existing.iter().any(|i| i == index) {
        debug!(store, index, "index already exists, keeping its configuration");
        return Ok(());
    }

    mutation
        .create_index(store, index, key_path, options)
        .map_err(|e| StowError::CreateIndexFailed(e.to_string()))?;

    info!(
        store,
        index,
        key_path,
        unique = options.unique,
        multi_entry = options.multi_entry,
        "created index"
    );
    Ok(())
}
