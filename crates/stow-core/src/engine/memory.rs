//! In-memory storage engine
//!
//! A BTreeMap-based engine that follows IndexedDB semantics closely enough to
//! drive the connection handle in tests and non-browser hosts:
//! - versioned databases with an upgrade hook run on open
//! - in-line (key-path) and out-of-line keys, key generators
//! - unique and multi-entry indexes (enforced, not queryable)
//!
//! Not suitable for production use due to lack of persistence. Databases live
//! as long as the engine (and its clones).

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info};

use crate::engine::error::{EngineError, EngineErrorKind, EngineResult};
use crate::engine::traits::{
    Database, Engine, Mutation, StoreAccess, TransactionMode, UpgradeHook, VersionChange,
};
use crate::key::{evaluate_key_path, inject_key, Key};
use crate::options::{IndexOptions, StoreOptions};
use crate::request::Request;

/// Key generators stop at 2^53, the largest exactly representable integer.
const MAX_GENERATED_KEY: u64 = 1 << 53;

type SharedState = Rc<RefCell<DatabaseState>>;

/// In-memory engine.
///
/// Clones share the same set of databases, so a database written through one
/// connection is visible to the next connection opened on any clone.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    databases: Rc<RefCell<HashMap<String, SharedState>>>,
    available: bool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create a new engine with no databases.
    pub fn new() -> Self {
        Self {
            databases: Rc::new(RefCell::new(HashMap::new())),
            available: true,
        }
    }

    /// An engine standing in for a host without storage support.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Names of the databases currently held, sorted.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    fn open_database(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHook<MemoryDatabase>,
    ) -> EngineResult<MemoryDatabase> {
        if !self.available {
            return Err(EngineError::unknown("storage is unavailable"));
        }
        if version == 0 {
            return Err(EngineError::new(
                EngineErrorKind::TypeError,
                "version must be greater than 0",
            ));
        }

        let existing = self.databases.borrow().get(name).cloned();
        let is_new = existing.is_none();
        let state = existing.unwrap_or_default();
        let old_version = state.borrow().version;

        if version < old_version {
            return Err(EngineError::new(
                EngineErrorKind::VersionError,
                format!(
                    "requested version ({}) is less than the existing version ({})",
                    version, old_version
                ),
            ));
        }

        let db = MemoryDatabase {
            name: name.to_string(),
            state: state.clone(),
            closed: Rc::new(Cell::new(false)),
        };

        if version > old_version {
            info!(database = name, old_version, new_version = version, "upgrade needed");

            let snapshot = state.borrow().clone();
            state.borrow_mut().version = version;

            let mutation = MemoryMutation {
                state: state.clone(),
            };
            let change = VersionChange {
                old_version,
                new_version: version,
            };

            if let Err(err) = on_upgrade(&db, &mutation, change) {
                *state.borrow_mut() = snapshot;
                return Err(EngineError::abort(format!(
                    "version change transaction was aborted: {}",
                    err.message
                )));
            }

            if is_new {
                self.databases
                    .borrow_mut()
                    .insert(name.to_string(), state);
            }
        }

        Ok(db)
    }
}

impl Engine for MemoryEngine {
    type Database = MemoryDatabase;

    fn is_available(&self) -> bool {
        self.available
    }

    fn open(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHook<MemoryDatabase>,
    ) -> Request<MemoryDatabase> {
        Request::ready(self.open_database(name, version, on_upgrade))
    }

    fn delete_database(&self, name: &str) -> Request<()> {
        if !self.available {
            return Request::ready(Err(EngineError::unknown("storage is unavailable")));
        }
        if self.databases.borrow_mut().remove(name).is_some() {
            debug!(database = name, "deleted database");
        }
        Request::ready(Ok(()))
    }
}

#[derive(Debug, Clone, Default)]
struct DatabaseState {
    version: u32,
    stores: BTreeMap<String, StoreState>,
}

impl DatabaseState {
    fn store(&self, name: &str) -> EngineResult<&StoreState> {
        self.stores.get(name).ok_or_else(|| store_not_found(name))
    }

    fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreState> {
        self.stores.get_mut(name).ok_or_else(|| store_not_found(name))
    }
}

#[derive(Debug, Clone)]
struct StoreState {
    options: StoreOptions,
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexState>,
    next_key: u64,
}

impl StoreState {
    fn new(options: StoreOptions) -> Self {
        Self {
            options,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
            next_key: 1,
        }
    }

    fn insert(&mut self, mut value: Value, key: Option<Key>, overwrite: bool) -> EngineResult<Key> {
        let key = self.resolve_key(&mut value, key)?;

        // A consumed generator value stays consumed even if the write is rejected
        if self.options.auto_increment {
            self.bump_generator(&key);
        }

        if !overwrite && self.records.contains_key(&key) {
            return Err(EngineError::constraint(format!(
                "a record with key {} already exists",
                key
            )));
        }
        self.check_unique(&key, &value)?;

        self.records.insert(key.clone(), value);
        Ok(key)
    }

    fn resolve_key(&mut self, value: &mut Value, key: Option<Key>) -> EngineResult<Key> {
        match (self.options.key_path.clone(), key) {
            (Some(_), Some(_)) => Err(EngineError::data(
                "the object store uses in-line keys and the key parameter was provided",
            )),
            (Some(path), None) => match evaluate_key_path(&path, value).map(Key::from_value) {
                Some(derived) => derived,
                None if self.options.auto_increment => {
                    let generated = self.generate_key()?;
                    inject_key(&path, value, &generated)?;
                    Ok(generated)
                }
                None => Err(EngineError::data(format!(
                    "evaluating the key path '{}' did not yield a value",
                    path
                ))),
            },
            (None, Some(key)) => Ok(key),
            (None, None) if self.options.auto_increment => self.generate_key(),
            (None, None) => Err(EngineError::data(
                "the object store uses out-of-line keys and has no key generator \
                 and the key parameter was not provided",
            )),
        }
    }

    fn generate_key(&self) -> EngineResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(EngineError::constraint("the key generator is exhausted"));
        }
        Key::try_from(self.next_key)
    }

    fn bump_generator(&mut self, key: &Key) {
        if let Some(n) = key.as_f64() {
            if n >= self.next_key as f64 {
                let floor = n.floor().min(MAX_GENERATED_KEY as f64) as u64;
                self.next_key = floor + 1;
            }
        }
    }

    fn check_unique(&self, key: &Key, value: &Value) -> EngineResult<()> {
        for (name, index) in self.indexes.iter().filter(|(_, i)| i.options.unique) {
            let index_keys = index.keys_for(value);
            if index_keys.is_empty() {
                continue;
            }
            let taken = self
                .records
                .iter()
                .filter(|(other, _)| *other != key)
                .any(|(_, other)| index.keys_for(other).iter().any(|k| index_keys.contains(k)));
            if taken {
                return Err(EngineError::constraint(format!(
                    "unique index '{}' already contains an entry for this record",
                    name
                )));
            }
        }
        Ok(())
    }

    fn check_unique_existing(&self, name: &str, index: &IndexState) -> EngineResult<()> {
        let mut seen: BTreeMap<Key, &Key> = BTreeMap::new();
        for (primary, record) in &self.records {
            for index_key in index.keys_for(record) {
                if let Some(owner) = seen.insert(index_key, primary) {
                    if owner != primary {
                        return Err(EngineError::constraint(format!(
                            "existing records violate unique index '{}'",
                            name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct IndexState {
    key_path: String,
    options: IndexOptions,
}

impl IndexState {
    /// Index keys a record contributes; invalid or missing values contribute none.
    fn keys_for(&self, record: &Value) -> Vec<Key> {
        match evaluate_key_path(&self.key_path, record) {
            None => Vec::new(),
            Some(Value::Array(items)) if self.options.multi_entry => {
                let mut keys: Vec<Key> = items
                    .iter()
                    .filter_map(|item| Key::from_value(item).ok())
                    .collect();
                keys.sort();
                keys.dedup();
                keys
            }
            Some(found) => Key::from_value(found).ok().into_iter().collect(),
        }
    }
}

fn store_not_found(name: &str) -> EngineError {
    EngineError::not_found(format!("object store '{}' not found", name))
}

/// Open database reference held by a connection.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: String,
    state: SharedState,
    closed: Rc<Cell<bool>>,
}

impl Database for MemoryDatabase {
    type Mutation = MemoryMutation;
    type Store = MemoryStore;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn version(&self) -> u32 {
        self.state.borrow().version
    }

    fn store_names(&self) -> Vec<String> {
        self.state.borrow().stores.keys().cloned().collect()
    }

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<MemoryStore> {
        if self.closed.get() {
            return Err(EngineError::invalid_state("the database connection is closed"));
        }
        self.state.borrow().store(store)?;
        Ok(MemoryStore {
            name: store.to_string(),
            state: self.state.clone(),
            mode,
        })
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

/// Schema-mutation context handed to the upgrade hook.
#[derive(Debug)]
pub struct MemoryMutation {
    state: SharedState,
}

impl Mutation for MemoryMutation {
    fn create_store(&self, name: &str, options: &StoreOptions) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        if state.stores.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "object store '{}' already exists",
                name
            )));
        }
        if options.auto_increment && options.key_path.as_deref() == Some("") {
            return Err(EngineError::new(
                EngineErrorKind::InvalidAccessError,
                "a key generator requires a non-empty key path",
            ));
        }
        state
            .stores
            .insert(name.to_string(), StoreState::new(options.clone()));
        Ok(())
    }

    fn delete_store(&self, name: &str) -> EngineResult<()> {
        self.state
            .borrow_mut()
            .stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| store_not_found(name))
    }

    fn index_names(&self, store: &str) -> EngineResult<Vec<String>> {
        Ok(self
            .state
            .borrow()
            .store(store)?
            .indexes
            .keys()
            .cloned()
            .collect())
    }

    fn create_index(
        &self,
        store: &str,
        index: &str,
        key_path: &str,
        options: &IndexOptions,
    ) -> EngineResult<()> {
        let mut state = self.state.borrow_mut();
        let store_state = state.store_mut(store)?;
        if store_state.indexes.contains_key(index) {
            return Err(EngineError::constraint(format!(
                "index '{}' already exists on '{}'",
                index, store
            )));
        }

        let index_state = IndexState {
            key_path: key_path.to_string(),
            options: *options,
        };
        if options.unique {
            store_state.check_unique_existing(index, &index_state)?;
        }
        store_state.indexes.insert(index.to_string(), index_state);
        Ok(())
    }
}

/// Transaction-scoped accessor for one store.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    state: SharedState,
    mode: TransactionMode,
}

impl MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> EngineResult<T> {
        let state = self.state.borrow();
        Ok(f(state.store(&self.name)?))
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> EngineResult<T>) -> EngineResult<T> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(EngineError::new(
                EngineErrorKind::ReadOnlyError,
                "the transaction is read-only",
            ));
        }
        let mut state = self.state.borrow_mut();
        f(state.store_mut(&self.name)?)
    }
}

impl StoreAccess for MemoryStore {
    fn add(&self, value: Value, key: Option<Key>) -> Request<Key> {
        Request::ready(self.write(|store| store.insert(value, key, false)))
    }

    fn put(&self, value: Value, key: Option<Key>) -> Request<Key> {
        Request::ready(self.write(|store| store.insert(value, key, true)))
    }

    fn get(&self, key: &Key) -> Request<Option<Value>> {
        Request::ready(self.read(|store| store.records.get(key).cloned()))
    }

    fn delete(&self, key: &Key) -> Request<()> {
        Request::ready(self.write(|store| {
            store.records.remove(key);
            Ok(())
        }))
    }

    fn clear(&self) -> Request<()> {
        Request::ready(self.write(|store| {
            store.records.clear();
            Ok(())
        }))
    }

    fn get_all(&self) -> Request<Vec<Value>> {
        Request::ready(self.read(|store| store.records.values().cloned().collect()))
    }

    fn count(&self) -> Request<u64> {
        Request::ready(self.read(|store| store.records.len() as u64))
    }
}
