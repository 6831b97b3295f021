//! IndexedDB implementation of the stow engine traits

use serde_json::Value;
use stow_core::{
    Database, Engine, EngineError, EngineResult, IndexOptions, Key, Mutation, Request,
    StoreAccess, StoreOptions, TransactionMode, UpgradeHook,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    DomStringList, IdbDatabase, IdbIndexParameters, IdbObjectStore, IdbObjectStoreParameters,
    IdbTransaction, IdbTransactionMode,
};

use crate::convert::{js_to_key, js_to_value, key_to_js, value_to_js};
use crate::error::js_error;
use crate::idb;

/// The browser's `indexedDB` factory.
///
/// Holds no state of its own; every call goes to the global factory, so
/// availability is re-checked on each open.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for IndexedDbEngine {
    type Database = IndexedDbDatabase;

    fn is_available(&self) -> bool {
        idb::idb_factory().is_ok()
    }

    fn open(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHook<IndexedDbDatabase>,
    ) -> Request<IndexedDbDatabase> {
        idb::open_database(name, version, on_upgrade)
    }

    fn delete_database(&self, name: &str) -> Request<()> {
        idb::delete_database(name)
    }
}

/// An open `IDBDatabase`.
#[derive(Debug, Clone)]
pub struct IndexedDbDatabase {
    db: IdbDatabase,
}

impl IndexedDbDatabase {
    pub(crate) fn new(db: IdbDatabase) -> Self {
        Self { db }
    }
}

impl Database for IndexedDbDatabase {
    type Mutation = IndexedDbMutation;
    type Store = IndexedDbStore;

    fn name(&self) -> String {
        self.db.name()
    }

    fn version(&self) -> u32 {
        self.db.version() as u32
    }

    fn store_names(&self) -> Vec<String> {
        string_list(&self.db.object_store_names())
    }

    fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<IndexedDbStore> {
        let mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        let tx = self
            .db
            .transaction_with_str_and_mode(store, mode)
            .map_err(js_error)?;
        let store = tx.object_store(store).map_err(js_error)?;
        Ok(IndexedDbStore { store })
    }

    fn close(&self) {
        self.db.close();
    }
}

/// Schema access through the version change transaction of an open request.
#[derive(Debug)]
pub struct IndexedDbMutation {
    db: IdbDatabase,
    tx: IdbTransaction,
}

impl IndexedDbMutation {
    pub(crate) fn new(db: IdbDatabase, tx: IdbTransaction) -> Self {
        Self { db, tx }
    }

    fn object_store(&self, store: &str) -> EngineResult<IdbObjectStore> {
        self.tx.object_store(store).map_err(js_error)
    }
}

impl Mutation for IndexedDbMutation {
    fn create_store(&self, name: &str, options: &StoreOptions) -> EngineResult<()> {
        let params = IdbObjectStoreParameters::new();
        if let Some(key_path) = &options.key_path {
            set(&params, "keyPath", &JsValue::from_str(key_path))?;
        }
        if options.auto_increment {
            set(&params, "autoIncrement", &JsValue::TRUE)?;
        }
        self.db
            .create_object_store_with_optional_parameters(name, &params)
            .map_err(js_error)?;
        Ok(())
    }

    fn delete_store(&self, name: &str) -> EngineResult<()> {
        self.db.delete_object_store(name).map_err(js_error)
    }

    fn index_names(&self, store: &str) -> EngineResult<Vec<String>> {
        Ok(string_list(&self.object_store(store)?.index_names()))
    }

    fn create_index(
        &self,
        store: &str,
        index: &str,
        key_path: &str,
        options: &IndexOptions,
    ) -> EngineResult<()> {
        let params = IdbIndexParameters::new();
        set(&params, "unique", &JsValue::from_bool(options.unique))?;
        set(&params, "multiEntry", &JsValue::from_bool(options.multi_entry))?;
        self.object_store(store)?
            .create_index_with_str_and_optional_parameters(index, key_path, &params)
            .map_err(js_error)?;
        Ok(())
    }
}

/// One object store inside a single-store transaction.
#[derive(Debug)]
pub struct IndexedDbStore {
    store: IdbObjectStore,
}

impl IndexedDbStore {
    fn insert(&self, value: Value, key: Option<Key>, overwrite: bool) -> Request<Key> {
        let record = match value_to_js(&value) {
            Ok(record) => record,
            Err(e) => return Request::ready(Err(e)),
        };
        let call = match (key, overwrite) {
            (Some(key), false) => self.store.add_with_key(&record, &key_to_js(&key)),
            (None, false) => self.store.add(&record),
            (Some(key), true) => self.store.put_with_key(&record, &key_to_js(&key)),
            (None, true) => self.store.put(&record),
        };
        idb::issue(call, |result| js_to_key(&result))
    }
}

impl StoreAccess for IndexedDbStore {
    fn add(&self, value: Value, key: Option<Key>) -> Request<Key> {
        self.insert(value, key, false)
    }

    fn put(&self, value: Value, key: Option<Key>) -> Request<Key> {
        self.insert(value, key, true)
    }

    fn get(&self, key: &Key) -> Request<Option<Value>> {
        idb::issue(self.store.get(&key_to_js(key)), |result| {
            if result.is_undefined() {
                return Ok(None);
            }
            js_to_value(&result).map(Some)
        })
    }

    fn delete(&self, key: &Key) -> Request<()> {
        idb::issue(self.store.delete(&key_to_js(key)), |_| Ok(()))
    }

    fn clear(&self) -> Request<()> {
        idb::issue(self.store.clear(), |_| Ok(()))
    }

    fn get_all(&self) -> Request<Vec<Value>> {
        idb::issue(self.store.get_all(), |result| {
            let records: js_sys::Array = result
                .dyn_into()
                .map_err(|_| EngineError::unknown("getAll result is not an array"))?;
            records.iter().map(|record| js_to_value(&record)).collect()
        })
    }

    fn count(&self) -> Request<u64> {
        idb::issue(self.store.count(), |result| {
            result
                .as_f64()
                .map(|n| n as u64)
                .ok_or_else(|| EngineError::unknown("count result is not a number"))
        })
    }
}

fn set(target: &JsValue, property: &str, value: &JsValue) -> EngineResult<()> {
    js_sys::Reflect::set(target, &property.into(), value).map_err(js_error)?;
    Ok(())
}

fn string_list(list: &DomStringList) -> Vec<String> {
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}
