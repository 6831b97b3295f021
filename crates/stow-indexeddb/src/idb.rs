//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into stow [`Request`]s. Each IDB
//! request is turned into a JS Promise, which is awaited on the local
//! executor via `wasm_bindgen_futures::JsFuture` and then settles the
//! request's responder exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Promise;
use stow_core::request::request;
use stow_core::{EngineError, EngineResult, Request, UpgradeHook, VersionChange};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbRequest, IdbVersionChangeEvent};

use crate::engine::{IndexedDbDatabase, IndexedDbMutation};
use crate::error::{js_error, IndexedDbError, Result};

/// Upgrade and blocked handlers of one open request
type OpenClosures = Rc<
    RefCell<
        Option<(
            Closure<dyn FnMut(IdbVersionChangeEvent)>,
            Closure<dyn FnMut(web_sys::Event)>,
        )>,
    >,
>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise.
///
/// Resolves with the request's result; rejects with the request's
/// `DOMException` so its name survives the trip.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ClosurePair = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |event: web_sys::Event| {
            // Handled here; keep the error from also aborting the transaction
            event.prevent_default();
            let error = match req_e.error() {
                Ok(Some(exception)) => JsValue::from(exception),
                Ok(None) => JsValue::from_str("unknown IDB error"),
                Err(thrown) => thrown,
            };
            let _ = reject.call1(&JsValue::UNDEFINED, &error);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Await `promise` on the local executor and settle a request with `settle`'s verdict.
fn settle_with<T, F>(promise: Promise, settle: F) -> Request<T>
where
    T: 'static,
    F: FnOnce(std::result::Result<JsValue, JsValue>) -> EngineResult<T> + 'static,
{
    let (responder, pending) = request();
    wasm_bindgen_futures::spawn_local(async move {
        let outcome = wasm_bindgen_futures::JsFuture::from(promise).await;
        responder.settle(settle(outcome));
    });
    pending
}

/// Await an IdbRequest, converting its result with `convert`.
pub fn await_request<T, F>(req: &IdbRequest, convert: F) -> Request<T>
where
    T: 'static,
    F: FnOnce(JsValue) -> EngineResult<T> + 'static,
{
    settle_with(request_to_promise(req), move |outcome| match outcome {
        Ok(result) => convert(result),
        Err(error) => Err(js_error(error)),
    })
}

/// Issue a store call. A synchronous throw (bad key, inactive transaction)
/// becomes an already-rejected request.
pub fn issue<T, F>(call: std::result::Result<IdbRequest, JsValue>, convert: F) -> Request<T>
where
    T: 'static,
    F: FnOnce(JsValue) -> EngineResult<T> + 'static,
{
    match call {
        Ok(req) => await_request(&req, convert),
        Err(thrown) => Request::ready(Err(js_error(thrown))),
    }
}

/// Open `name` at `version`, running `on_upgrade` inside `onupgradeneeded`.
///
/// A failing hook aborts the version change transaction; the open request
/// then rejects with an `AbortError` carrying the hook's message.
pub fn open_database(
    name: &str,
    version: u32,
    on_upgrade: UpgradeHook<IndexedDbDatabase>,
) -> Request<IndexedDbDatabase> {
    let factory = match idb_factory() {
        Ok(factory) => factory,
        Err(e) => return Request::ready(Err(e.into())),
    };
    let open_req: IdbOpenDbRequest = match factory.open_with_u32(name, version) {
        Ok(req) => req,
        Err(thrown) => return Request::ready(Err(js_error(thrown))),
    };

    let hook_failure: Rc<RefCell<Option<EngineError>>> = Rc::new(RefCell::new(None));

    let req_upgrade = open_req.clone();
    let failure_for_upgrade = hook_failure.clone();
    let db_name = name.to_string();
    let mut hook = Some(on_upgrade);
    let upgrade_handler = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        let Some(hook) = hook.take() else {
            return;
        };
        if let Err(err) = run_upgrade(&req_upgrade, &event, version, hook) {
            warn!(database = %db_name, error = %err, "upgrade failed, aborting");
            if let Some(tx) = req_upgrade.transaction() {
                let _ = tx.abort();
            }
            *failure_for_upgrade.borrow_mut() = Some(err);
        }
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);

    let blocked_name = name.to_string();
    let blocked_handler = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        warn!(
            database = %blocked_name,
            "open blocked: another connection still holds an older version"
        );
    }) as Box<dyn FnMut(web_sys::Event)>);

    open_req.set_onupgradeneeded(Some(upgrade_handler.as_ref().unchecked_ref()));
    open_req.set_onblocked(Some(blocked_handler.as_ref().unchecked_ref()));

    // Keep both closures alive until the open request settles
    let closures: OpenClosures =
        Rc::new(RefCell::new(Some((upgrade_handler, blocked_handler))));

    settle_with(request_to_promise(&open_req), move |outcome| {
        *closures.borrow_mut() = None;

        if let Some(err) = hook_failure.borrow_mut().take() {
            if let Ok(value) = outcome {
                value.unchecked_into::<IdbDatabase>().close();
            }
            return Err(EngineError::abort(format!(
                "version change transaction was aborted: {}",
                err.message
            )));
        }

        let db = outcome
            .map_err(js_error)?
            .dyn_into::<IdbDatabase>()
            .map_err(|_| EngineError::unknown("open result is not an IDBDatabase"))?;
        Ok(IndexedDbDatabase::new(db))
    })
}

fn run_upgrade(
    req: &IdbOpenDbRequest,
    event: &IdbVersionChangeEvent,
    requested_version: u32,
    hook: UpgradeHook<IndexedDbDatabase>,
) -> EngineResult<()> {
    let db: IdbDatabase = req.result().map_err(js_error)?.unchecked_into();
    let tx = req
        .transaction()
        .ok_or_else(|| EngineError::invalid_state("upgrade has no version change transaction"))?;

    let change = VersionChange {
        old_version: event.old_version() as u32,
        new_version: event
            .new_version()
            .map_or(requested_version, |v| v as u32),
    };
    debug!(
        old_version = change.old_version,
        new_version = change.new_version,
        "upgradeneeded"
    );

    let database = IndexedDbDatabase::new(db.clone());
    let mutation = IndexedDbMutation::new(db, tx);
    hook(&database, &mutation, change)
}

/// Delete an IndexedDB database by name.
pub fn delete_database(name: &str) -> Request<()> {
    let factory = match idb_factory() {
        Ok(factory) => factory,
        Err(e) => return Request::ready(Err(e.into())),
    };
    let req = match factory.delete_database(name) {
        Ok(req) => req,
        Err(thrown) => return Request::ready(Err(js_error(thrown))),
    };

    let blocked_name = name.to_string();
    let on_blocked = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        warn!(
            database = %blocked_name,
            "delete blocked: another connection is still open"
        );
    }) as Box<dyn FnMut(web_sys::Event)>);
    req.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

    settle_with(request_to_promise(&req), move |outcome| {
        drop(on_blocked);
        outcome.map(|_| ()).map_err(js_error)
    })
}
