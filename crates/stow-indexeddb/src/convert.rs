//! Conversions between stow values and JS values
//!
//! Records cross the boundary as JSON text (`JSON.parse` / `JSON.stringify`),
//! so whatever serde_json can represent round-trips. Keys map directly onto
//! JS numbers and strings.

use serde_json::Value;
use stow_core::{EngineError, EngineResult, Key, KeyRef};
use wasm_bindgen::JsValue;

use crate::error::{js_error, IndexedDbError};

/// Convert a record into a plain JS object.
pub fn value_to_js(value: &Value) -> EngineResult<JsValue> {
    let json = serde_json::to_string(value).map_err(IndexedDbError::from)?;
    js_sys::JSON::parse(&json).map_err(js_error)
}

/// Convert a stored JS value back into a record.
pub fn js_to_value(js: &JsValue) -> EngineResult<Value> {
    let json: String = js_sys::JSON::stringify(js).map_err(js_error)?.into();
    Ok(serde_json::from_str(&json).map_err(IndexedDbError::from)?)
}

pub fn key_to_js(key: &Key) -> JsValue {
    match key.as_key_ref() {
        KeyRef::Number(n) => JsValue::from_f64(n),
        KeyRef::String(s) => JsValue::from_str(s),
    }
}

/// Interpret an engine-reported key. Dates, arrays and binary keys are not representable.
pub fn js_to_key(js: &JsValue) -> EngineResult<Key> {
    if let Some(n) = js.as_f64() {
        return Key::number(n);
    }
    if let Some(s) = js.as_string() {
        return Ok(Key::string(s));
    }
    Err(EngineError::data(format!(
        "unsupported key type: {}",
        js.js_typeof().as_string().unwrap_or_default()
    )))
}
