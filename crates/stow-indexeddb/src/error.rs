//! Error types for the IndexedDB engine

use stow_core::{EngineError, EngineErrorKind};
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB helpers
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors raised while talking to the browser's IndexedDB
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// A `DOMException` thrown or reported by IndexedDB
    #[error("{name}: {message}")]
    Dom { name: String, message: String },

    /// Any other thrown JavaScript value
    #[error("JS error: {0}")]
    Js(String),

    /// Record could not cross the JS boundary as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        if let Some(exception) = val.dyn_ref::<DomException>() {
            return IndexedDbError::Dom {
                name: exception.name(),
                message: exception.message(),
            };
        }
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IndexedDbError::Js(msg)
    }
}

impl From<DomException> for IndexedDbError {
    fn from(exception: DomException) -> Self {
        IndexedDbError::Dom {
            name: exception.name(),
            message: exception.message(),
        }
    }
}

/// DOMException names map onto engine error kinds; everything else is unknown.
impl From<IndexedDbError> for EngineError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::Dom { name, message } => {
                EngineError::new(EngineErrorKind::from_name(&name), message)
            }
            IndexedDbError::NotAvailable(msg) => EngineError::unknown(msg),
            IndexedDbError::Js(msg) => EngineError::unknown(msg),
            IndexedDbError::Json(e) => EngineError::data(e.to_string()),
        }
    }
}

/// Convert a thrown JS value straight into an engine error.
pub(crate) fn js_error(val: JsValue) -> EngineError {
    IndexedDbError::from(val).into()
}
