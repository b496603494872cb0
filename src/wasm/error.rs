//! Error types for WASM bindings

use crate::error::ModulationError;
use wasm_bindgen::prelude::*;

/// Error type for WASM bindings
#[wasm_bindgen]
#[derive(Debug)]
pub struct EngineError {
    message: String,
}

#[wasm_bindgen]
impl EngineError {
    /// Get the error message
    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.message.clone()
    }
}

impl From<ModulationError> for EngineError {
    fn from(e: ModulationError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<serde_wasm_bindgen::Error> for EngineError {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl EngineError {
    /// Convert to JsValue for use as error return
    pub fn into_js(self) -> JsValue {
        JsValue::from_str(&self.message)
    }
}
