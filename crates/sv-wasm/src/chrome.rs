//! Extension API imports and the platform capabilities built on them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use sv_core::rules::{RuleError, RuleUpdate, SessionRules};
use sv_core::store::{Items, Store, StoreError};
use sv_core::{BypassClient, BypassError, BypassReply, BypassRequest};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    fn storage_get(keys: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn storage_set(items: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = remove)]
    fn storage_remove(keys: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    fn runtime_send_message(message: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "declarativeNetRequest"], js_name = updateSessionRules)]
    fn update_session_rules(options: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

/// Best-effort message for a thrown JS value (`chrome.runtime.lastError`
/// surfaces as a rejected promise with an `Error`).
pub(crate) fn describe(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    let text = serde_json::to_string(value).map_err(|e| e.to_string())?;
    js_sys::JSON::parse(&text).map_err(|e| describe(&e))
}

pub(crate) fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, String> {
    if value.is_undefined() {
        return Err("undefined value".to_string());
    }
    let text = js_sys::JSON::stringify(value).map_err(|e| describe(&e))?;
    let text = text.as_string().ok_or_else(|| "value is not JSON-serializable".to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

async fn settle(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, String> {
    let promise = promise.map_err(|e| describe(&e))?;
    JsFuture::from(promise).await.map_err(|e| describe(&e))
}

// =============================================================================
// chrome.storage.local
// =============================================================================

/// [`Store`] over `chrome.storage.local`.
pub struct ChromeStore;

#[async_trait(?Send)]
impl Store for ChromeStore {
    async fn get(&self, keys: &[&str]) -> Result<Items, StoreError> {
        let keys = to_js(keys).map_err(StoreError::Backend)?;
        let result = settle(storage_get(&keys)).await.map_err(StoreError::Backend)?;
        from_js(&result).map_err(StoreError::Backend)
    }

    async fn set(&self, items: Items) -> Result<(), StoreError> {
        let items = to_js(&items).map_err(StoreError::Backend)?;
        settle(storage_set(&items)).await.map_err(StoreError::Backend)?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let keys = to_js(keys).map_err(StoreError::Backend)?;
        settle(storage_remove(&keys)).await.map_err(StoreError::Backend)?;
        Ok(())
    }
}

// =============================================================================
// chrome.runtime messaging
// =============================================================================

/// [`BypassClient`] that messages the background context. The background
/// derives the tab from the sender, so requests carry no identity.
pub struct RuntimeBypassClient;

#[async_trait(?Send)]
impl BypassClient for RuntimeBypassClient {
    async fn send(&self, request: BypassRequest) -> Result<BypassReply, BypassError> {
        let message = to_js(&request).map_err(BypassError::Transport)?;
        let response = settle(runtime_send_message(&message)).await.map_err(BypassError::Transport)?;
        if response.is_undefined() || response.is_null() {
            return Err(BypassError::Transport("No response from background".to_string()));
        }
        from_js(&response).map_err(BypassError::Transport)
    }
}

// =============================================================================
// chrome.declarativeNetRequest
// =============================================================================

/// [`SessionRules`] over `chrome.declarativeNetRequest.updateSessionRules`.
pub struct ChromeSessionRules;

#[async_trait(?Send)]
impl SessionRules for ChromeSessionRules {
    async fn update(&self, update: RuleUpdate) -> Result<(), RuleError> {
        let options = to_js(&update).map_err(RuleError::Backend)?;
        settle(update_session_rules(&options)).await.map_err(RuleError::Backend)?;
        Ok(())
    }
}
