//! WebAssembly bindings for SplitView
//!
//! Two entry points for the extension's JS shims:
//!
//! - [`Background`] runs in the service worker and owns per-tab bypass rules.
//! - [`ContentScript`] runs in every page and owns that page's overlay.

use std::sync::Once;

use wasm_bindgen::prelude::*;

use sv_core::{PageKey, SessionRule, TabId};

mod background;
mod chrome;
mod content;
mod dom;

pub use background::Background;
pub use content::ContentScript;

static LOGGER: Once = Once::new();

/// Install the panic hook and console logger. Later calls only adjust the level.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(verbose: bool) {
    let level = if verbose { log::Level::Debug } else { log::Level::Warn };
    LOGGER.call_once(|| {
        console_error_panic_hook::set_once();
        // Only SplitView's own crates (sv_core, sv_wasm) reach the console.
        wasm_logger::init(wasm_logger::Config::new(level).module_prefix("sv_"));
    });
    log::set_max_level(level.to_level_filter());
}

#[wasm_bindgen(js_name = pageKey)]
pub fn page_key_js(url: &str) -> Option<String> {
    PageKey::parse(url).ok().map(|key| key.as_str().to_string())
}

/// The session rule a tab gets when its bypass is enabled.
#[wasm_bindgen(js_name = bypassRule)]
pub fn bypass_rule_js(tab_id: i32) -> Result<JsValue, JsValue> {
    let tab = TabId::new(tab_id).ok_or_else(|| JsValue::from_str(&format!("Invalid tab id: {}", tab_id)))?;
    chrome::to_js(&SessionRule::bypass_for(tab)).map_err(|e| JsValue::from_str(&e))
}
