//! Background (service worker) side: the Rule Controller and its message bridge.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use sv_core::{BypassRequest, RuleController, TabId};

use crate::chrome::{from_js, to_js, ChromeSessionRules};

/// Rule Controller bound to the browser's session rules.
///
/// The JS shim forwards `chrome.runtime.onMessage` and `chrome.tabs.onRemoved`
/// here; one instance lives for the life of the service worker.
#[wasm_bindgen]
pub struct Background {
    controller: Rc<RuleController<ChromeSessionRules>>,
}

#[wasm_bindgen]
impl Background {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Background {
        Background {
            controller: Rc::new(RuleController::new(ChromeSessionRules)),
        }
    }

    /// Handle a runtime message. Returns a promise of the reply for bypass
    /// requests and `undefined` for anything else, so the shim knows whether
    /// to keep the response channel open.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue, sender_tab_id: Option<i32>) -> JsValue {
        let Some(request) = from_js(&message).ok().and_then(BypassRequest::from_message) else {
            return JsValue::UNDEFINED;
        };
        let controller = self.controller.clone();
        let sender = TabId::from_raw(sender_tab_id);

        future_to_promise(async move {
            let reply = controller.handle_message(request, sender).await;
            to_js(&reply).map_err(|e| JsValue::from_str(&e))
        })
        .into()
    }

    #[wasm_bindgen(js_name = onTabRemoved)]
    pub fn on_tab_removed(&self, tab_id: i32) -> js_sys::Promise {
        let controller = self.controller.clone();
        future_to_promise(async move {
            if let Some(tab) = TabId::new(tab_id) {
                controller.on_tab_removed(tab).await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = activeTabs)]
    pub fn active_tabs(&self) -> Vec<i32> {
        self.controller.active_tabs().into_iter().map(TabId::get).collect()
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}
