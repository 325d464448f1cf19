//! Content script side: owns the page's Overlay Controller and wires DOM
//! events into it.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, KeyboardEvent, MouseEvent};

use sv_core::{ClickEvent, LinkTarget, Modifiers, OverlayConfig, OverlayController, OverlayState};

use crate::chrome::{ChromeStore, RuntimeBypassClient};
use crate::dom::DomHost;

type Overlay = OverlayController<ChromeStore, RuntimeBypassClient, Rc<DomHost>>;

/// The page's overlay. The JS shim constructs exactly one per page load and
/// passes whether one already exists.
#[wasm_bindgen]
pub struct ContentScript {
    overlay: Rc<Overlay>,
}

#[wasm_bindgen]
impl ContentScript {
    #[wasm_bindgen(constructor)]
    pub fn new(already_initialized: bool) -> Result<ContentScript, JsValue> {
        if already_initialized {
            return Err(JsValue::from_str("SplitView is already running on this page"));
        }

        let host = Rc::new(DomHost::new()?);
        let overlay = OverlayController::new(OverlayConfig::default(), ChromeStore, RuntimeBypassClient, host.clone())
            .map_err(|e| JsValue::from_str(&format!("Cannot start SplitView: {}", e)))?;
        let overlay = Rc::new(overlay);

        install_listeners(&overlay, &host)?;

        let init = overlay.clone();
        spawn_local(async move {
            let state = init.initialize().await;
            log::debug!("Initialized {} as {:?}", init.page_key(), state);
        });

        Ok(ContentScript { overlay })
    }

    /// Toolbar entry point.
    pub fn toggle(&self) {
        let overlay = self.overlay.clone();
        spawn_local(async move { overlay.toggle().await });
    }

    #[wasm_bindgen(js_name = openUrl)]
    pub fn open_url(&self, url: &str) -> bool {
        self.overlay.open_url(url)
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.overlay.state() {
            OverlayState::Inactive => "inactive",
            OverlayState::PendingBypass => "pendingBypass",
            OverlayState::ActiveVisible => "activeVisible",
            OverlayState::ActiveHidden => "activeHidden",
        }
        .to_string()
    }
}

fn event_element(event: &web_sys::Event) -> Option<Element> {
    event.target().and_then(|target| target.dyn_into::<Element>().ok())
}

/// Extract what the link decision needs from a DOM click.
fn click_from_event(event: &MouseEvent, target: Option<&Element>) -> ClickEvent {
    let link = target
        .and_then(|element| element.closest("a").ok().flatten())
        .map(|anchor| LinkTarget {
            href: anchor.get_attribute("href").unwrap_or_default(),
            download: anchor.has_attribute("download"),
        });
    ClickEvent {
        default_prevented: event.default_prevented(),
        modifiers: Modifiers::from_keys(event.ctrl_key(), event.meta_key(), event.shift_key(), event.alt_key()),
        link,
    }
}

fn listen<E: FromWasmAbi + 'static>(
    target: &web_sys::EventTarget,
    kind: &str,
    handler: impl FnMut(E) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(E)>::new(handler);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    // Listeners live as long as the page.
    closure.forget();
    Ok(())
}

fn install_listeners(overlay: &Rc<Overlay>, host: &DomHost) -> Result<(), JsValue> {
    let document: &web_sys::EventTarget = host.document().as_ref();

    // Bubble phase: page handlers run first and may claim the click.
    let on_click = overlay.clone();
    listen(document, "click", move |event: MouseEvent| {
        let target = event_element(&event);
        if let Some(element) = &target {
            if DomHost::is_close_button(element) {
                on_click.close_panel();
                return;
            }
        }
        let click = click_from_event(&event, target.as_ref());
        if on_click.handle_click(&click) {
            event.prevent_default();
            event.stop_propagation();
        }
    })?;

    let on_key = overlay.clone();
    listen(document, "keydown", move |event: KeyboardEvent| {
        on_key.handle_key(&event.key());
    })?;

    let on_down = overlay.clone();
    listen(document, "mousedown", move |event: MouseEvent| {
        let on_resizer = event_element(&event).is_some_and(|element| DomHost::is_resizer(&element));
        if on_resizer && on_down.begin_resize(f64::from(event.client_x())) {
            event.prevent_default();
        }
    })?;

    let on_move = overlay.clone();
    listen(document, "mousemove", move |event: MouseEvent| {
        if on_move.is_dragging() {
            on_move.resize_to(f64::from(event.client_x()));
        }
    })?;

    let on_up = overlay.clone();
    listen(document, "mouseup", move |_event: MouseEvent| {
        if on_up.is_dragging() {
            let overlay = on_up.clone();
            spawn_local(async move { overlay.end_resize().await });
        }
    })?;

    Ok(())
}
