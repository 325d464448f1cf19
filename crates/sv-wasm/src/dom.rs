//! DOM implementation of the overlay's page host.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement, Window};

use sv_core::overlay::{PageHost, Toast};
use sv_core::types::{Z_INDEX_INDICATOR, Z_INDEX_PANEL, Z_INDEX_TOAST};

pub const PANEL_CLASS: &str = "splitview-panel";
pub const RESIZER_CLASS: &str = "splitview-resizer";
pub const CLOSE_BUTTON_CLASS: &str = "splitview-close-btn";
const INDICATOR_CLASS: &str = "splitview-active-indicator";
const CONTENT_CLASS: &str = "splitview-content-wrapper";
const FRAME_CLASS: &str = "splitview-iframe";
const BODY_ACTIVE_CLASS: &str = "splitview-active";

const FRAME_PERMISSIONS: &str =
    "camera; clipboard-write; fullscreen; microphone; geolocation; autoplay; encrypted-media;";

const FONT_STACK: &str = "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif";

struct PanelUi {
    indicator: HtmlElement,
    panel: HtmlElement,
    resizer: HtmlElement,
    frame: HtmlIFrameElement,
}

/// [`PageHost`] over the live document.
pub struct DomHost {
    window: Window,
    document: Document,
    ui: RefCell<Option<PanelUi>>,
}

impl DomHost {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
        Ok(Self {
            window,
            document,
            ui: RefCell::new(None),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn create(&self, tag: &str, class: &str) -> Result<HtmlElement, JsValue> {
        let element = self.document.create_element(tag)?;
        element.set_class_name(class);
        element.dyn_into::<HtmlElement>().map_err(JsValue::from)
    }

    fn build_panel(&self, width: u32) -> Result<PanelUi, JsValue> {
        let body = self.document.body().ok_or_else(|| JsValue::from_str("No body"))?;

        let indicator = self.create("div", INDICATOR_CLASS)?;
        indicator.style().set_property("z-index", &Z_INDEX_INDICATOR.to_string())?;
        indicator.style().set_property("display", "none")?;
        body.append_child(&indicator)?;

        let panel = self.create("div", PANEL_CLASS)?;
        panel.style().set_property("width", &format!("{width}px"))?;
        panel.style().set_property("display", "none")?;
        panel.style().set_property("z-index", &Z_INDEX_PANEL.to_string())?;

        let resizer = self.create("div", RESIZER_CLASS)?;
        panel.append_child(&resizer)?;

        let content = self.create("div", CONTENT_CLASS)?;

        let close = self.create("button", CLOSE_BUTTON_CLASS)?;
        close.set_text_content(Some("✕"));
        close.set_title("Close panel (split view stays active)");
        content.append_child(&close)?;

        let frame = self
            .document
            .create_element("iframe")?
            .dyn_into::<HtmlIFrameElement>()
            .map_err(JsValue::from)?;
        frame.set_class_name(FRAME_CLASS);
        frame.set_attribute("allow", FRAME_PERMISSIONS)?;
        content.append_child(&frame)?;

        panel.append_child(&content)?;
        body.append_child(&panel)?;

        Ok(PanelUi { indicator, panel, resizer, frame })
    }

    fn with_ui(&self, f: impl FnOnce(&PanelUi) -> Result<(), JsValue>) {
        if let Some(ui) = self.ui.borrow().as_ref() {
            if let Err(e) = f(ui) {
                log::warn!("DOM update failed: {:?}", e);
            }
        }
    }

    fn root(&self) -> Option<HtmlElement> {
        self.document
            .document_element()
            .and_then(|element| element.dyn_into::<HtmlElement>().ok())
    }

    fn build_toast(&self, toast: &Toast, panel_width: u32) -> Result<HtmlElement, JsValue> {
        let element = self.create("div", "splitview-toast")?;

        match toast.subtitle() {
            Some(subtitle) => {
                let wrapper = self.create("div", "")?;
                wrapper.style().set_css_text("display:flex;align-items:center;gap:10px");

                let check = self.create("span", "")?;
                check.style().set_property("font-size", "20px")?;
                check.set_text_content(Some("✓"));
                wrapper.append_child(&check)?;

                let text = self.create("div", "")?;
                let title = self.create("div", "")?;
                title.style().set_property("font-weight", "600")?;
                title.set_text_content(Some(toast.title()));
                text.append_child(&title)?;

                let detail = self.create("div", "")?;
                detail.style().set_css_text("font-size:12px;opacity:0.9");
                detail.set_text_content(Some(subtitle));
                text.append_child(&detail)?;

                wrapper.append_child(&text)?;
                element.append_child(&wrapper)?;
                element.style().set_css_text(&format!(
                    "position:fixed;bottom:20px;right:{right}px;background:#5c2d91;color:white;\
                     padding:16px 20px;border-radius:10px;font-family:{FONT_STACK};font-size:14px;\
                     z-index:{Z_INDEX_TOAST};box-shadow:0 4px 12px rgba(0,0,0,0.3);\
                     animation:splitview-slide-in 0.3s ease;max-width:300px;pointer-events:none;",
                    right = panel_width + 20,
                ));
            }
            None => {
                element.set_text_content(Some(toast.title()));
                element.style().set_css_text(&format!(
                    "position:fixed;bottom:20px;left:50%;transform:translateX(-50%);background:#333;\
                     color:white;padding:12px 24px;border-radius:8px;font-family:{FONT_STACK};\
                     font-size:14px;z-index:{Z_INDEX_TOAST};box-shadow:0 4px 12px rgba(0,0,0,0.3);\
                     animation:splitview-fade-in-out 3s ease-in-out;pointer-events:none;",
                ));
            }
        }
        Ok(element)
    }
}

impl PageHost for DomHost {
    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn scroll_y(&self) -> i32 {
        self.window.scroll_y().map(|y| y.round() as i32).unwrap_or(0)
    }

    fn scroll_to(&self, y: i32) {
        let window = self.window.clone();
        let callback = Closure::once_into_js(move || window.scroll_to_with_x_and_y(0.0, f64::from(y)));
        if let Err(e) = self.window.request_animation_frame(callback.unchecked_ref()) {
            log::warn!("Failed to schedule scroll restore: {:?}", e);
        }
    }

    fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or(0.0)
    }

    fn reload(&self) {
        if let Err(e) = self.window.location().reload() {
            log::error!("Failed to reload page: {:?}", e);
        }
    }

    fn create_panel(&self, width: u32) {
        if self.ui.borrow().is_some() {
            return;
        }
        match self.build_panel(width) {
            Ok(ui) => *self.ui.borrow_mut() = Some(ui),
            Err(e) => log::error!("Failed to create panel: {:?}", e),
        }
    }

    fn set_indicator_visible(&self, visible: bool) {
        self.with_ui(|ui| {
            ui.indicator
                .style()
                .set_property("display", if visible { "block" } else { "none" })
        });
        if let Some(body) = self.document.body() {
            let result = if visible {
                body.class_list().add_1(BODY_ACTIVE_CLASS)
            } else {
                body.class_list().remove_1(BODY_ACTIVE_CLASS)
            };
            if let Err(e) = result {
                log::warn!("Failed to update body class: {:?}", e);
            }
        }
    }

    fn set_panel_visible(&self, visible: bool) {
        self.with_ui(|ui| {
            ui.panel
                .style()
                .set_property("display", if visible { "flex" } else { "none" })
        });
    }

    fn set_panel_width(&self, width: u32) {
        self.with_ui(|ui| ui.panel.style().set_property("width", &format!("{width}px")));
    }

    fn set_frame_src(&self, url: &str) {
        self.with_ui(|ui| {
            ui.frame.set_src(url);
            Ok(())
        });
    }

    fn push_page(&self, width: u32) {
        // Width on <html> reflows everything, not just the body margin.
        let Some(root) = self.root() else { return };
        let style = root.style();
        let result = style
            .set_property_with_priority("width", &format!("calc(100% - {width}px)"), "important")
            .and_then(|_| style.set_property_with_priority("overflow-x", "hidden", "important"));
        if let Err(e) = result {
            log::warn!("Failed to push page: {:?}", e);
        }
    }

    fn unpush_page(&self) {
        let Some(root) = self.root() else { return };
        let style = root.style();
        let _ = style.remove_property("width");
        let _ = style.remove_property("overflow-x");
    }

    fn set_dragging(&self, dragging: bool) {
        self.with_ui(|ui| {
            if dragging {
                ui.resizer.class_list().add_1("dragging")?;
                ui.frame.style().set_property("pointer-events", "none")?;
            } else {
                ui.resizer.class_list().remove_1("dragging")?;
                ui.frame.style().remove_property("pointer-events")?;
            }
            Ok(())
        });

        let Some(body) = self.document.body() else { return };
        let style = body.style();
        let result = if dragging {
            style
                .set_property_with_priority("user-select", "none", "important")
                .and_then(|_| style.set_property_with_priority("cursor", "col-resize", "important"))
        } else {
            style
                .remove_property("user-select")
                .and_then(|_| style.remove_property("cursor"))
                .map(|_| ())
        };
        if let Err(e) = result {
            log::warn!("Failed to update drag styles: {:?}", e);
        }
    }

    fn show_toast(&self, toast: &Toast, panel_width: u32) {
        let Some(body) = self.document.body() else { return };
        let element = match self.build_toast(toast, panel_width) {
            Ok(element) => element,
            Err(e) => {
                log::warn!("Failed to build toast: {:?}", e);
                return;
            }
        };
        if body.append_child(&element).is_err() {
            return;
        }

        let element: Element = element.into();
        let remove = Closure::once_into_js(move || element.remove());
        let _ = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(remove.unchecked_ref(), toast.duration_ms() as i32);
    }
}

impl DomHost {
    /// Is `target` inside the panel's close button?
    pub fn is_close_button(target: &Element) -> bool {
        matches!(target.closest(&format!(".{CLOSE_BUTTON_CLASS}")), Ok(Some(_)))
    }

    pub fn is_resizer(target: &Element) -> bool {
        matches!(target.closest(&format!(".{RESIZER_CLASS}")), Ok(Some(_)))
    }
}
