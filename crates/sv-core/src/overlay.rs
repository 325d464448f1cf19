//! The Overlay Controller: one instance per page load.
//!
//! Owns the panel's in-memory state and drives the activation handshake:
//!
//! ```text
//!   Inactive --toggle--> PendingBypass --(reload)--> [next load] --> ActiveHidden
//!                                                                     |    ^
//!                                                            open_url |    | close_panel
//!                                                                     v    |
//!                                                                  ActiveVisible
//! ```
//!
//! `PendingBypass` is terminal for an instance: the page reloads and a new
//! controller picks up from the [`ReloadMarker`] in the store. If the bypass
//! request fails the reload is abandoned and the controller falls back to
//! `Inactive`.

use std::cell::Cell;
use std::rc::Rc;

use crate::links::{self, ClickEvent, LinkDecision};
use crate::message::{BypassClient, BypassRequest};
use crate::page::{PageKey, PageKeyError};
use crate::resize::DragSession;
use crate::store::{self, ReloadMarker, Store};
use crate::types::{OverlayConfig, LINK_TOAST_DURATION_MS, TOAST_DURATION_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Inactive,
    /// Bypass requested, reload about to happen.
    PendingBypass,
    ActiveVisible,
    /// Bypass installed and page marked active, panel closed.
    ActiveHidden,
}

impl OverlayState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::ActiveVisible | Self::ActiveHidden)
    }
}

/// Transient notifications shown over the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Restored,
    LinkOpened { host: String },
    ActivationFailed,
}

impl Toast {
    pub fn title(&self) -> &str {
        match self {
            Self::Restored => "SplitView Active — Click any link",
            Self::LinkOpened { .. } => "Opened in Split View",
            Self::ActivationFailed => "SplitView could not be enabled on this page",
        }
    }

    pub fn subtitle(&self) -> Option<&str> {
        match self {
            Self::LinkOpened { host } => Some(host),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> u32 {
        match self {
            Self::LinkOpened { .. } => LINK_TOAST_DURATION_MS,
            _ => TOAST_DURATION_MS,
        }
    }
}

/// Everything the overlay does to the page hosting it.
pub trait PageHost {
    /// Current document URL.
    fn location(&self) -> String;
    fn scroll_y(&self) -> i32;
    fn scroll_to(&self, y: i32);
    fn viewport_width(&self) -> f64;
    /// Full page reload. Ends the lifetime of the calling controller.
    fn reload(&self);

    /// Build the panel, resizer, frame and edge indicator, all hidden.
    fn create_panel(&self, width: u32);
    fn set_indicator_visible(&self, visible: bool);
    fn set_panel_visible(&self, visible: bool);
    fn set_panel_width(&self, width: u32);
    /// Load `url` into the embedded frame; empty clears it.
    fn set_frame_src(&self, url: &str);

    /// Shrink the page so it sits beside a panel of `width` pixels.
    fn push_page(&self, width: u32);
    fn unpush_page(&self);

    /// Toggle resize affordances: cursor and selection suppression on the
    /// document, pointer events off on the frame.
    fn set_dragging(&self, dragging: bool);

    fn show_toast(&self, toast: &Toast, panel_width: u32);
}

impl<T: PageHost + ?Sized> PageHost for Rc<T> {
    fn location(&self) -> String {
        (**self).location()
    }
    fn scroll_y(&self) -> i32 {
        (**self).scroll_y()
    }
    fn scroll_to(&self, y: i32) {
        (**self).scroll_to(y)
    }
    fn viewport_width(&self) -> f64 {
        (**self).viewport_width()
    }
    fn reload(&self) {
        (**self).reload()
    }
    fn create_panel(&self, width: u32) {
        (**self).create_panel(width)
    }
    fn set_indicator_visible(&self, visible: bool) {
        (**self).set_indicator_visible(visible)
    }
    fn set_panel_visible(&self, visible: bool) {
        (**self).set_panel_visible(visible)
    }
    fn set_panel_width(&self, width: u32) {
        (**self).set_panel_width(width)
    }
    fn set_frame_src(&self, url: &str) {
        (**self).set_frame_src(url)
    }
    fn push_page(&self, width: u32) {
        (**self).push_page(width)
    }
    fn unpush_page(&self) {
        (**self).unpush_page()
    }
    fn set_dragging(&self, dragging: bool) {
        (**self).set_dragging(dragging)
    }
    fn show_toast(&self, toast: &Toast, panel_width: u32) {
        (**self).show_toast(toast, panel_width)
    }
}

/// Who asked for the bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    /// The user toggled the overlay on.
    Toggle,
    /// The page is marked active but this load is not the one we reloaded.
    Resume,
}

pub struct OverlayController<S, B, H> {
    config: OverlayConfig,
    page_key: PageKey,
    store: S,
    bypass: B,
    host: H,
    state: Cell<OverlayState>,
    panel_width: Cell<u32>,
    ui_created: Cell<bool>,
    drag: Cell<Option<DragSession>>,
}

impl<S: Store, B: BypassClient, H: PageHost> OverlayController<S, B, H> {
    pub fn new(config: OverlayConfig, store: S, bypass: B, host: H) -> Result<Self, PageKeyError> {
        let page_key = PageKey::parse(&host.location())?;
        Ok(Self {
            panel_width: Cell::new(config.default_width),
            config,
            page_key,
            store,
            bypass,
            host,
            state: Cell::new(OverlayState::Inactive),
            ui_created: Cell::new(false),
            drag: Cell::new(None),
        })
    }

    pub fn state(&self) -> OverlayState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get().is_active()
    }

    pub fn page_key(&self) -> &PageKey {
        &self.page_key
    }

    pub fn panel_width(&self) -> u32 {
        self.panel_width.get()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    // ===== Page load =====

    /// Decide how this page load starts. Creates no UI unless the page is
    /// marked active.
    pub async fn initialize(&self) -> OverlayState {
        if self.state.get() != OverlayState::Inactive {
            return self.state.get();
        }

        let snapshot = match store::load_activation(&self.store, &self.page_key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Failed to load active state: {e}");
                return self.state.get();
            }
        };

        if !snapshot.page_active {
            return self.state.get();
        }

        match snapshot.marker {
            Some(marker) if marker.matches(&self.page_key) => self.restore(marker).await,
            _ => self.request_bypass_and_reload(Activation::Resume).await,
        }
        self.state.get()
    }

    /// Resume after the reload we triggered: the bypass rule is in place.
    async fn restore(&self, marker: ReloadMarker) {
        // One-shot: gone before anything else can observe it.
        if let Err(e) = store::clear_marker(&self.store).await {
            log::error!("Failed to clear reload marker: {e}");
        }

        self.ensure_ui().await;
        self.state.set(OverlayState::ActiveHidden);
        self.host.set_indicator_visible(true);
        self.host.show_toast(&Toast::Restored, self.panel_width.get());
        log::debug!("Restored active state for {}", self.page_key);

        if marker.scroll_y > 0 {
            self.host.scroll_to(marker.scroll_y);
            if let Err(e) = store::clear_scroll(&self.store).await {
                log::error!("Failed to clear saved scroll offset: {e}");
            }
        }
    }

    // ===== Activate / Deactivate =====

    pub async fn toggle(&self) {
        match self.state.get() {
            OverlayState::Inactive => self.activate().await,
            OverlayState::ActiveVisible | OverlayState::ActiveHidden => self.deactivate().await,
            OverlayState::PendingBypass => log::debug!("Toggle ignored: reload already pending"),
        }
    }

    pub async fn activate(&self) {
        if self.state.get() != OverlayState::Inactive {
            return;
        }
        self.state.set(OverlayState::PendingBypass);
        self.ensure_ui().await;
        self.host.set_indicator_visible(true);
        self.request_bypass_and_reload(Activation::Toggle).await;
    }

    async fn request_bypass_and_reload(&self, origin: Activation) {
        self.state.set(OverlayState::PendingBypass);

        let scroll_y = match origin {
            Activation::Toggle => self.host.scroll_y(),
            Activation::Resume => 0,
        };
        let marker = ReloadMarker::new(&self.page_key, scroll_y);

        let active_pages = match origin {
            Activation::Toggle => match store::load_active_pages(&self.store).await {
                Ok(mut pages) => {
                    pages.insert(self.page_key.as_str().to_string(), true);
                    Some(pages)
                }
                Err(e) => {
                    log::error!("Failed to read active pages: {e}");
                    self.abandon_activation();
                    return;
                }
            },
            Activation::Resume => None,
        };

        if let Err(e) = store::arm_reload(&self.store, &marker, active_pages.as_ref()).await {
            log::error!("Failed to save active state: {e}");
            self.abandon_activation();
            return;
        }

        match self.bypass.request(BypassRequest::ENABLE).await {
            Ok(()) => {
                log::debug!("Header bypass installed for {}, reloading", self.page_key);
                self.host.reload();
            }
            Err(e) => {
                log::error!("Failed to enable header bypass: {e}");
                if let Err(e) = store::disarm_reload(&self.store).await {
                    log::error!("Failed to clear reload marker: {e}");
                }
                if origin == Activation::Toggle {
                    if let Err(e) = store::set_page_active(&self.store, &self.page_key, false).await {
                        log::error!("Failed to clear active state: {e}");
                    }
                }
                self.abandon_activation();
            }
        }
    }

    fn abandon_activation(&self) {
        self.state.set(OverlayState::Inactive);
        if self.ui_created.get() {
            self.host.set_indicator_visible(false);
        }
        self.host.show_toast(&Toast::ActivationFailed, self.panel_width.get());
    }

    /// Turn the overlay off for this page. Takes effect without a reload.
    pub async fn deactivate(&self) {
        if !self.is_active() {
            return;
        }
        self.state.set(OverlayState::Inactive);
        if self.drag.take().is_some() {
            self.host.set_dragging(false);
        }

        self.host.set_panel_visible(false);
        self.host.set_indicator_visible(false);
        self.host.set_frame_src("");
        self.host.unpush_page();

        if let Err(e) = store::set_page_active(&self.store, &self.page_key, false).await {
            log::error!("Failed to clear active state: {e}");
        }
        if let Err(e) = self.bypass.request(BypassRequest::DISABLE).await {
            log::error!("Failed to disable header bypass: {e}");
        }
    }

    // ===== Panel =====

    async fn ensure_ui(&self) {
        if self.ui_created.replace(true) {
            return;
        }
        match store::load_width(&self.store, &self.page_key).await {
            Ok(Some(width)) => self.panel_width.set(width),
            Ok(None) => {}
            Err(e) => log::error!("Failed to load saved width: {e}"),
        }
        self.host.create_panel(self.panel_width.get());
    }

    /// Hide the panel but stay active; the next intercepted link reopens it.
    pub fn close_panel(&self) {
        if self.state.get() != OverlayState::ActiveVisible {
            return;
        }
        self.state.set(OverlayState::ActiveHidden);
        self.host.set_panel_visible(false);
        self.host.set_frame_src("");
        self.host.unpush_page();
    }

    /// Load `url` into the panel, showing it if hidden. Returns false when the
    /// overlay is not active.
    pub fn open_url(&self, url: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.state.get() == OverlayState::ActiveHidden {
            self.state.set(OverlayState::ActiveVisible);
            self.host.set_panel_visible(true);
            self.host.push_page(self.panel_width.get());
        }
        self.host.set_frame_src(url);
        true
    }

    // ===== Input =====

    /// Route a document-level click. Returns true when the caller must
    /// prevent the default action and stop propagation.
    pub fn handle_click(&self, click: &ClickEvent) -> bool {
        if !self.is_active() {
            return false;
        }
        match links::decide(click, &self.host.location()) {
            LinkDecision::Intercept(url) => {
                self.open_url(url.as_str());
                let toast = Toast::LinkOpened { host: links::display_host(url.as_str()) };
                self.host.show_toast(&toast, self.panel_width.get());
                true
            }
            LinkDecision::Skip(reason) => {
                log::trace!("Click not intercepted: {reason:?}");
                false
            }
        }
    }

    /// Returns true when the key was consumed.
    pub fn handle_key(&self, key: &str) -> bool {
        if key == "Escape" && self.state.get() == OverlayState::ActiveVisible {
            self.close_panel();
            return true;
        }
        false
    }

    // ===== Resize =====

    pub fn begin_resize(&self, pointer_x: f64) -> bool {
        if self.state.get() != OverlayState::ActiveVisible {
            return false;
        }
        self.drag.set(Some(DragSession::new(pointer_x, self.panel_width.get())));
        self.host.set_dragging(true);
        true
    }

    pub fn resize_to(&self, pointer_x: f64) {
        let Some(drag) = self.drag.get() else {
            return;
        };
        let width = drag.width_at(pointer_x, self.host.viewport_width(), &self.config);
        self.panel_width.set(width);
        self.host.set_panel_width(width);
        self.host.push_page(width);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.get().is_some()
    }

    /// Finish the drag and remember the width for this page.
    pub async fn end_resize(&self) {
        if self.drag.take().is_none() {
            return;
        }
        self.host.set_dragging(false);
        if let Err(e) = store::save_width(&self.store, &self.page_key, self.panel_width.get()).await {
            log::error!("Failed to save state: {e}");
        }
    }
}
