//! Recording page host for tests and offline simulation.

use std::cell::{Cell, RefCell};

use crate::overlay::{PageHost, Toast};

/// Something the overlay did to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ScrollTo(i32),
    Reload,
    CreatePanel { width: u32 },
    Indicator(bool),
    Panel(bool),
    PanelWidth(u32),
    FrameSrc(String),
    PushPage(u32),
    UnpushPage,
    Dragging(bool),
    Toast(Toast),
}

/// [`PageHost`] that keeps the resulting page state and an event log.
#[derive(Debug)]
pub struct RecordingHost {
    location: String,
    scroll_y: Cell<i32>,
    viewport_width: Cell<f64>,
    reloads: Cell<usize>,
    events: RefCell<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            scroll_y: Cell::new(0),
            viewport_width: Cell::new(1280.0),
            reloads: Cell::new(0),
            events: RefCell::new(Vec::new()),
        }
    }

    pub fn set_scroll_y(&self, y: i32) {
        self.scroll_y.set(y);
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.viewport_width.set(width);
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    fn record(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }

    fn last<T>(&self, pick: impl Fn(&HostEvent) -> Option<T>) -> Option<T> {
        self.events.borrow().iter().rev().find_map(pick)
    }

    /// Reloads requested so far; not affected by draining the event log.
    pub fn reloads(&self) -> usize {
        self.reloads.get()
    }

    pub fn panel_created(&self) -> bool {
        self.last(|e| matches!(e, HostEvent::CreatePanel { .. }).then_some(())).is_some()
    }

    pub fn panel_visible(&self) -> bool {
        self.last(|e| match e {
            HostEvent::Panel(visible) => Some(*visible),
            _ => None,
        })
        .unwrap_or(false)
    }

    pub fn indicator_visible(&self) -> bool {
        self.last(|e| match e {
            HostEvent::Indicator(visible) => Some(*visible),
            _ => None,
        })
        .unwrap_or(false)
    }

    pub fn panel_width(&self) -> u32 {
        self.last(|e| match e {
            HostEvent::PanelWidth(width) | HostEvent::CreatePanel { width } => Some(*width),
            _ => None,
        })
        .unwrap_or(0)
    }

    pub fn frame_src(&self) -> String {
        self.last(|e| match e {
            HostEvent::FrameSrc(src) => Some(src.clone()),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Width the page is currently pushed by, if pushed.
    pub fn pushed_width(&self) -> Option<u32> {
        self.last(|e| match e {
            HostEvent::PushPage(width) => Some(Some(*width)),
            HostEvent::UnpushPage => Some(None),
            _ => None,
        })
        .flatten()
    }

    pub fn dragging(&self) -> bool {
        self.last(|e| match e {
            HostEvent::Dragging(dragging) => Some(*dragging),
            _ => None,
        })
        .unwrap_or(false)
    }

    pub fn scrolled_to(&self) -> Option<i32> {
        self.last(|e| match e {
            HostEvent::ScrollTo(y) => Some(*y),
            _ => None,
        })
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Toast(toast) => Some(toast.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PageHost for RecordingHost {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn scroll_y(&self) -> i32 {
        self.scroll_y.get()
    }

    fn scroll_to(&self, y: i32) {
        self.scroll_y.set(y);
        self.record(HostEvent::ScrollTo(y));
    }

    fn viewport_width(&self) -> f64 {
        self.viewport_width.get()
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
        self.record(HostEvent::Reload);
    }

    fn create_panel(&self, width: u32) {
        self.record(HostEvent::CreatePanel { width });
    }

    fn set_indicator_visible(&self, visible: bool) {
        self.record(HostEvent::Indicator(visible));
    }

    fn set_panel_visible(&self, visible: bool) {
        self.record(HostEvent::Panel(visible));
    }

    fn set_panel_width(&self, width: u32) {
        self.record(HostEvent::PanelWidth(width));
    }

    fn set_frame_src(&self, url: &str) {
        self.record(HostEvent::FrameSrc(url.to_string()));
    }

    fn push_page(&self, width: u32) {
        self.record(HostEvent::PushPage(width));
    }

    fn unpush_page(&self) {
        self.record(HostEvent::UnpushPage);
    }

    fn set_dragging(&self, dragging: bool) {
        self.record(HostEvent::Dragging(dragging));
    }

    fn show_toast(&self, toast: &Toast, _panel_width: u32) {
        self.record(HostEvent::Toast(toast.clone()));
    }
}
