//! Core type definitions for SplitView
//!
//! Identifiers, bit masks and tunables shared by both controllers.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Width of a freshly created panel when no width was saved for the page.
pub const DEFAULT_PANEL_WIDTH: u32 = 450;
/// Lower bound for the panel width while resizing.
pub const MIN_PANEL_WIDTH: u32 = 200;
/// Upper bound for the panel width, as a fraction of the viewport width.
pub const MAX_PANEL_WIDTH_RATIO: f64 = 0.8;

/// Prefix for every storage key owned by SplitView.
pub const KEY_PREFIX: &str = "splitview_";

pub const TOAST_DURATION_MS: u32 = 3000;
pub const LINK_TOAST_DURATION_MS: u32 = 2000;

pub const Z_INDEX_PANEL: u32 = 2147483645;
pub const Z_INDEX_INDICATOR: u32 = 2147483646;
pub const Z_INDEX_TOAST: u32 = 2147483647;

/// Response headers removed by a bypass rule.
pub const BYPASS_HEADERS: [&str; 3] = [
    "x-frame-options",
    "content-security-policy",
    "content-security-policy-report-only",
];

// =============================================================================
// Tab Identifiers
// =============================================================================

/// Browser tab identifier.
///
/// Only positive identifiers are valid; the browser uses `-1` for requests
/// that do not belong to a tab, and `0` never names a real tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(i32);

impl TabId {
    /// Wrap a raw identifier, rejecting values that cannot name a tab.
    pub fn new(raw: i32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Same as [`TabId::new`] but accepts an absent identifier.
    pub fn from_raw(raw: Option<i32>) -> Option<Self> {
        raw.and_then(Self::new)
    }

    #[inline]
    pub fn get(self) -> i32 {
        self.0
    }

    /// Session rule identifier owned by this tab.
    ///
    /// Derived 1:1 from the tab identifier, so two live tabs can never collide
    /// and a reused tab identifier maps onto the same (already removed) slot.
    #[inline]
    pub fn rule_id(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Request Types (bit mask for rule scoping)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u8 {
        const MAIN_FRAME = 1 << 0;   // top-level document
        const SUB_FRAME = 1 << 1;    // iframe/frame

        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUB_FRAME.bits();
    }
}

impl RequestType {
    /// Browser resource type names, in the order the browser lists them.
    pub fn names(self) -> Vec<String> {
        let mut names = Vec::new();
        if self.contains(Self::SUB_FRAME) {
            names.push("sub_frame".to_string());
        }
        if self.contains(Self::MAIN_FRAME) {
            names.push("main_frame".to_string());
        }
        names
    }

    /// Parse from a browser resource type string.
    pub fn from_resource_type(s: &str) -> Option<Self> {
        match s {
            "main_frame" => Some(Self::MAIN_FRAME),
            "sub_frame" => Some(Self::SUB_FRAME),
            _ => None,
        }
    }
}

// =============================================================================
// Modifier Keys
// =============================================================================

bitflags::bitflags! {
    /// Modifier keys held during a click.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const META = 1 << 1;
        const SHIFT = 1 << 2;
        const ALT = 1 << 3;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl Modifiers {
    pub fn from_keys(ctrl: bool, meta: bool, shift: bool, alt: bool) -> Self {
        let mut mods = Self::empty();
        mods.set(Self::CTRL, ctrl);
        mods.set(Self::META, meta);
        mods.set(Self::SHIFT, shift);
        mods.set(Self::ALT, alt);
        mods
    }
}

// =============================================================================
// Overlay Configuration
// =============================================================================

/// Tunables for the overlay panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    pub default_width: u32,
    pub min_width: u32,
    pub max_width_ratio: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_PANEL_WIDTH,
            min_width: MIN_PANEL_WIDTH,
            max_width_ratio: MAX_PANEL_WIDTH_RATIO,
        }
    }
}
