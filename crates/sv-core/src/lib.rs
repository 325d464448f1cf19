//! SplitView Core Library
//!
//! This crate provides the activation and header-bypass coordination core for
//! the SplitView overlay: a side panel that opens hyperlinks next to the page
//! instead of navigating away, even on sites that forbid being framed.
//!
//! # Architecture
//!
//! Two controllers cooperate across a privilege boundary. The privileged
//! [`RuleController`] owns per-tab session rules that strip frame-blocking
//! response headers. The page-embedded [`OverlayController`] owns the panel,
//! intercepts link clicks and drives the activation handshake, which ends in a
//! forced reload. All state that must survive that reload goes through the
//! [`Store`] capability before the reload is issued.
//!
//! Nothing in this crate touches browser APIs directly; every platform facility
//! is a trait implemented by the wasm bindings (or by the in-memory doubles in
//! [`store`], [`rules`] and [`testing`]).
//!
//! # Modules
//!
//! - `types`: Tab identifiers, request type and modifier masks, tunables
//! - `page`: PageKey derivation
//! - `rules`: Session rule shape and the Rule Controller
//! - `message`: Overlay -> Rule Controller message contract
//! - `store`: Persistence capability, key schema and typed accessors
//! - `links`: Link click interception decisions
//! - `resize`: Panel width clamping and drag sessions
//! - `overlay`: The Overlay Controller activation state machine
//! - `testing`: Recording page host for tests and simulation

pub mod types;
pub mod page;
pub mod rules;
pub mod message;
pub mod store;
pub mod links;
pub mod resize;
pub mod overlay;
pub mod testing;

// Re-export commonly used types
pub use types::{Modifiers, OverlayConfig, RequestType, TabId};
pub use page::{PageKey, PageKeyError};
pub use rules::{MemorySessionRules, RuleController, RuleError, RuleUpdate, SessionRule, SessionRules};
pub use message::{BypassAction, BypassClient, BypassError, BypassReply, BypassRequest, DirectBridge};
pub use store::{MemoryStore, ReloadMarker, Store, StoreError};
pub use links::{ClickEvent, LinkDecision, LinkTarget, SkipReason};
pub use resize::DragSession;
pub use overlay::{OverlayController, OverlayState, PageHost, Toast};
