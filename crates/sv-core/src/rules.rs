//! Per-tab header bypass rules and the Rule Controller.
//!
//! A bypass rule strips the frame-blocking response headers from document
//! requests that belong to exactly one tab. The Rule Controller is the only
//! writer of these rules; it installs them with replace semantics and removes
//! them on request or when the owning tab closes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{RequestType, TabId, BYPASS_HEADERS};

/// Error type for rule management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("No tab identifier provided")]
    MissingTab,
    #[error("Session rule update failed: {0}")]
    Backend(String),
}

// =============================================================================
// Rule Shape (matches the declarative net request session rule format)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum RuleActionType {
    ModifyHeaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum HeaderOperation {
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HeaderModification {
    pub header: String,
    pub operation: HeaderOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: RuleActionType,
    pub response_headers: Vec<HeaderModification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleCondition {
    pub resource_types: Vec<String>,
    pub tab_ids: Vec<i32>,
}

/// A session-scoped rule as handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionRule {
    pub id: i32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl SessionRule {
    /// Bypass rule for one tab: strip the frame-blocking headers from its
    /// top-level and sub-document requests.
    pub fn bypass_for(tab: TabId) -> Self {
        Self {
            id: tab.rule_id(),
            priority: 1,
            action: RuleAction {
                kind: RuleActionType::ModifyHeaders,
                response_headers: BYPASS_HEADERS
                    .iter()
                    .map(|header| HeaderModification {
                        header: (*header).to_string(),
                        operation: HeaderOperation::Remove,
                    })
                    .collect(),
            },
            condition: RuleCondition {
                resource_types: RequestType::DOCUMENT.names(),
                tab_ids: vec![tab.get()],
            },
        }
    }

    /// Does this rule apply to a request of `request_type` issued by `tab`?
    pub fn applies_to(&self, tab: TabId, request_type: RequestType) -> bool {
        let scoped_types = self
            .condition
            .resource_types
            .iter()
            .filter_map(|name| RequestType::from_resource_type(name))
            .fold(RequestType::empty(), |acc, ty| acc | ty);
        self.condition.tab_ids.contains(&tab.get()) && scoped_types.intersects(request_type)
    }

    /// Headers this rule removes, lowercased.
    pub fn removed_headers(&self) -> impl Iterator<Item = &str> {
        self.action
            .response_headers
            .iter()
            .filter(|m| m.operation == HeaderOperation::Remove)
            .map(|m| m.header.as_str())
    }
}

/// One atomic session rule update: removals are applied before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleUpdate {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_rule_ids: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_rules: Vec<SessionRule>,
}

impl RuleUpdate {
    /// Replace whatever rule the tab owns with a fresh bypass rule.
    pub fn install(tab: TabId) -> Self {
        Self {
            remove_rule_ids: vec![tab.rule_id()],
            add_rules: vec![SessionRule::bypass_for(tab)],
        }
    }

    pub fn remove(tab: TabId) -> Self {
        Self {
            remove_rule_ids: vec![tab.rule_id()],
            add_rules: Vec::new(),
        }
    }
}

// =============================================================================
// Session Rule Backend
// =============================================================================

/// Capability to modify the browser's session rule set.
#[async_trait(?Send)]
pub trait SessionRules {
    async fn update(&self, update: RuleUpdate) -> Result<(), RuleError>;
}

/// In-memory session rule set with the browser's update semantics.
#[derive(Debug, Default)]
pub struct MemorySessionRules {
    rules: RefCell<BTreeMap<i32, SessionRule>>,
    failure: RefCell<Option<String>>,
}

impl MemorySessionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following update fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.borrow_mut() = Some(message.into());
    }

    pub fn recover(&self) {
        self.failure.borrow_mut().take();
    }

    pub fn rule(&self, id: i32) -> Option<SessionRule> {
        self.rules.borrow().get(&id).cloned()
    }

    pub fn rules(&self) -> Vec<SessionRule> {
        self.rules.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.borrow().is_empty()
    }
}

#[async_trait(?Send)]
impl SessionRules for MemorySessionRules {
    async fn update(&self, update: RuleUpdate) -> Result<(), RuleError> {
        if let Some(message) = self.failure.borrow().clone() {
            return Err(RuleError::Backend(message));
        }

        let mut next = self.rules.borrow().clone();
        for id in &update.remove_rule_ids {
            next.remove(id);
        }
        for rule in update.add_rules {
            if next.contains_key(&rule.id) {
                return Err(RuleError::Backend(format!("Rule with id {} already exists", rule.id)));
            }
            next.insert(rule.id, rule);
        }

        *self.rules.borrow_mut() = next;
        Ok(())
    }
}

#[async_trait(?Send)]
impl<T: SessionRules + ?Sized> SessionRules for std::rc::Rc<T> {
    async fn update(&self, update: RuleUpdate) -> Result<(), RuleError> {
        (**self).update(update).await
    }
}

// =============================================================================
// Rule Controller
// =============================================================================

/// Owns the set of tabs that currently have a bypass rule installed.
pub struct RuleController<R> {
    rules: R,
    active_tabs: RefCell<BTreeSet<TabId>>,
}

impl<R: SessionRules> RuleController<R> {
    pub fn new(rules: R) -> Self {
        Self {
            rules,
            active_tabs: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn backend(&self) -> &R {
        &self.rules
    }

    /// Install (or replace) the bypass rule for `tab`.
    pub async fn enable_bypass(&self, tab: Option<TabId>) -> Result<(), RuleError> {
        let Some(tab) = tab else {
            log::error!("Cannot enable header bypass: no tab identifier provided");
            return Err(RuleError::MissingTab);
        };

        match self.rules.update(RuleUpdate::install(tab)).await {
            Ok(()) => {
                self.active_tabs.borrow_mut().insert(tab);
                log::debug!("Header bypass enabled for tab {tab}");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to enable header bypass for tab {tab}: {e}");
                Err(e)
            }
        }
    }

    /// Remove the bypass rule for `tab`, if any.
    ///
    /// The removal is always issued, even for tabs missing from the active
    /// set: the background context may have been restarted since the rule was
    /// installed while the session rule itself survived.
    pub async fn disable_bypass(&self, tab: Option<TabId>) -> Result<(), RuleError> {
        let Some(tab) = tab else {
            log::error!("Cannot disable header bypass: no tab identifier provided");
            return Err(RuleError::MissingTab);
        };

        match self.rules.update(RuleUpdate::remove(tab)).await {
            Ok(()) => {
                self.active_tabs.borrow_mut().remove(&tab);
                log::debug!("Header bypass disabled for tab {tab}");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to disable header bypass for tab {tab}: {e}");
                Err(e)
            }
        }
    }

    /// Tab-close hook. The only garbage collection path for abandoned rules.
    pub async fn on_tab_removed(&self, tab: TabId) {
        if self.is_active(tab) {
            // Errors are already logged; nothing else can be done for a closed tab.
            let _ = self.disable_bypass(Some(tab)).await;
        }
    }

    pub fn is_active(&self, tab: TabId) -> bool {
        self.active_tabs.borrow().contains(&tab)
    }

    pub fn active_tabs(&self) -> Vec<TabId> {
        self.active_tabs.borrow().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(raw: i32) -> TabId {
        TabId::new(raw).unwrap()
    }

    #[test]
    fn test_bypass_rule_shape() {
        let rule = SessionRule::bypass_for(tab(42));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["priority"], 1);
        assert_eq!(json["action"]["type"], "modifyHeaders");
        assert_eq!(json["action"]["responseHeaders"][0]["header"], "x-frame-options");
        assert_eq!(json["action"]["responseHeaders"][2]["operation"], "remove");
        assert_eq!(json["condition"]["resourceTypes"], serde_json::json!(["sub_frame", "main_frame"]));
        assert_eq!(json["condition"]["tabIds"], serde_json::json!([42]));
    }

    #[test]
    fn test_rule_scope() {
        let rule = SessionRule::bypass_for(tab(5));
        assert!(rule.applies_to(tab(5), RequestType::SUB_FRAME));
        assert!(rule.applies_to(tab(5), RequestType::MAIN_FRAME));
        assert!(!rule.applies_to(tab(6), RequestType::SUB_FRAME));
        assert_eq!(rule.removed_headers().collect::<Vec<_>>(), BYPASS_HEADERS.to_vec());
    }

    #[test]
    fn test_remove_update_omits_empty_additions() {
        let json = serde_json::to_value(RuleUpdate::remove(tab(9))).unwrap();
        assert_eq!(json, serde_json::json!({ "removeRuleIds": [9] }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_enable_twice_leaves_one_rule() {
        let controller = RuleController::new(MemorySessionRules::new());
        controller.enable_bypass(Some(tab(3))).await.unwrap();
        controller.enable_bypass(Some(tab(3))).await.unwrap();

        assert_eq!(controller.backend().len(), 1);
        let rule = controller.backend().rule(3).unwrap();
        assert_eq!(rule.action.response_headers.len(), 3);
        assert_eq!(controller.active_tabs(), vec![tab(3)]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_plain_add_of_existing_id_is_rejected() {
        let rules = MemorySessionRules::new();
        let add = RuleUpdate {
            remove_rule_ids: Vec::new(),
            add_rules: vec![SessionRule::bypass_for(tab(3))],
        };
        rules.update(add.clone()).await.unwrap();
        assert!(matches!(rules.update(add).await, Err(RuleError::Backend(_))));
        assert_eq!(rules.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_missing_tab_mutates_nothing() {
        let controller = RuleController::new(MemorySessionRules::new());
        assert_eq!(controller.enable_bypass(None).await, Err(RuleError::MissingTab));
        assert_eq!(controller.disable_bypass(None).await, Err(RuleError::MissingTab));
        assert!(controller.backend().is_empty());
        assert!(controller.active_tabs().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_tab_close_removes_rule() {
        let controller = RuleController::new(MemorySessionRules::new());
        controller.enable_bypass(Some(tab(1))).await.unwrap();
        controller.enable_bypass(Some(tab(2))).await.unwrap();

        controller.on_tab_removed(tab(1)).await;

        assert!(controller.backend().rule(1).is_none());
        assert!(controller.backend().rule(2).is_some());
        assert!(!controller.is_active(tab(1)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_disable_after_close_is_noop() {
        let controller = RuleController::new(MemorySessionRules::new());
        controller.enable_bypass(Some(tab(4))).await.unwrap();
        controller.on_tab_removed(tab(4)).await;

        assert_eq!(controller.disable_bypass(Some(tab(4))).await, Ok(()));
        assert!(controller.backend().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_close_of_unknown_tab_is_ignored() {
        let controller = RuleController::new(MemorySessionRules::new());
        controller.on_tab_removed(tab(8)).await;
        assert!(controller.backend().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_backend_failure_keeps_active_set_unchanged() {
        let controller = RuleController::new(MemorySessionRules::new());
        controller.backend().fail_with("quota exceeded");

        let err = controller.enable_bypass(Some(tab(5))).await.unwrap_err();
        assert_eq!(err, RuleError::Backend("quota exceeded".to_string()));
        assert!(!controller.is_active(tab(5)));

        controller.backend().recover();
        controller.enable_bypass(Some(tab(5))).await.unwrap();
        assert!(controller.is_active(tab(5)));
    }
}
