//! Message contract between the Overlay Controller and the Rule Controller.
//!
//! Requests never carry a tab identifier; the receiving side takes it from the
//! sender's transport context. Replies are a discriminated result so the
//! overlay can tell an installed rule from a failed one.

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::rules::{RuleController, SessionRules};
use crate::types::TabId;

/// Error type for bypass requests, as seen by the requesting side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BypassError {
    #[error("Header bypass rejected: {0}")]
    Rejected(String),
    #[error("Message transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum BypassAction {
    EnableHeaderBypass,
    DisableHeaderBypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BypassRequest {
    pub action: BypassAction,
}

impl BypassRequest {
    pub const ENABLE: Self = Self { action: BypassAction::EnableHeaderBypass };
    pub const DISABLE: Self = Self { action: BypassAction::DisableHeaderBypass };

    /// Pick bypass requests out of the runtime message stream; anything else
    /// is some other listener's message and gets no reply.
    pub fn from_message(message: serde_json::Value) -> Option<Self> {
        serde_json::from_value(message).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BypassReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
}

impl BypassReply {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }

    pub fn into_result(self) -> Result<(), BypassError> {
        if self.success {
            Ok(())
        } else {
            Err(BypassError::Rejected(self.error.unwrap_or_else(|| "unknown error".to_string())))
        }
    }
}

/// Requesting side of the message bridge.
#[async_trait(?Send)]
pub trait BypassClient {
    async fn send(&self, request: BypassRequest) -> Result<BypassReply, BypassError>;

    /// Send and collapse the reply into a result.
    async fn request(&self, request: BypassRequest) -> Result<(), BypassError> {
        self.send(request).await?.into_result()
    }
}

#[async_trait(?Send)]
impl<T: BypassClient + ?Sized> BypassClient for Rc<T> {
    async fn send(&self, request: BypassRequest) -> Result<BypassReply, BypassError> {
        (**self).send(request).await
    }
}

impl<R: SessionRules> RuleController<R> {
    /// Receiving side of the message bridge.
    pub async fn handle_message(&self, request: BypassRequest, sender: Option<TabId>) -> BypassReply {
        let result = match request.action {
            BypassAction::EnableHeaderBypass => self.enable_bypass(sender).await,
            BypassAction::DisableHeaderBypass => self.disable_bypass(sender).await,
        };
        match result {
            Ok(()) => BypassReply::ok(),
            Err(e) => BypassReply::failed(e.to_string()),
        }
    }
}

/// In-process bridge that delivers requests straight to a Rule Controller as
/// if they came from `sender`.
pub struct DirectBridge<R> {
    controller: Rc<RuleController<R>>,
    sender: Option<TabId>,
}

impl<R> DirectBridge<R> {
    pub fn new(controller: Rc<RuleController<R>>, sender: Option<TabId>) -> Self {
        Self { controller, sender }
    }
}

#[async_trait(?Send)]
impl<R: SessionRules> BypassClient for DirectBridge<R> {
    async fn send(&self, request: BypassRequest) -> Result<BypassReply, BypassError> {
        Ok(self.controller.handle_message(request, self.sender).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MemorySessionRules;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        assert_eq!(serde_json::to_value(BypassRequest::ENABLE).unwrap(), json!({ "action": "enableHeaderBypass" }));
        let parsed: BypassRequest = serde_json::from_value(json!({ "action": "disableHeaderBypass" })).unwrap();
        assert_eq!(parsed, BypassRequest::DISABLE);
    }

    #[test]
    fn test_reply_wire_format() {
        assert_eq!(serde_json::to_value(BypassReply::ok()).unwrap(), json!({ "success": true }));
        assert_eq!(
            serde_json::to_value(BypassReply::failed("boom")).unwrap(),
            json!({ "success": false, "error": "boom" })
        );
        let legacy: BypassReply = serde_json::from_value(json!({ "success": false })).unwrap();
        assert_eq!(legacy.into_result(), Err(BypassError::Rejected("unknown error".to_string())));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_bridge_uses_sender_tab() {
        let controller = Rc::new(RuleController::new(MemorySessionRules::new()));
        let bridge = DirectBridge::new(controller.clone(), TabId::new(11));

        bridge.request(BypassRequest::ENABLE).await.unwrap();
        assert!(controller.backend().rule(11).is_some());

        bridge.request(BypassRequest::DISABLE).await.unwrap();
        assert!(controller.backend().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_failure_is_reported_to_sender() {
        let controller = Rc::new(RuleController::new(MemorySessionRules::new()));
        let bridge = DirectBridge::new(controller.clone(), None);

        let reply = bridge.send(BypassRequest::ENABLE).await.unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("No tab identifier provided"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unrelated_messages_get_no_reply() {
        assert_eq!(BypassRequest::from_message(json!({ "action": "ping" })), None);
        assert_eq!(BypassRequest::from_message(json!("enableHeaderBypass")), None);

        let controller = RuleController::new(MemorySessionRules::new());
        let request = BypassRequest::from_message(json!({ "action": "enableHeaderBypass", "extra": 1 })).unwrap();
        let reply = controller.handle_message(request, TabId::new(1)).await;
        assert_eq!(reply, BypassReply::ok());
    }
}
