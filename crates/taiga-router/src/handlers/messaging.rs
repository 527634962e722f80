//! Agent-to-agent messaging handlers.
//!
//! Recipients resolve either by explicit id or by role lookup through the
//! message bus; the message type is validated against the closed set before
//! anything is delivered.

use taiga_core::context::ActionContext;
use taiga_core::types::{Action, ActionResult, AgentMessage, MessageType};

use crate::capability::MessageBus;
use crate::router::ActionRouter;

impl ActionRouter {
    async fn resolve_recipient(
        bus: &dyn MessageBus,
        action: &Action,
    ) -> Result<String, String> {
        if let Some(id) = action.to_agent_id.as_deref() {
            if !id.trim().is_empty() {
                return Ok(id.to_string());
            }
        }
        let Some(role) = action.to_role.as_deref() else {
            return Err("no recipient: provide to_agent_id or to_role".to_string());
        };
        match bus.resolve_role(role).await {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(format!("no agent registered for role \"{role}\"")),
            Err(e) => Err(e.to_string()),
        }
    }

    pub(crate) async fn handle_send_message(
        &self,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(bus) = &self.message_bus else {
            return self.missing_capability(action, "MessageBus").await;
        };

        let raw_type = action.message_type.as_deref().unwrap_or("");
        let message_type: MessageType = match raw_type.parse() {
            Ok(t) => t,
            Err(message) => return ActionResult::error(action.kind(), message),
        };

        let to_agent_id = match Self::resolve_recipient(bus.as_ref(), action).await {
            Ok(id) => id,
            Err(message) => return ActionResult::error(action.kind(), message),
        };

        let message = AgentMessage {
            from_agent_id: actx.agent_id.clone(),
            to_agent_id: to_agent_id.clone(),
            message_type,
            body: action.message.clone().unwrap_or_default(),
            bead_id: Some(actx.bead_id.clone()),
        };

        match bus.send(message).await {
            Ok(message_id) => ActionResult::executed(
                action.kind(),
                format!("sent {raw_type} message to {to_agent_id}"),
            )
            .with("message_id", message_id)
            .with("to_agent_id", to_agent_id),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    /// `delegate_task` is a typed send: always a delegation message, body is
    /// the task description.
    pub(crate) async fn handle_delegate(
        &self,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(bus) = &self.message_bus else {
            return self.missing_capability(action, "MessageBus").await;
        };

        let to_agent_id = match Self::resolve_recipient(bus.as_ref(), action).await {
            Ok(id) => id,
            Err(message) => return ActionResult::error(action.kind(), message),
        };

        let message = AgentMessage {
            from_agent_id: actx.agent_id.clone(),
            to_agent_id: to_agent_id.clone(),
            message_type: MessageType::Delegation,
            body: action.description.clone().unwrap_or_default(),
            bead_id: Some(actx.bead_id.clone()),
        };

        match bus.send(message).await {
            Ok(message_id) => ActionResult::executed(
                action.kind(),
                format!("delegated task to {to_agent_id}"),
            )
            .with("message_id", message_id)
            .with("to_agent_id", to_agent_id),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }
}
