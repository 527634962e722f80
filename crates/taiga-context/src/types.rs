use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use taiga_core::context::ProjectId;

// ---------------------------------------------------------------------------
// ActivityEntry
// ---------------------------------------------------------------------------

/// One line in a bead's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// SharedBeadContext
// ---------------------------------------------------------------------------

/// The shared state of one bead under collaboration.
///
/// `data_version` increases monotonically on every successful mutation
/// (join, leave, data update, activity). `activity` is a bounded ring — the
/// store drops the oldest entries past its configured capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedBeadContext {
    pub bead_id: String,
    pub project_id: ProjectId,
    pub collaborating_agents: BTreeSet<String>,
    pub shared_data: Map<String, Value>,
    pub data_version: u64,
    pub activity: VecDeque<ActivityEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SharedBeadContext {
    pub fn new(bead_id: impl Into<String>, project_id: ProjectId) -> Self {
        let now = Utc::now();
        Self {
            bead_id: bead_id.into(),
            project_id,
            collaborating_agents: BTreeSet::new(),
            shared_data: Map::new(),
            data_version: 0,
            activity: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// ContextEvent
// ---------------------------------------------------------------------------

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextEventKind {
    AgentJoined,
    AgentLeft,
    DataUpdated,
    Activity,
}

/// One change notification fanned out to subscribers.
///
/// `version` is the context's `data_version` after the mutation; a single
/// subscriber always observes strictly increasing versions (events it missed
/// while lagging are dropped, never reordered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEvent {
    pub bead_id: String,
    #[serde(rename = "event")]
    pub kind: ContextEventKind,
    pub agent_id: String,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    /// Key touched by a `data_updated` event.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
    /// New value for a `data_updated` event.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
    /// Entry appended by an `activity` event.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub activity: Option<ActivityEntry>,
}

impl ContextEvent {
    pub(crate) fn new(
        bead_id: &str,
        kind: ContextEventKind,
        agent_id: &str,
        version: u64,
    ) -> Self {
        Self {
            bead_id: bead_id.to_string(),
            kind,
            agent_id: agent_id.to_string(),
            version,
            timestamp: Utc::now(),
            key: None,
            value: None,
            activity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_serializes_with_sorted_agent_set() {
        let mut ctx = SharedBeadContext::new("bead-1", ProjectId::new("p1"));
        ctx.collaborating_agents.insert("zeta".into());
        ctx.collaborating_agents.insert("alpha".into());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["collaborating_agents"][0], "alpha");
        assert_eq!(json["collaborating_agents"][1], "zeta");
        assert_eq!(json["data_version"], 0);
    }

    #[test]
    fn event_kind_wire_spelling() {
        let e = ContextEvent::new("b", ContextEventKind::DataUpdated, "a", 3);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "data_updated");
        assert_eq!(json["version"], 3);
    }
}
