use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ProjectId
// ---------------------------------------------------------------------------

/// Typed project identifier.
///
/// Every project binds a working tree and a key directory; git operations are
/// routed through a per-project adapter keyed by this id. The newtype keeps
/// project ids from being confused with bead or agent ids at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ActionContext
// ---------------------------------------------------------------------------

/// Ambient per-turn identity, supplied by the transport boundary and
/// propagated unchanged through the action loop.
///
/// Passed explicitly to every handler — there is no task-local fallback, and
/// a missing `project_id` is an error for project-scoped operations, never a
/// silent default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub agent_id: String,
    pub bead_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub project_id: Option<ProjectId>,
}

impl ActionContext {
    pub fn new(agent_id: impl Into<String>, bead_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            bead_id: bead_id.into(),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<ProjectId>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
