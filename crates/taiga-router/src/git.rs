//! Per-project git operation surface.
//!
//! One [`GitOperator`] is bound to one project's working tree and key
//! directory. Handlers never hold an operator across turns — they resolve it
//! from ambient context through the [`crate::git_router::ProjectGitRouter`]
//! on every git action.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::CapResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Branch information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub is_head: bool,
    pub is_remote: bool,
}

/// Commit information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub oid: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
}

/// Per-file change status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Untracked,
}

/// One changed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub status: DiffStatus,
    pub additions: u32,
    pub deletions: u32,
}

/// `git status` summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitStatusSummary {
    pub branch: String,
    pub clean: bool,
    pub entries: Vec<DiffEntry>,
}

/// Successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub commit_sha: String,
    pub message: String,
}

/// Merge result, including the conflict file list when the merge stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub merged: bool,
    pub fast_forward: bool,
    pub conflicts: Vec<String>,
    pub output: String,
}

/// Pull-request creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

/// Pull-request creation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrOutcome {
    pub url: String,
    pub output: String,
}

// ---------------------------------------------------------------------------
// GitOperator
// ---------------------------------------------------------------------------

/// The git operation surface for one project.
///
/// Implementations must be safe for concurrent use — multiple agents on the
/// same project share one operator instance through the router cache.
#[async_trait]
pub trait GitOperator: Send + Sync {
    async fn status(&self) -> CapResult<GitStatusSummary>;
    /// Unified diff of the working tree, optionally limited to one path.
    async fn diff(&self, path: Option<&str>) -> CapResult<String>;
    async fn create_branch(&self, name: &str) -> CapResult<()>;
    async fn commit(&self, message: &str) -> CapResult<CommitOutcome>;
    /// Returns the push output.
    async fn push(&self, branch: Option<&str>) -> CapResult<String>;
    async fn checkout(&self, branch: &str, create: bool) -> CapResult<()>;
    async fn merge(&self, branch: &str, no_ff: bool) -> CapResult<MergeOutcome>;
    /// Revert one or more commits, newest first. Returns the output.
    async fn revert(&self, shas: &[String]) -> CapResult<String>;
    async fn delete_branch(&self, branch: &str, remote: bool) -> CapResult<()>;
    async fn log(&self, max_count: usize) -> CapResult<Vec<CommitInfo>>;
    /// Returns the fetch output.
    async fn fetch(&self, remote: Option<&str>) -> CapResult<String>;
    async fn list_branches(&self) -> CapResult<Vec<BranchInfo>>;
    async fn diff_branches(&self, base: &str, head: &str) -> CapResult<Vec<DiffEntry>>;
    /// Commits whose messages carry the bead marker (`[bead:<id>]`).
    async fn bead_commits(&self, bead_id: &str) -> CapResult<Vec<CommitInfo>>;
    async fn create_pr(&self, request: PrRequest) -> CapResult<PrOutcome>;
}

impl std::fmt::Debug for dyn GitOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn GitOperator")
    }
}
