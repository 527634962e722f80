//! Git handlers: resolve the per-project adapter, run one operation, erase
//! the typed outcome into result metadata.

use std::sync::Arc;

use taiga_core::context::ActionContext;
use taiga_core::types::{Action, ActionKind, ActionResult};

use crate::git::{GitOperator, PrRequest};
use crate::router::ActionRouter;

/// Default commit window for `git_log` when the action carries no count.
const DEFAULT_LOG_COUNT: usize = 20;

impl ActionRouter {
    pub(crate) async fn handle_git(
        &self,
        kind: ActionKind,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(router) = &self.git else {
            return self.missing_capability(action, "GitOperator").await;
        };
        let op: Arc<dyn GitOperator> = match router.resolve(actx) {
            Ok(op) => op,
            Err(e) => return ActionResult::error(kind, e.to_string()),
        };

        match kind {
            ActionKind::GitStatus => match op.status().await {
                Ok(summary) => {
                    let message = if summary.clean {
                        format!("working tree clean on {}", summary.branch)
                    } else {
                        format!("{} changed files on {}", summary.entries.len(), summary.branch)
                    };
                    ActionResult::executed(kind, message).with_outcome(summary)
                }
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::GitDiff => match op.diff(action.path.as_deref()).await {
                Ok(diff) => {
                    let message = if diff.is_empty() {
                        "no changes".to_string()
                    } else {
                        format!("diff is {} bytes", diff.len())
                    };
                    ActionResult::executed(kind, message).with("diff", diff)
                }
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::GitCommit => {
                let message = action.message.as_deref().unwrap_or("");
                match op.commit(message).await {
                    Ok(outcome) => ActionResult::executed(
                        kind,
                        format!("committed {}", &outcome.commit_sha[..7.min(outcome.commit_sha.len())]),
                    )
                    .with_outcome(outcome),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitPush => match op.push(action.branch.as_deref()).await {
                Ok(output) => ActionResult::executed(kind, "pushed to origin").with("output", output),
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::CreatePr => {
                let request = PrRequest {
                    title: action.title.clone().unwrap_or_default(),
                    body: action.body.clone(),
                    base: action.base_branch.clone(),
                    branch: action.branch.clone(),
                    reviewers: action.reviewers.clone().unwrap_or_default(),
                    draft: action.draft.unwrap_or(false),
                };
                match op.create_pr(request).await {
                    Ok(outcome) => {
                        ActionResult::executed(kind, format!("opened PR {}", outcome.url))
                            .with_outcome(outcome)
                    }
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitMerge => {
                let branch = action.branch.as_deref().unwrap_or("");
                let no_ff = action.no_ff.unwrap_or(false);
                match op.merge(branch, no_ff).await {
                    Ok(outcome) if outcome.merged => {
                        ActionResult::executed(kind, format!("merged {branch}"))
                            .with_outcome(outcome)
                    }
                    Ok(outcome) => ActionResult::error(
                        kind,
                        format!(
                            "merge of {branch} stopped with {} conflicted files",
                            outcome.conflicts.len()
                        ),
                    )
                    .with_outcome(outcome),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitRevert => {
                let shas: Vec<String> = match (&action.sha, &action.shas) {
                    (_, Some(list)) if !list.is_empty() => list.clone(),
                    (Some(one), _) => vec![one.clone()],
                    _ => Vec::new(),
                };
                match op.revert(&shas).await {
                    Ok(output) => ActionResult::executed(
                        kind,
                        format!("reverted {} commit(s)", shas.len()),
                    )
                    .with("shas", shas)
                    .with("output", output),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::BranchDelete => {
                let branch = action.branch.as_deref().unwrap_or("");
                let remote = action.delete_remote.unwrap_or(false);
                match op.delete_branch(branch, remote).await {
                    Ok(()) => ActionResult::executed(kind, format!("deleted branch {branch}"))
                        .with("branch", branch)
                        .with("remote_deleted", remote),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitCheckout => {
                let branch = action.branch.as_deref().unwrap_or("");
                let create = action.create.unwrap_or(false);
                match op.checkout(branch, create).await {
                    Ok(()) => ActionResult::executed(kind, format!("checked out {branch}"))
                        .with("branch", branch)
                        .with("created", create),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitLog => {
                let count = action.max_count.map(|c| c as usize).unwrap_or(DEFAULT_LOG_COUNT);
                match op.log(count).await {
                    Ok(commits) => {
                        ActionResult::executed(kind, format!("{} commits", commits.len()))
                            .with("count", commits.len())
                            .with("commits", commits)
                    }
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::GitFetch => match op.fetch(action.remote.as_deref()).await {
                Ok(output) => ActionResult::executed(kind, "fetched").with("output", output),
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::ListBranches => match op.list_branches().await {
                Ok(branches) => {
                    ActionResult::executed(kind, format!("{} branches", branches.len()))
                        .with("count", branches.len())
                        .with("branches", branches)
                }
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::DiffBranches => {
                let base = action.base_branch.as_deref().unwrap_or("");
                let head = action.branch.as_deref().unwrap_or("");
                match op.diff_branches(base, head).await {
                    Ok(entries) => ActionResult::executed(
                        kind,
                        format!("{} files differ between {base} and {head}", entries.len()),
                    )
                    .with("base", base)
                    .with("head", head)
                    .with("count", entries.len())
                    .with("entries", entries),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::BeadCommits => {
                let bead_id = action.bead_id.as_deref().unwrap_or(&actx.bead_id);
                match op.bead_commits(bead_id).await {
                    Ok(commits) => ActionResult::executed(
                        kind,
                        format!("{} commits for bead {bead_id}", commits.len()),
                    )
                    .with("bead_id", bead_id)
                    .with("count", commits.len())
                    .with("commits", commits),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            // The dispatcher only routes git kinds here.
            other => ActionResult::error(other, "not a git action"),
        }
    }
}
