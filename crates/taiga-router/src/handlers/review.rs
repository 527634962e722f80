//! PR review handlers.
//!
//! `submit_review` and `add_pr_comment` carry small state machines: the
//! review event must be one of the closed verdict set, and an inline
//! comment is selected by the presence of both `comment_path` and
//! `comment_line`.

use taiga_core::types::{Action, ActionKind, ActionResult};

use crate::capability::ReviewEvent;
use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_pr_review(&self, kind: ActionKind, action: &Action) -> ActionResult {
        let Some(pr) = &self.pr else {
            return self.missing_capability(action, "PrReviewer").await;
        };
        let pr_number = action.pr_number.unwrap_or(0);

        match kind {
            ActionKind::FetchPr => match pr.fetch_pr(pr_number).await {
                Ok(result) => ActionResult::executed(kind, format!("fetched PR #{pr_number}"))
                    .with("pr_number", pr_number)
                    .with("pr", result),
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::ReviewCode => match pr.review_code(pr_number).await {
                Ok(result) => {
                    ActionResult::executed(kind, format!("reviewed PR #{pr_number}"))
                        .with("pr_number", pr_number)
                        .with("review", result)
                }
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::AddPrComment => {
                let body = action.comment_body.as_deref().unwrap_or("");
                let position = match (&action.comment_path, action.comment_line) {
                    (Some(path), Some(line)) => Some((path.clone(), line)),
                    _ => None,
                };
                let comment_kind = if position.is_some() { "inline" } else { "general" };
                match pr.add_comment(pr_number, body, position).await {
                    Ok(result) => ActionResult::executed(
                        kind,
                        format!("added {comment_kind} comment on PR #{pr_number}"),
                    )
                    .with("pr_number", pr_number)
                    .with("comment_kind", comment_kind)
                    .with("comment", result),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::SubmitReview => {
                let raw = action.review_event.as_deref().unwrap_or("");
                let event: ReviewEvent = match raw.parse() {
                    Ok(e) => e,
                    Err(message) => return ActionResult::error(kind, message),
                };
                match pr
                    .submit_review(pr_number, event, action.review_body.as_deref())
                    .await
                {
                    Ok(result) => ActionResult::executed(
                        kind,
                        format!("submitted {raw} review on PR #{pr_number}"),
                    )
                    .with("pr_number", pr_number)
                    .with("review_event", raw)
                    .with("review", result),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            ActionKind::RequestReview => {
                let reviewers = action.reviewers.clone().unwrap_or_default();
                match pr.request_review(pr_number, &reviewers).await {
                    Ok(result) => ActionResult::executed(
                        kind,
                        format!(
                            "requested review from {} on PR #{pr_number}",
                            reviewers.join(", ")
                        ),
                    )
                    .with("pr_number", pr_number)
                    .with("reviewers", reviewers)
                    .with("request", result),
                    Err(e) => ActionResult::error(kind, e.to_string()),
                }
            }

            other => ActionResult::error(other, "not a PR review action"),
        }
    }
}
