//! Project-scoped git adapter.
//!
//! Read operations go through libgit2 (no process spawn, structured output);
//! write operations (commit, push, merge, revert, PR creation) stay as
//! shell-outs so they behave exactly like the operator's own git, including
//! hooks and credential helpers. Each adapter binds one working tree and one
//! key directory and is safe for concurrent use — it opens the repository
//! fresh per read and serializes nothing itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use taiga_core::error::CapabilityError;

use crate::capability::CapResult;
use crate::git::{
    BranchInfo, CommitInfo, CommitOutcome, DiffEntry, DiffStatus, GitOperator, GitStatusSummary,
    MergeOutcome, PrOutcome, PrRequest,
};

fn git_err(e: git2::Error) -> CapabilityError {
    CapabilityError::Operation(e.message().to_string())
}

/// Marker the orchestrator embeds in commit messages so commits can be
/// attributed to a bead: `[bead:<id>]`.
fn bead_marker(bead_id: &str) -> String {
    format!("[bead:{bead_id}]")
}

// ---------------------------------------------------------------------------
// GitServiceAdapter
// ---------------------------------------------------------------------------

/// One project's git operator: a working tree plus an optional key
/// directory for authenticated pushes.
#[derive(Debug)]
pub struct GitServiceAdapter {
    workdir: PathBuf,
    key_dir: Option<PathBuf>,
}

impl GitServiceAdapter {
    /// Bind a working tree. Fails when the path is not inside a git
    /// repository or the key directory is missing — construction failures
    /// surface immediately and are never cached.
    pub fn new(workdir: impl Into<PathBuf>, key_dir: Option<PathBuf>) -> CapResult<Self> {
        let workdir = workdir.into();
        git2::Repository::discover(&workdir).map_err(|e| {
            CapabilityError::op(format!(
                "not a git repository: {} ({})",
                workdir.display(),
                e.message()
            ))
        })?;
        if let Some(dir) = &key_dir {
            if !dir.is_dir() {
                return Err(CapabilityError::op(format!(
                    "key directory not found: {}",
                    dir.display()
                )));
            }
        }
        Ok(Self { workdir, key_dir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // -----------------------------------------------------------------------
    // libgit2 read side (sync inner functions, one error conversion at the
    // trait boundary)
    // -----------------------------------------------------------------------

    fn open(&self) -> Result<git2::Repository, git2::Error> {
        git2::Repository::discover(&self.workdir)
    }

    fn current_branch_inner(&self) -> Result<String, git2::Error> {
        let repo = self.open()?;
        let head = repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().unwrap_or("HEAD").to_string())
        } else {
            let oid = head
                .target()
                .ok_or_else(|| git2::Error::from_str("HEAD has no target"))?;
            Ok(format!("{:.7}", oid))
        }
    }

    fn status_inner(&self) -> Result<GitStatusSummary, git2::Error> {
        let repo = self.open()?;
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut entries = Vec::with_capacity(statuses.len());
        for entry in statuses.iter() {
            let path = entry.path().unwrap_or("").to_string();
            let st = entry.status();
            let status = if st.contains(git2::Status::WT_NEW) {
                DiffStatus::Untracked
            } else if st.contains(git2::Status::INDEX_NEW) {
                DiffStatus::Added
            } else if st.contains(git2::Status::WT_DELETED)
                || st.contains(git2::Status::INDEX_DELETED)
            {
                DiffStatus::Deleted
            } else if st.contains(git2::Status::WT_RENAMED)
                || st.contains(git2::Status::INDEX_RENAMED)
            {
                DiffStatus::Renamed
            } else {
                DiffStatus::Modified
            };
            entries.push(DiffEntry {
                path,
                status,
                additions: 0,
                deletions: 0,
            });
        }

        Ok(GitStatusSummary {
            branch: self.current_branch_inner()?,
            clean: entries.is_empty(),
            entries,
        })
    }

    fn diff_inner(&self, path: Option<&str>) -> Result<String, git2::Error> {
        let repo = self.open()?;
        let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());

        let mut opts = git2::DiffOptions::new();
        if let Some(p) = path {
            opts.pathspec(p);
        }
        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        let mut text = String::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin()),
                _ => {}
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(text)
    }

    fn log_inner(&self, max_count: usize) -> Result<Vec<CommitInfo>, git2::Error> {
        let repo = self.open()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TIME)?;

        let mut commits = Vec::with_capacity(max_count);
        for oid_result in revwalk.take(max_count) {
            let oid = oid_result?;
            let commit = repo.find_commit(oid)?;
            commits.push(CommitInfo {
                oid: format!("{:.7}", oid),
                message: commit.summary().unwrap_or("").to_string(),
                author: commit.author().name().unwrap_or("").to_string(),
                timestamp: commit.time().seconds(),
            });
        }
        Ok(commits)
    }

    fn list_branches_inner(&self) -> Result<Vec<BranchInfo>, git2::Error> {
        let repo = self.open()?;
        let mut result = Vec::new();
        for branch in repo.branches(None)? {
            let (branch, branch_type) = branch?;
            let name = branch.name()?.unwrap_or("").to_string();
            result.push(BranchInfo {
                name,
                is_head: branch.is_head(),
                is_remote: branch_type == git2::BranchType::Remote,
            });
        }
        Ok(result)
    }

    fn diff_branches_inner(&self, base: &str, head: &str) -> Result<Vec<DiffEntry>, git2::Error> {
        let repo = self.open()?;
        let base_tree = repo.revparse_single(base)?.peel_to_tree()?;
        let head_tree = repo.revparse_single(head)?.peel_to_tree()?;
        let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;
        Ok(collect_entries(&diff))
    }

    fn bead_commits_inner(&self, bead_id: &str) -> Result<Vec<CommitInfo>, git2::Error> {
        let marker = bead_marker(bead_id);
        let repo = self.open()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = repo.find_commit(oid)?;
            if commit.message().unwrap_or("").contains(&marker) {
                commits.push(CommitInfo {
                    oid: format!("{:.7}", oid),
                    message: commit.summary().unwrap_or("").to_string(),
                    author: commit.author().name().unwrap_or("").to_string(),
                    timestamp: commit.time().seconds(),
                });
            }
        }
        Ok(commits)
    }

    // -----------------------------------------------------------------------
    // Shell-out plumbing (write side)
    // -----------------------------------------------------------------------

    async fn run_git(&self, args: &[&str]) -> CapResult<std::process::Output> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        if let Some(ssh) = self.ssh_command() {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }
        debug!(args = ?args, workdir = %self.workdir.display(), "git shell-out");
        Ok(cmd.output().await?)
    }

    /// Per-project SSH identity, when a key directory is configured.
    fn ssh_command(&self) -> Option<String> {
        let dir = self.key_dir.as_ref()?;
        let key = dir.join("id_ed25519");
        Some(format!("ssh -i {} -o IdentitiesOnly=yes", key.display()))
    }

    fn expect_success(output: std::process::Output, what: &str) -> CapResult<String> {
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CapabilityError::op(format!(
                "{what} failed: {}",
                stderr.trim()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Read helpers (libgit2)
// ---------------------------------------------------------------------------

fn delta_status(status: git2::Delta) -> DiffStatus {
    match status {
        git2::Delta::Added => DiffStatus::Added,
        git2::Delta::Deleted => DiffStatus::Deleted,
        git2::Delta::Modified => DiffStatus::Modified,
        git2::Delta::Renamed => DiffStatus::Renamed,
        git2::Delta::Copied => DiffStatus::Copied,
        _ => DiffStatus::Modified,
    }
}

/// Walk a diff's patches for per-file line counts.
fn collect_entries(diff: &git2::Diff<'_>) -> Vec<DiffEntry> {
    let mut entries: Vec<DiffEntry> = diff
        .deltas()
        .map(|delta| {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            DiffEntry {
                path,
                status: delta_status(delta.status()),
                additions: 0,
                deletions: 0,
            }
        })
        .collect();

    let mut line_stats: Vec<(u32, u32)> = vec![(0, 0); entries.len()];
    let _ = diff.print(git2::DiffFormat::Patch, |delta, _hunk, line| {
        let current_path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        if let Some(pos) = entries.iter().position(|e| e.path == current_path) {
            match line.origin() {
                '+' => line_stats[pos].0 += 1,
                '-' => line_stats[pos].1 += 1,
                _ => {}
            }
        }
        true
    });

    for (entry, (adds, dels)) in entries.iter_mut().zip(line_stats.iter()) {
        entry.additions = *adds;
        entry.deletions = *dels;
    }
    entries
}

// ---------------------------------------------------------------------------
// GitOperator implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl GitOperator for GitServiceAdapter {
    async fn status(&self) -> CapResult<GitStatusSummary> {
        self.status_inner().map_err(git_err)
    }

    async fn diff(&self, path: Option<&str>) -> CapResult<String> {
        self.diff_inner(path).map_err(git_err)
    }

    async fn create_branch(&self, name: &str) -> CapResult<()> {
        let output = self.run_git(&["branch", name]).await?;
        Self::expect_success(output, "branch create").map(|_| ())
    }

    async fn commit(&self, message: &str) -> CapResult<CommitOutcome> {
        let output = self.run_git(&["add", "-A"]).await?;
        Self::expect_success(output, "git add")?;

        let output = self.run_git(&["commit", "-m", message]).await?;
        Self::expect_success(output, "git commit")?;

        let repo = self.open().map_err(git_err)?;
        let oid = repo
            .head()
            .map_err(git_err)?
            .target()
            .ok_or_else(|| CapabilityError::op("HEAD has no target after commit"))?;

        info!(sha = %oid, "committed");
        Ok(CommitOutcome {
            commit_sha: oid.to_string(),
            message: message.to_string(),
        })
    }

    async fn push(&self, branch: Option<&str>) -> CapResult<String> {
        let mut args = vec!["push", "origin"];
        if let Some(b) = branch {
            args.push(b);
        }
        let output = self.run_git(&args).await?;
        Self::expect_success(output, "git push")
    }

    async fn checkout(&self, branch: &str, create: bool) -> CapResult<()> {
        let mut args = vec!["checkout"];
        if create {
            args.push("-b");
        }
        args.push(branch);
        let output = self.run_git(&args).await?;
        Self::expect_success(output, "git checkout").map(|_| ())
    }

    async fn merge(&self, branch: &str, no_ff: bool) -> CapResult<MergeOutcome> {
        let mut args = vec!["merge"];
        if no_ff {
            args.push("--no-ff");
        }
        args.push(branch);
        let output = self.run_git(&args).await?;

        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout).into_owned();
            let fast_forward = text.contains("Fast-forward");
            return Ok(MergeOutcome {
                merged: true,
                fast_forward,
                conflicts: Vec::new(),
                output: text,
            });
        }

        // The merge stopped; gather the conflicted paths for the caller.
        let conflicts_out = self
            .run_git(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        let conflicts: Vec<String> = String::from_utf8_lossy(&conflicts_out.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        Ok(MergeOutcome {
            merged: false,
            fast_forward: false,
            conflicts,
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn revert(&self, shas: &[String]) -> CapResult<String> {
        if shas.is_empty() {
            return Err(CapabilityError::op("revert requires at least one sha"));
        }
        let mut args = vec!["revert", "--no-edit"];
        args.extend(shas.iter().map(String::as_str));
        let output = self.run_git(&args).await?;
        Self::expect_success(output, "git revert")
    }

    async fn delete_branch(&self, branch: &str, remote: bool) -> CapResult<()> {
        let output = self.run_git(&["branch", "-D", branch]).await?;
        Self::expect_success(output, "branch delete")?;
        if remote {
            let output = self.run_git(&["push", "origin", "--delete", branch]).await?;
            Self::expect_success(output, "remote branch delete")?;
        }
        Ok(())
    }

    async fn log(&self, max_count: usize) -> CapResult<Vec<CommitInfo>> {
        self.log_inner(max_count).map_err(git_err)
    }

    async fn fetch(&self, remote: Option<&str>) -> CapResult<String> {
        let mut args = vec!["fetch"];
        if let Some(r) = remote {
            args.push(r);
        }
        let output = self.run_git(&args).await?;
        Self::expect_success(output, "git fetch")
    }

    async fn list_branches(&self) -> CapResult<Vec<BranchInfo>> {
        self.list_branches_inner().map_err(git_err)
    }

    async fn diff_branches(&self, base: &str, head: &str) -> CapResult<Vec<DiffEntry>> {
        self.diff_branches_inner(base, head).map_err(git_err)
    }

    async fn bead_commits(&self, bead_id: &str) -> CapResult<Vec<CommitInfo>> {
        self.bead_commits_inner(bead_id).map_err(git_err)
    }

    async fn create_pr(&self, request: PrRequest) -> CapResult<PrOutcome> {
        let mut args: Vec<String> = vec![
            "pr".into(),
            "create".into(),
            "--title".into(),
            request.title.clone(),
            "--body".into(),
            request.body.clone().unwrap_or_default(),
        ];
        if let Some(base) = &request.base {
            args.push("--base".into());
            args.push(base.clone());
        }
        if let Some(branch) = &request.branch {
            args.push("--head".into());
            args.push(branch.clone());
        }
        for reviewer in &request.reviewers {
            args.push("--reviewer".into());
            args.push(reviewer.clone());
        }
        if request.draft {
            args.push("--draft".into());
        }

        let output = tokio::process::Command::new("gh")
            .args(&args)
            .current_dir(&self.workdir)
            .output()
            .await?;
        let text = Self::expect_success(output, "gh pr create")?;
        // gh prints the PR URL as the last line.
        let url = text
            .lines()
            .rev()
            .find(|l| l.starts_with("https://"))
            .unwrap_or("")
            .to_string();
        Ok(PrOutcome { url, output: text })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a throwaway repository with one commit, entirely through
    /// libgit2 so the tests do not depend on a git binary.
    fn fixture_repo() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let repo = git2::Repository::init(&path).unwrap();

        std::fs::write(path.join("README.md"), "# fixture\n").unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("fixture", "fixture@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial [bead:b-1]", &tree, &[])
            .unwrap();

        (dir, path)
    }

    #[test]
    fn construction_fails_outside_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitServiceAdapter::new(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
    }

    #[test]
    fn construction_fails_on_missing_key_dir() {
        let (_dir, path) = fixture_repo();
        let err =
            GitServiceAdapter::new(&path, Some(PathBuf::from("/nonexistent/keys"))).unwrap_err();
        assert!(err.to_string().contains("key directory"));
    }

    #[tokio::test]
    async fn status_reports_clean_after_commit() {
        let (_dir, path) = fixture_repo();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let status = adapter.status().await.unwrap();
        assert!(status.clean);
        assert!(!status.branch.is_empty());
    }

    #[tokio::test]
    async fn status_sees_untracked_files() {
        let (_dir, path) = fixture_repo();
        std::fs::write(path.join("new.txt"), "hello").unwrap();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let status = adapter.status().await.unwrap();
        assert!(!status.clean);
        assert!(status
            .entries
            .iter()
            .any(|e| e.path == "new.txt" && e.status == DiffStatus::Untracked));
    }

    #[tokio::test]
    async fn log_returns_the_initial_commit() {
        let (_dir, path) = fixture_repo();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let commits = adapter.log(10).await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].author, "fixture");
        assert_eq!(commits[0].oid.len(), 7);
    }

    #[tokio::test]
    async fn bead_commits_filters_by_marker() {
        let (_dir, path) = fixture_repo();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let hits = adapter.bead_commits("b-1").await.unwrap();
        assert_eq!(hits.len(), 1);
        let misses = adapter.bead_commits("b-2").await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn list_branches_includes_head() {
        let (_dir, path) = fixture_repo();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let branches = adapter.list_branches().await.unwrap();
        assert!(branches.iter().any(|b| b.is_head));
    }

    #[tokio::test]
    async fn diff_shows_working_tree_changes() {
        let (_dir, path) = fixture_repo();
        std::fs::write(path.join("README.md"), "# fixture\nchanged\n").unwrap();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let diff = adapter.diff(None).await.unwrap();
        assert!(diff.contains("+changed"));
    }

    #[tokio::test]
    async fn diff_branches_against_self_is_empty() {
        let (_dir, path) = fixture_repo();
        let adapter = GitServiceAdapter::new(&path, None).unwrap();
        let branch = adapter.current_branch_inner().unwrap();
        let entries = adapter.diff_branches(&branch, &branch).await.unwrap();
        assert!(entries.is_empty());
    }
}
