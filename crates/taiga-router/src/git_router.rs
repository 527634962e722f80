//! Per-project git routing.
//!
//! Concurrent agents work different projects; their git operations must
//! never share working trees or keys. The router resolves the project id
//! from ambient [`ActionContext`] and hands back a cached, project-scoped
//! adapter — callers on the same project share one instance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use taiga_core::context::{ActionContext, ProjectId};
use taiga_core::error::CapabilityError;

use crate::capability::CapResult;
use crate::git::GitOperator;
use crate::git_adapter::GitServiceAdapter;

// ---------------------------------------------------------------------------
// GitOpsManager
// ---------------------------------------------------------------------------

/// Per-project filesystem layout.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// The project's working tree.
    pub workdir: PathBuf,
    /// Directory holding the project's deploy key, when pushes are
    /// authenticated per project.
    pub key_dir: Option<PathBuf>,
}

/// Supplies the working-tree and key paths for a project. Owned by the
/// orchestrator's project registry; the git router only consumes it during
/// adapter construction.
pub trait GitOpsManager: Send + Sync {
    fn project_paths(&self, project_id: &ProjectId) -> CapResult<ProjectPaths>;
}

/// Static path layout: every project lives under one root, keys under
/// another. Enough for the daemon and for tests; richer registries implement
/// [`GitOpsManager`] themselves.
pub struct StaticGitOpsManager {
    projects_root: PathBuf,
    keys_root: Option<PathBuf>,
}

impl StaticGitOpsManager {
    pub fn new(projects_root: impl Into<PathBuf>, keys_root: Option<PathBuf>) -> Self {
        Self {
            projects_root: projects_root.into(),
            keys_root,
        }
    }
}

impl GitOpsManager for StaticGitOpsManager {
    fn project_paths(&self, project_id: &ProjectId) -> CapResult<ProjectPaths> {
        Ok(ProjectPaths {
            workdir: self.projects_root.join(project_id.as_str()),
            key_dir: self
                .keys_root
                .as_ref()
                .map(|root| root.join(project_id.as_str())),
        })
    }
}

// ---------------------------------------------------------------------------
// GitRouter
// ---------------------------------------------------------------------------

/// Resolves the git operator for the current turn's project.
pub trait GitRouter: Send + Sync {
    fn resolve(&self, actx: &ActionContext) -> CapResult<Arc<dyn GitOperator>>;
}

/// The caching router: `project_id -> GitServiceAdapter`, read-mostly.
///
/// Readers hold the shared lock only for the map probe. On a miss the
/// adapter is constructed *outside* any lock (construction may touch the
/// filesystem), then inserted under a short exclusive lock; losing a
/// construction race discards the loser and reuses the winner. Construction
/// failures surface immediately and are never cached.
pub struct ProjectGitRouter {
    manager: Arc<dyn GitOpsManager>,
    adapters: RwLock<HashMap<ProjectId, Arc<GitServiceAdapter>>>,
}

impl ProjectGitRouter {
    pub fn new(manager: Arc<dyn GitOpsManager>) -> Self {
        Self {
            manager,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached adapters (for introspection/tests).
    pub fn cached(&self) -> usize {
        self.adapters.read().expect("git adapter cache poisoned").len()
    }

    fn resolve_adapter(&self, project_id: &ProjectId) -> CapResult<Arc<GitServiceAdapter>> {
        if let Some(adapter) = self
            .adapters
            .read()
            .expect("git adapter cache poisoned")
            .get(project_id)
        {
            return Ok(adapter.clone());
        }

        let paths = self.manager.project_paths(project_id)?;
        debug!(project_id = %project_id, workdir = %paths.workdir.display(), "constructing git adapter");
        let adapter = match GitServiceAdapter::new(paths.workdir, paths.key_dir) {
            Ok(a) => Arc::new(a),
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "git adapter construction failed");
                return Err(e);
            }
        };

        let mut map = self.adapters.write().expect("git adapter cache poisoned");
        Ok(map.entry(project_id.clone()).or_insert(adapter).clone())
    }
}

impl GitRouter for ProjectGitRouter {
    fn resolve(&self, actx: &ActionContext) -> CapResult<Arc<dyn GitOperator>> {
        let project_id = actx
            .project_id
            .as_ref()
            .ok_or(CapabilityError::MissingProject)?;
        Ok(self.resolve_adapter(project_id)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(path: &std::path::Path) {
        let repo = git2::Repository::init(path).unwrap();
        std::fs::write(path.join("f.txt"), "x").unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("t", "t@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
    }

    fn router_over(root: &std::path::Path) -> ProjectGitRouter {
        ProjectGitRouter::new(Arc::new(StaticGitOpsManager::new(root, None)))
    }

    #[test]
    fn missing_project_context_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_over(dir.path());
        let actx = ActionContext::new("a1", "b1");
        let err = router.resolve(&actx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "git operations require project context"
        );
    }

    #[test]
    fn same_project_shares_one_adapter() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(&dir.path().join("p1"));

        let router = router_over(dir.path());
        let actx = ActionContext::new("a1", "b1").with_project("p1");
        let first = router.resolve(&actx).unwrap();
        let second = router.resolve(&actx).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(router.cached(), 1);
    }

    #[test]
    fn different_projects_get_different_adapters() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(&dir.path().join("p1"));
        init_repo(&dir.path().join("p2"));

        let router = router_over(dir.path());
        let a1 = router
            .resolve(&ActionContext::new("a", "b").with_project("p1"))
            .unwrap();
        let a2 = router
            .resolve(&ActionContext::new("a", "b").with_project("p2"))
            .unwrap();
        assert!(!Arc::ptr_eq(&a1, &a2));
        assert_eq!(router.cached(), 2);
    }

    #[test]
    fn construction_failure_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("p1")).unwrap();

        let router = router_over(dir.path());
        let actx = ActionContext::new("a1", "b1").with_project("p1");
        assert!(router.resolve(&actx).is_err());
        assert_eq!(router.cached(), 0);

        // The project becomes a real repository; resolution now succeeds
        // because the earlier failure was not cached.
        init_repo(&dir.path().join("p1"));
        assert!(router.resolve(&actx).is_ok());
        assert_eq!(router.cached(), 1);
    }

    #[test]
    fn concurrent_resolution_converges_on_one_adapter() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(&dir.path().join("p1"));

        let router = Arc::new(router_over(dir.path()));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let router = Arc::clone(&router);
            handles.push(std::thread::spawn(move || {
                let actx = ActionContext::new("a", "b").with_project("p1");
                router.resolve(&actx).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(router.cached(), 1);
    }
}
