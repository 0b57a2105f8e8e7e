use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, WorkspaceError};

const PROJECT_DIR: &str = "project";
const REPORTS_DIR: &str = "reports";

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".testforge/runs"),
        }
    }
}

impl WorkspaceConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

/// Directories owned by a single run.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    pub run_id: Uuid,
    /// `<base>/<run_id>`
    pub root: PathBuf,
    /// Materialization root, also the harness working directory
    pub project_dir: PathBuf,
    /// Harness report output
    pub reports_dir: PathBuf,
}

impl RunWorkspace {
    /// Paths are absolute; the harness uses `project_dir` as its working directory.
    fn at(base: &Path, run_id: Uuid) -> Result<Self> {
        let root = absolute(base)?.join(run_id.to_string());
        Ok(Self {
            run_id,
            project_dir: root.join(PROJECT_DIR),
            reports_dir: root.join(REPORTS_DIR),
            root,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Hands out one namespaced directory per run so concurrent runs never
/// materialize into the same place.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    config: WorkspaceConfig,
}

impl WorkspaceManager {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub async fn create_run(&self, run_id: Uuid) -> Result<RunWorkspace> {
        let run = RunWorkspace::at(&self.config.base_dir, run_id)?;

        if fs::try_exists(&run.root).await? {
            return Err(WorkspaceError::RunAlreadyExists(run_id.to_string()));
        }

        fs::create_dir_all(&run.project_dir).await?;
        fs::create_dir_all(&run.reports_dir).await?;

        info!(run_id = %run_id, path = %run.root.display(), "Created run workspace");
        Ok(run)
    }

    /// Look up the directories of an earlier run.
    pub async fn open_run(&self, run_id: Uuid) -> Result<RunWorkspace> {
        let run = RunWorkspace::at(&self.config.base_dir, run_id)?;
        if !fs::try_exists(&run.project_dir).await? {
            return Err(WorkspaceError::RunNotFound(run_id.to_string()));
        }
        Ok(run)
    }

    pub async fn remove_run(&self, run_id: Uuid) -> Result<()> {
        let run = RunWorkspace::at(&self.config.base_dir, run_id)?;
        match fs::remove_dir_all(&run.root).await {
            Ok(()) => {
                debug!(run_id = %run_id, "Removed run workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
