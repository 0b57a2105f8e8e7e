use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use testforge_core::{entry_path, ArtifactNode, ArtifactTree};
use tokio::fs;
use tracing::debug;

use crate::error::Result;

enum Step<'a> {
    Dir(PathBuf),
    /// Directory implied by a multi-component entry name such as `tests/api/`
    Implied(PathBuf),
    File(PathBuf, &'a str),
}

/// Flatten a tree into filesystem steps, parents before children.
fn plan<'a>(tree: &'a ArtifactTree, base: &Path, steps: &mut Vec<Step<'a>>) -> Result<()> {
    for (name, node) in tree.entries() {
        let relative = entry_path(name)?;

        let mut implied = base.to_path_buf();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            implied.push(component);
            if components.peek().is_some() {
                steps.push(Step::Implied(implied.clone()));
            }
        }

        let path = base.join(&relative);
        match node {
            ArtifactNode::Directory(children) => {
                steps.push(Step::Dir(path.clone()));
                plan(children, &path, steps)?;
            }
            ArtifactNode::File(content) => steps.push(Step::File(path, content)),
        }
    }
    Ok(())
}

/// What one `materialize` call put on disk beyond file contents.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    created_dirs: HashSet<PathBuf>,
    files: usize,
}

impl Materialized {
    /// Directories that did not exist before the call
    pub fn created_dirs(&self) -> impl Iterator<Item = &Path> {
        self.created_dirs.iter().map(PathBuf::as_path)
    }

    pub fn file_count(&self) -> usize {
        self.files
    }
}

async fn ensure_dir(path: &Path, record: &mut Materialized) -> Result<()> {
    if fs::try_exists(path).await? {
        // Surfaces a file squatting on a directory path
        fs::create_dir_all(path).await?;
        return Ok(());
    }
    fs::create_dir_all(path).await?;
    record.created_dirs.insert(path.to_path_buf());
    Ok(())
}

/// Write `tree` below `root`. Existing directories are reused and existing
/// files overwritten, so repeating the call yields the same contents.
pub async fn materialize(tree: &ArtifactTree, root: &Path) -> Result<Materialized> {
    let mut steps = Vec::new();
    plan(tree, root, &mut steps)?;

    fs::create_dir_all(root).await?;

    let mut record = Materialized::default();
    for step in steps {
        match step {
            Step::Dir(path) | Step::Implied(path) => ensure_dir(&path, &mut record).await?,
            Step::File(path, content) => {
                fs::write(&path, content).await?;
                record.files += 1;
            }
        }
    }

    debug!(
        root = %root.display(),
        files = record.files,
        created_dirs = record.created_dirs.len(),
        "Materialized artifact tree"
    );
    Ok(record)
}

/// Ingest raw generator output and materialize it.
///
/// Nothing is written when the output is not a valid tree.
pub async fn materialize_json(value: &Value, root: &Path) -> Result<ArtifactTree> {
    let tree = ArtifactTree::from_json(value)?;
    materialize(&tree, root).await?;
    Ok(tree)
}

/// Remove the shape of `tree` from `root`, children first.
///
/// Paths that are already gone count as removed. A directory is only
/// deleted once it is empty, so files the tree does not describe survive
/// together with the directories holding them. `root` itself is kept.
/// Any empty directory the tree names is pruned; use [`rollback`] to keep
/// directories that existed before materializing.
pub async fn remove(tree: &ArtifactTree, root: &Path) -> Result<()> {
    remove_steps(tree, root, None).await
}

/// Undo one `materialize` call: files of `tree` are deleted and only the
/// directories that call created are pruned.
pub async fn rollback(tree: &ArtifactTree, root: &Path, materialized: &Materialized) -> Result<()> {
    remove_steps(tree, root, Some(materialized)).await
}

async fn remove_steps(
    tree: &ArtifactTree,
    root: &Path,
    materialized: Option<&Materialized>,
) -> Result<()> {
    let mut steps = Vec::new();
    plan(tree, root, &mut steps)?;

    let mut removed = 0usize;
    for step in steps.into_iter().rev() {
        match step {
            Step::File(path, _) => match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
            Step::Dir(path) | Step::Implied(path) => {
                let owned = materialized.map_or(true, |m| m.created_dirs.contains(&path));
                if owned && remove_dir_if_empty(&path).await? {
                    removed += 1;
                }
            }
        }
    }

    debug!(root = %root.display(), removed, "Removed artifact tree");
    Ok(())
}

async fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if entries.next_entry().await?.is_some() {
        debug!(path = %path.display(), "Keeping non-empty directory");
        return Ok(false);
    }

    match fs::remove_dir(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
