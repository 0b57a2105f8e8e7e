//! Zip packaging of a materialized project directory.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, WorkspaceError};

/// Pack `dir` into an in-memory zip archive with paths relative to `dir`.
pub async fn archive_bytes(dir: &Path) -> Result<Vec<u8>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let cursor = pack(&dir, Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    })
    .await
    .map_err(|e| WorkspaceError::Archive(e.to_string()))?
}

/// Pack `dir` into a zip file at `dest`.
pub async fn write_zip(dir: &Path, dest: &Path) -> Result<()> {
    let dir = dir.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let file = File::create(&dest)?;
        pack(&dir, file)?;
        debug!(dest = %dest.display(), "Wrote archive");
        Ok(())
    })
    .await
    .map_err(|e| WorkspaceError::Archive(e.to_string()))?
}

fn pack<W: Write + Seek>(dir: &Path, writer: W) -> Result<W> {
    if !dir.is_dir() {
        return Err(WorkspaceError::RunNotFound(dir.display().to_string()));
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut children: Vec<PathBuf> = std::fs::read_dir(&current)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        children.sort();

        for path in children {
            let name = archive_name(dir, &path)?;
            if path.is_dir() {
                zip.add_directory(format!("{}/", name), options)?;
                pending.push(path);
            } else {
                zip.start_file(name, options)?;
                let mut buffer = Vec::new();
                File::open(&path)?.read_to_end(&mut buffer)?;
                zip.write_all(&buffer)?;
            }
        }
    }

    Ok(zip.finish()?)
}

fn archive_name(base: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|e| WorkspaceError::Archive(e.to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materializer::materialize;
    use serde_json::json;
    use tempfile::TempDir;
    use testforge_core::ArtifactTree;

    #[tokio::test]
    async fn test_archive_contains_tree() {
        let dir = TempDir::new().unwrap();
        let tree = ArtifactTree::from_json(&json!({
            "tests/": { "test_a.py": "def test_a(): pass" },
            "pytest.ini": "[pytest]"
        }))
        .unwrap();
        materialize(&tree, dir.path()).await.unwrap();

        let bytes = archive_bytes(dir.path()).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["pytest.ini", "tests/", "tests/test_a.py"]);

        let mut content = String::new();
        archive
            .by_name("tests/test_a.py")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "def test_a(): pass");
    }

    #[tokio::test]
    async fn test_write_zip_to_file() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("requirements.txt"), "pytest").unwrap();

        let dest = dir.path().join("out.zip");
        write_zip(&project, &dest).await.unwrap();

        let archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = archive_bytes(&dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::RunNotFound(_)));
    }
}
