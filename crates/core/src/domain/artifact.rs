//! Recursive directory/file structure produced by the artifact generator.
//!
//! The generator returns a JSON object where nested objects are directories
//! and strings are file contents. [`ArtifactTree::from_json`] is the only
//! place where that raw output is turned into a typed tree; anything that is
//! not an object or a string is rejected there.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid node at '{path}': expected directory or file, found {found}")]
    InvalidNode { path: String, found: &'static str },

    #[error("Invalid entry name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Duplicate entry '{name}' in '{parent}'")]
    DuplicateName { parent: String, name: String },
}

/// A single node of an [`ArtifactTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArtifactNode {
    Directory(ArtifactTree),
    File(String),
}

impl ArtifactNode {
    pub fn is_directory(&self) -> bool {
        matches!(self, ArtifactNode::Directory(_))
    }
}

/// Ordered mapping of entry name to node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ArtifactTree {
    entries: IndexMap<String, ArtifactNode>,
}

impl ArtifactTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.entries
            .insert(name.into(), ArtifactNode::File(content.into()));
        self
    }

    pub fn with_dir(mut self, name: impl Into<String>, tree: ArtifactTree) -> Self {
        self.entries
            .insert(name.into(), ArtifactNode::Directory(tree));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ArtifactNode)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactNode> {
        self.entries.get(name)
    }

    /// Parse generator output. `value` must be the object found under
    /// `directory_structure`.
    pub fn from_json(value: &Value) -> Result<Self, TreeError> {
        Self::parse_dir(value, Path::new(""))
    }

    fn parse_dir(value: &Value, location: &Path) -> Result<Self, TreeError> {
        let Value::Object(map) = value else {
            return Err(TreeError::InvalidNode {
                path: location.display().to_string(),
                found: json_kind(value),
            });
        };

        let mut seen = HashSet::new();
        let mut entries = IndexMap::with_capacity(map.len());

        for (name, child) in map {
            let relative = entry_path(name)?;
            if !seen.insert(relative.clone()) {
                return Err(TreeError::DuplicateName {
                    parent: location.display().to_string(),
                    name: name.clone(),
                });
            }

            let child_location = location.join(&relative);
            let node = match child {
                Value::Object(_) => {
                    ArtifactNode::Directory(Self::parse_dir(child, &child_location)?)
                }
                Value::String(content) => ArtifactNode::File(content.clone()),
                other => {
                    return Err(TreeError::InvalidNode {
                        path: child_location.display().to_string(),
                        found: json_kind(other),
                    })
                }
            };
            entries.insert(name.clone(), node);
        }

        Ok(Self { entries })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Relative paths of every file in the tree, depth first.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.collect_files(Path::new(""), &mut out);
        out
    }

    fn collect_files(&self, prefix: &Path, out: &mut Vec<PathBuf>) {
        for (name, node) in &self.entries {
            let Ok(relative) = entry_path(name) else {
                continue;
            };
            let path = prefix.join(relative);
            match node {
                ArtifactNode::Directory(tree) => tree.collect_files(&path, out),
                ArtifactNode::File(_) => out.push(path),
            }
        }
    }

    pub fn file_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                ArtifactNode::Directory(tree) => tree.file_count(),
                ArtifactNode::File(_) => 1,
            })
            .sum()
    }
}

impl<'de> Deserialize<'de> for ArtifactTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ArtifactTree::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Filesystem path for an entry name, relative to its parent directory.
///
/// A trailing `/` only marks directory intent and is dropped. Every remaining
/// component must be a plain name so that no entry can point outside the
/// directory it is materialized into.
pub fn entry_path(name: &str) -> Result<PathBuf, TreeError> {
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(TreeError::InvalidName {
            name: name.to_string(),
            reason: "empty name",
        });
    }

    let path = Path::new(trimmed);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => {
                return Err(TreeError::InvalidName {
                    name: name.to_string(),
                    reason: "parent directory reference",
                })
            }
            Component::CurDir => {
                return Err(TreeError::InvalidName {
                    name: name.to_string(),
                    reason: "current directory reference",
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TreeError::InvalidName {
                    name: name.to_string(),
                    reason: "absolute path",
                })
            }
        }
    }

    Ok(path.to_path_buf())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_structure() {
        let value = json!({
            "pages/": { "login_page.py": "class LoginPage: pass" },
            "tests/": { "test_login.py": "def test_ok(): pass" },
            "pytest.ini": "[pytest]"
        });

        let tree = ArtifactTree::from_json(&value).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.file_count(), 3);
        assert!(tree.get("pages/").unwrap().is_directory());
        assert_eq!(
            tree.file_paths(),
            vec![
                PathBuf::from("pages/login_page.py"),
                PathBuf::from("tests/test_login.py"),
                PathBuf::from("pytest.ini"),
            ]
        );
    }

    #[test]
    fn test_preserves_entry_order() {
        let value = json!({ "z.txt": "z", "a.txt": "a", "m.txt": "m" });
        let tree = ArtifactTree::from_json(&value).unwrap();
        let names: Vec<_> = tree.entries().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["z.txt", "a.txt", "m.txt"]);
    }

    #[test]
    fn test_rejects_non_object_root() {
        let err = ArtifactTree::from_json(&json!("just text")).unwrap_err();
        assert!(matches!(err, TreeError::InvalidNode { found: "string", .. }));
    }

    #[test]
    fn test_rejects_array_node() {
        let value = json!({ "tests/": { "cases": ["a", "b"] } });
        let err = ArtifactTree::from_json(&value).unwrap_err();
        match err {
            TreeError::InvalidNode { path, found } => {
                assert_eq!(path, "tests/cases");
                assert_eq!(found, "array");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_null_and_number_nodes() {
        assert!(ArtifactTree::from_json(&json!({ "a": null })).is_err());
        assert!(ArtifactTree::from_json(&json!({ "a": 3 })).is_err());
    }

    #[test]
    fn test_rejects_escaping_names() {
        assert!(matches!(
            ArtifactTree::from_json(&json!({ "../evil.py": "x" })),
            Err(TreeError::InvalidName { .. })
        ));
        assert!(matches!(
            ArtifactTree::from_json(&json!({ "/etc/passwd": "x" })),
            Err(TreeError::InvalidName { .. })
        ));
        assert!(matches!(
            ArtifactTree::from_json(&json!({ "/": {} })),
            Err(TreeError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_rejects_names_colliding_after_trim() {
        let value = json!({ "pages/": {}, "pages": {} });
        assert!(matches!(
            ArtifactTree::from_json(&value),
            Err(TreeError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_entry_path_strips_trailing_slash() {
        assert_eq!(entry_path("tests/").unwrap(), PathBuf::from("tests"));
        assert_eq!(
            entry_path("tests/api/").unwrap(),
            PathBuf::from("tests/api")
        );
    }

    #[test]
    fn test_serializes_back_to_directory_structure() {
        let value = json!({ "a/": { "b.txt": "x" } });
        let tree = ArtifactTree::from_json(&value).unwrap();
        assert_eq!(tree.to_json(), value);
    }

    #[test]
    fn test_deserialize_validates() {
        let tree: ArtifactTree = serde_json::from_str(r#"{"a.txt": "x"}"#).unwrap();
        assert_eq!(tree.file_count(), 1);
        assert!(serde_json::from_str::<ArtifactTree>(r#"{"a.txt": 1}"#).is_err());
    }

    #[test]
    fn test_builder() {
        let tree = ArtifactTree::new()
            .with_dir("a/", ArtifactTree::new().with_file("b.txt", "x"))
            .with_file("c.txt", "y");
        assert_eq!(tree.file_count(), 2);
        assert!(!tree.is_empty());
    }
}
