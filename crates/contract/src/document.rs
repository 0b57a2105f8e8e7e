use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::{ContractError, Result};
use crate::reduce::reduce;

/// A loaded interface-description document.
#[derive(Debug, Clone)]
pub struct ContractDocument {
    path: PathBuf,
    value: Value,
}

impl ContractDocument {
    pub fn from_value(value: Value) -> Self {
        Self {
            path: PathBuf::new(),
            value,
        }
    }

    /// Read a YAML (`.yaml`/`.yml`) or JSON document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContractError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let value = Self::parse(path, &content)?;
        debug!(path = %path.display(), "Loaded contract document");

        Ok(Self {
            path: path.to_path_buf(),
            value,
        })
    }

    fn parse(path: &Path, content: &str) -> Result<Value> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(content).map_err(|e| ContractError::Parse(e.to_string()))
        } else {
            serde_yaml::from_str(content).map_err(|e| ContractError::Parse(e.to_string()))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn reduce(&self, selected_tags: &[String]) -> Value {
        reduce(&self.value, selected_tags)
    }

    pub fn to_yaml(value: &Value) -> Result<String> {
        serde_yaml::to_string(value).map_err(|e| ContractError::Render(e.to_string()))
    }
}
