use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "testforge.toml";

/// Chat endpoint, models and sampling for planning and code generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySettings {
    pub base_url: String,
    /// Usually supplied through `TESTFORGE_API_KEY` rather than the file
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub plan_model: String,
    pub code_model: String,
    pub plan_temperature: f32,
    pub code_temperature: f32,
    pub plan_max_tokens: u32,
    pub code_max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            plan_model: "gpt-4o".to_string(),
            code_model: "gpt-4o".to_string(),
            plan_temperature: 0.1,
            code_temperature: 0.3,
            plan_max_tokens: 10_000,
            code_max_tokens: 50_000,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_prefix: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Treat exit status 1 (tests ran, some assertions failed) as acceptable
    pub accept_failed_assertions: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            program: "pytest".to_string(),
            args: vec!["-p".to_string(), "no:cacheprovider".to_string()],
            timeout_secs: 600,
            accept_failed_assertions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    pub max_attempts: u32,
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub base_dir: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".testforge/runs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractSettings {
    pub path: PathBuf,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("openapi.yaml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:.testforge/testforge.db".to_string(),
        }
    }
}

/// Service configuration, read from `testforge.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub capability: CapabilitySettings,
    pub harness: HarnessSettings,
    pub repair: RepairSettings,
    pub workspace: WorkspaceSettings,
    pub contract: ContractSettings,
    pub database: DatabaseSettings,
}

impl Settings {
    /// Read settings from a TOML file. A missing or unreadable file yields
    /// the defaults.
    pub async fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    settings
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Read the file, then apply `TESTFORGE_*` environment overrides.
    pub async fn load(path: &Path) -> Self {
        Self::read(path)
            .await
            .with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("TESTFORGE_API_KEY").filter(|k| !k.is_empty()) {
            self.capability.api_key = Some(key);
        }
        if let Some(url) = lookup("TESTFORGE_LLM_BASE_URL") {
            self.capability.base_url = url;
        }
        if let Some(url) = lookup("TESTFORGE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(dir) = lookup("TESTFORGE_WORKSPACE_DIR") {
            self.workspace.base_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("TESTFORGE_CONTRACT_PATH") {
            self.contract.path = PathBuf::from(path);
        }
        self
    }
}
