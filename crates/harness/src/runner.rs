use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use testforge_core::ExecutionResult;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::policy::ExitPolicy;

const DEFAULT_TIMEOUT_SECS: u64 = 600;
/// Captured output kept in a result, from the end of the stream
const MAX_OUTPUT_CHARS: usize = 20_000;

/// Runs a materialized project and reports how it went.
#[async_trait]
pub trait ValidationRunner: Send + Sync {
    async fn run(&self, project_dir: &Path, report_dir: &Path) -> ExecutionResult;
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub policy: ExitPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            program: "pytest".to_string(),
            args: vec!["-p".to_string(), "no:cacheprovider".to_string()],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            policy: ExitPolicy::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: ExitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Invokes pytest (or any compatible program) inside the project directory
/// with an Allure report directory.
pub struct PytestRunner {
    config: HarnessConfig,
}

impl PytestRunner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    fn command(&self, project_dir: &Path, report_dir: &Path) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(format!("--alluredir={}", report_dir.display()))
            .current_dir(project_dir)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ValidationRunner for PytestRunner {
    async fn run(&self, project_dir: &Path, report_dir: &Path) -> ExecutionResult {
        let program = &self.config.program;
        debug!(program = %program, project = %project_dir.display(), "Starting harness");

        // Resolved against our own working directory, not the project's
        let report_dir = match absolute(report_dir) {
            Ok(path) => path,
            Err(e) => {
                warn!(program = %program, "Failed to resolve report directory: {}", e);
                return ExecutionResult::FailureRetryable {
                    exit_code: None,
                    output: format!("failed to resolve report directory: {}", e),
                };
            }
        };

        let output = match tokio::time::timeout(
            self.config.timeout,
            self.command(project_dir, &report_dir).output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                warn!(program = %program, "Harness executable unavailable: {}", e);
                return ExecutionResult::ToolUnavailable {
                    program: program.clone(),
                    reason: e.to_string(),
                };
            }
            Ok(Err(e)) => {
                warn!(program = %program, "Failed to run harness: {}", e);
                return ExecutionResult::FailureRetryable {
                    exit_code: None,
                    output: format!("failed to run {}: {}", program, e),
                };
            }
            Err(_) => {
                // Dropping the future kills the child
                warn!(
                    program = %program,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Harness timed out"
                );
                return ExecutionResult::FailureRetryable {
                    exit_code: None,
                    output: format!("{} timed out after {:?}", program, self.config.timeout),
                };
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            text.push('\n');
            text.push_str(&stderr);
        }

        let exit_code = output.status.code();
        let result = self.config.policy.classify(exit_code, tail(text));
        info!(
            program = %program,
            exit_code = ?exit_code,
            accepted = result.is_success(),
            "Harness finished"
        );
        result
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn tail(text: String) -> String {
    let count = text.chars().count();
    if count <= MAX_OUTPUT_CHARS {
        return text;
    }
    text.chars().skip(count - MAX_OUTPUT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.program, "pytest");
        assert_eq!(config.args, vec!["-p", "no:cacheprovider"]);
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert!(!config.policy.accept_failed_assertions);
    }

    #[test]
    fn test_tail_keeps_end() {
        let text = "a".repeat(MAX_OUTPUT_CHARS) + "END";
        let kept = tail(text);
        assert_eq!(kept.chars().count(), MAX_OUTPUT_CHARS);
        assert!(kept.ends_with("END"));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_unavailable() {
        let dir = TempDir::new().unwrap();
        let runner = PytestRunner::new(HarnessConfig::new("testforge-no-such-harness"));

        let result = runner.run(dir.path(), &dir.path().join("reports")).await;
        match result {
            ExecutionResult::ToolUnavailable { program, .. } => {
                assert_eq!(program, "testforge-no-such-harness")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    fn shell(script: &str) -> HarnessConfig {
        HarnessConfig::new("sh").with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_zero_is_success() {
        let dir = TempDir::new().unwrap();
        let runner = PytestRunner::new(shell("echo collected; exit 0"));

        let result = runner.run(dir.path(), dir.path()).await;
        assert_eq!(result, ExecutionResult::Success { exit_code: 0 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_one_depends_on_policy() {
        let dir = TempDir::new().unwrap();

        let strict = PytestRunner::new(shell("exit 1"));
        assert!(matches!(
            strict.run(dir.path(), dir.path()).await,
            ExecutionResult::FailureRetryable { exit_code: Some(1), .. }
        ));

        let lenient = PytestRunner::new(shell("exit 1").with_policy(ExitPolicy::lenient()));
        assert_eq!(
            lenient.run(dir.path(), dir.path()).await,
            ExecutionResult::Success { exit_code: 1 }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_captures_output() {
        let dir = TempDir::new().unwrap();
        let runner = PytestRunner::new(shell("echo 'E   ImportError' >&2; exit 2"));

        match runner.run(dir.path(), dir.path()).await {
            ExecutionResult::FailureRetryable { exit_code, output } => {
                assert_eq!(exit_code, Some(2));
                assert!(output.contains("ImportError"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_project_dir_with_env() {
        let dir = TempDir::new().unwrap();
        let runner = PytestRunner::new(shell(
            "test -f marker.txt && test \"$PYTHONDONTWRITEBYTECODE\" = 1",
        ));
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        assert!(runner.run(dir.path(), dir.path()).await.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_relative_report_dir_stays_outside_project() {
        let project = TempDir::new().unwrap();
        let scratch = TempDir::new_in(".").unwrap();
        let reports = scratch.path().join("reports");
        assert!(reports.is_relative());
        // `sh -c` binds the trailing --alluredir argument to $0
        let runner = PytestRunner::new(shell(
            "dir=\"${0#--alluredir=}\"; mkdir -p \"$dir\" && touch \"$dir/result.json\"",
        ));

        assert!(runner.run(project.path(), &reports).await.is_success());

        let expected = std::env::current_dir().unwrap().join(&reports).join("result.json");
        assert!(expected.is_file());
        assert!(!project.path().join(&reports).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_retryable_failure() {
        let dir = TempDir::new().unwrap();
        let runner = PytestRunner::new(shell("sleep 5").with_timeout(Duration::from_millis(100)));

        assert!(matches!(
            runner.run(dir.path(), dir.path()).await,
            ExecutionResult::FailureRetryable { exit_code: None, .. }
        ));
    }
}
