use std::sync::Arc;

use capability::{ArtifactAdapter, ArtifactRequest, GenerationContext};
use events::{Milestone, ProgressEvent};
use harness::ValidationRunner;
use testforge_core::{ArtifactTree, Attempt, ExecutionResult, TestPlan};
use tracing::{debug, error, info, warn};
use workspace::RunWorkspace;

use crate::emitter::ProgressEmitter;
use crate::error::{OrchestratorError, Result};
use crate::state_machine::{LoopState, LoopStateMachine};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_attempts: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoopReport {
    pub state: LoopState,
    pub attempts: Vec<Attempt>,
    pub rollbacks: u32,
    /// Tree left on disk when the loop ended
    pub final_tree: Option<ArtifactTree>,
}

impl LoopReport {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Succeeded
    }
}

/// Generate, materialize, validate and roll back until the harness accepts
/// a tree or the attempt budget runs out.
pub struct RepairLoop {
    artifacts: Arc<dyn ArtifactAdapter>,
    runner: Arc<dyn ValidationRunner>,
    config: LoopConfig,
}

impl RepairLoop {
    pub fn new(
        artifacts: Arc<dyn ArtifactAdapter>,
        runner: Arc<dyn ValidationRunner>,
        config: LoopConfig,
    ) -> Self {
        Self {
            artifacts,
            runner,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub async fn run(
        &self,
        context: &GenerationContext,
        plan: &TestPlan,
        run: &RunWorkspace,
        emitter: &ProgressEmitter,
    ) -> Result<LoopReport> {
        let max_attempts = self.config.max_attempts;
        let mut machine = LoopStateMachine::new();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut rollbacks = 0u32;
        let mut succeeded = false;
        let mut attempt = 0u32;

        // Most recent tree the generator produced, and whether it is on disk
        let mut last_tree: Option<ArtifactTree> = None;
        let mut last_on_disk = false;
        // Tree of the last attempt that failed validation
        let mut repair_source: Option<ArtifactTree> = None;

        while !succeeded && attempt < max_attempts {
            attempt += 1;
            machine.transition(LoopState::Generating)?;
            emitter.status(
                Milestone::GenerationStarted,
                Some(attempt),
                "Generating code",
            );
            info!(run_id = %run.run_id, attempt, max_attempts, "Generating test code");

            let request = match &repair_source {
                Some(failed) => ArtifactRequest::repair(context, plan, failed),
                None => ArtifactRequest::initial(context, plan),
            };

            let generated = match self.artifacts.generate(&request).await {
                Ok(generated) => generated,
                Err(e) => {
                    warn!(run_id = %run.run_id, attempt, error = %e, "Code generation failed");
                    attempts.push(Attempt::generation_failed(attempt, e.to_string()));

                    if attempt < max_attempts {
                        machine.transition(LoopState::Retry)?;
                        emitter.status(
                            Milestone::Retry,
                            Some(attempt + 1),
                            format!(
                                "Code generation failed, retrying (attempt {} of {})",
                                attempt + 1,
                                max_attempts
                            ),
                        );
                    }
                    continue;
                }
            };

            let tree = match ArtifactTree::from_json(&generated.structure) {
                Ok(tree) => tree,
                Err(e) => {
                    self.abort(
                        &mut machine,
                        emitter,
                        run,
                        attempt,
                        format!("Generated code is not a valid directory tree: {}", e),
                    )?;
                    return Err(OrchestratorError::invalid_artifact(attempt, &e));
                }
            };

            emitter.emit(
                Milestone::CodeReceived,
                Some(attempt),
                ProgressEvent::Artifact(tree.clone()),
            );

            let materialized = match workspace::materialize(&tree, &run.project_dir).await {
                Ok(materialized) => materialized,
                Err(e) => {
                    self.abort(
                        &mut machine,
                        emitter,
                        run,
                        attempt,
                        format!("Generated code could not be written: {}", e),
                    )?;
                    return Err(e.into());
                }
            };
            machine.transition(LoopState::Materialized)?;
            last_tree = Some(tree.clone());
            last_on_disk = true;
            debug!(
                run_id = %run.run_id,
                attempt,
                files = materialized.file_count(),
                "Tree materialized"
            );

            machine.transition(LoopState::Validating)?;
            emitter.status(Milestone::ValidationStarted, Some(attempt), "Validating code");

            let result = self.runner.run(&run.project_dir, &run.reports_dir).await;
            attempts.push(Attempt::validated(attempt, tree.clone(), result.clone()));

            match result {
                ExecutionResult::Success { exit_code } => {
                    info!(run_id = %run.run_id, attempt, exit_code, "Validation passed");
                    machine.transition(LoopState::Succeeded)?;
                    succeeded = true;
                }
                ExecutionResult::ToolUnavailable { program, reason } => {
                    warn!(
                        run_id = %run.run_id,
                        attempt,
                        program = %program,
                        reason = %reason,
                        "Validation harness unavailable"
                    );
                    break;
                }
                ExecutionResult::FailureRetryable { exit_code, .. } => {
                    warn!(run_id = %run.run_id, attempt, ?exit_code, "Validation failed");

                    if attempt < max_attempts {
                        if let Err(e) =
                            workspace::rollback(&tree, &run.project_dir, &materialized).await
                        {
                            self.abort(
                                &mut machine,
                                emitter,
                                run,
                                attempt,
                                format!("Failed code could not be rolled back: {}", e),
                            )?;
                            return Err(e.into());
                        }
                        rollbacks += 1;
                        last_on_disk = false;

                        machine.transition(LoopState::Retry)?;
                        emitter.status(
                            Milestone::Retry,
                            Some(attempt + 1),
                            format!(
                                "Tests failed, regenerating (attempt {} of {})",
                                attempt + 1,
                                max_attempts
                            ),
                        );
                        repair_source = Some(tree);
                    }
                }
            }
        }

        if succeeded {
            emitter.status(
                Milestone::Succeeded,
                Some(attempt),
                "Tests passed, archive ready",
            );
        } else {
            if !last_on_disk {
                if let Some(tree) = &last_tree {
                    debug!(run_id = %run.run_id, "Restoring most recent tree for review");
                    if let Err(e) = workspace::materialize(tree, &run.project_dir).await {
                        self.abort(
                            &mut machine,
                            emitter,
                            run,
                            attempt,
                            format!("Most recent code could not be restored: {}", e),
                        )?;
                        return Err(e.into());
                    }
                }
            }
            machine.transition(LoopState::Exhausted)?;
            info!(run_id = %run.run_id, attempts = attempts.len(), "Attempts exhausted");
            emitter.status(
                Milestone::Exhausted,
                Some(attempt),
                "Attempts exhausted, manual review required",
            );
        }

        Ok(LoopReport {
            state: machine.state(),
            attempts,
            rollbacks,
            final_tree: last_tree,
        })
    }

    fn abort(
        &self,
        machine: &mut LoopStateMachine,
        emitter: &ProgressEmitter,
        run: &RunWorkspace,
        attempt: u32,
        message: String,
    ) -> Result<()> {
        error!(run_id = %run.run_id, attempt, state = %machine.state(), "{}", message);
        machine.transition(LoopState::Aborted)?;
        emitter.status(Milestone::Aborted, Some(attempt), message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use capability::{CapabilityError, GeneratedArtifact};
    use events::{EventBus, EventEnvelope};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::broadcast;
    use uuid::Uuid;
    use workspace::{WorkspaceConfig, WorkspaceManager};

    /// Hands out scripted generator outputs and records what it was asked.
    struct ScriptedGenerator {
        outputs: Mutex<VecDeque<std::result::Result<Value, CapabilityError>>>,
        repairs: Mutex<Vec<Option<ArtifactTree>>>,
    }

    impl ScriptedGenerator {
        fn new(outputs: Vec<std::result::Result<Value, CapabilityError>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
                repairs: Mutex::new(Vec::new()),
            }
        }

        fn repairs(&self) -> Vec<Option<ArtifactTree>> {
            self.repairs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactAdapter for ScriptedGenerator {
        async fn generate(
            &self,
            request: &ArtifactRequest<'_>,
        ) -> capability::Result<GeneratedArtifact> {
            self.repairs
                .lock()
                .unwrap()
                .push(request.repair.cloned());
            let next = self
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CapabilityError::Unavailable("script ended".into())));
            next.map(GeneratedArtifact::new)
        }
    }

    /// Returns scripted exit codes and snapshots the project files it saw.
    struct ScriptedRunner {
        codes: Mutex<VecDeque<i32>>,
        seen: Mutex<Vec<Vec<PathBuf>>>,
    }

    impl ScriptedRunner {
        fn new(codes: Vec<i32>) -> Self {
            Self {
                codes: Mutex::new(codes.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<Vec<PathBuf>> {
            self.seen.lock().unwrap().clone()
        }
    }

    fn list_files(root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(relative) = path.strip_prefix(root) {
                    files.push(relative.to_path_buf());
                }
            }
        }
        files.sort();
        files
    }

    #[async_trait]
    impl ValidationRunner for ScriptedRunner {
        async fn run(&self, project_dir: &Path, _report_dir: &Path) -> ExecutionResult {
            self.seen.lock().unwrap().push(list_files(project_dir));
            let code = self.codes.lock().unwrap().pop_front().unwrap_or(0);
            if code == 0 {
                ExecutionResult::Success { exit_code: 0 }
            } else {
                ExecutionResult::FailureRetryable {
                    exit_code: Some(code),
                    output: format!("exit {}", code),
                }
            }
        }
    }

    struct MissingTool;

    #[async_trait]
    impl ValidationRunner for MissingTool {
        async fn run(&self, _project_dir: &Path, _report_dir: &Path) -> ExecutionResult {
            ExecutionResult::ToolUnavailable {
                program: "pytest".to_string(),
                reason: "not found".to_string(),
            }
        }
    }

    fn tree_json(file: &str) -> Value {
        json!({
            "conftest.py": "import pytest",
            "tests": { file: format!("def test_{}(): pass", file.len()) }
        })
    }

    fn context() -> GenerationContext {
        GenerationContext::Ui {
            url: "https://example.com".to_string(),
            requirement: "login works".to_string(),
            page_html: "<html></html>".to_string(),
        }
    }

    struct Harness {
        _dir: TempDir,
        run: RunWorkspace,
        emitter: ProgressEmitter,
        events: broadcast::Receiver<EventEnvelope>,
    }

    async fn setup() -> Harness {
        let dir = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(WorkspaceConfig::new(dir.path()));
        let run = manager.create_run(Uuid::new_v4()).await.unwrap();
        let bus = EventBus::new();
        let events = bus.subscribe();
        let emitter = ProgressEmitter::new(bus, run.run_id);
        Harness {
            _dir: dir,
            run,
            emitter,
            events,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<EventEnvelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn repair_loop(
        generator: Arc<ScriptedGenerator>,
        runner: Arc<dyn ValidationRunner>,
    ) -> RepairLoop {
        RepairLoop::new(generator, runner, LoopConfig::default())
    }

    #[tokio::test]
    async fn test_repaired_on_second_attempt() {
        let mut h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(tree_json("test_first.py")),
            Ok(tree_json("test_second.py")),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![1, 0]));
        let plan = TestPlan::new("1. open page");

        let report = repair_loop(generator.clone(), runner.clone())
            .run(&context(), &plan, &h.run, &h.emitter)
            .await
            .unwrap();

        assert_eq!(report.state, LoopState::Succeeded);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.rollbacks, 1);
        assert!(!h.run.project_dir.join("tests/test_first.py").exists());
        assert!(h.run.project_dir.join("tests/test_second.py").exists());

        // The second call carries the failed tree as repair context
        let repairs = generator.repairs();
        assert!(repairs[0].is_none());
        let failed = repairs[1].as_ref().unwrap();
        assert!(failed.file_paths().contains(&PathBuf::from("tests/test_first.py")));

        let milestones: Vec<Milestone> = drain(&mut h.events).iter().map(|e| e.milestone).collect();
        assert_eq!(
            milestones,
            vec![
                Milestone::GenerationStarted,
                Milestone::CodeReceived,
                Milestone::ValidationStarted,
                Milestone::Retry,
                Milestone::GenerationStarted,
                Milestone::CodeReceived,
                Milestone::ValidationStarted,
                Milestone::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_leaves_last_tree() {
        let mut h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(tree_json("test_a.py")),
            Ok(tree_json("test_bb.py")),
            Ok(tree_json("test_ccc.py")),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![2, 2, 2]));

        let report = repair_loop(generator, runner)
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap();

        assert_eq!(report.state, LoopState::Exhausted);
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(report.rollbacks, 2);
        assert_eq!(
            list_files(&h.run.project_dir),
            vec![PathBuf::from("conftest.py"), PathBuf::from("tests/test_ccc.py")]
        );

        let events = drain(&mut h.events);
        let last = events.last().unwrap();
        assert_eq!(last.milestone, Milestone::Exhausted);
        assert!(last.event.status_text().unwrap().contains("manual review"));
        assert!(events.iter().all(|e| e.milestone != Milestone::Succeeded));
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(
            (0..10).map(|i| Ok(tree_json(&format!("test_{}.py", i)))).collect(),
        ));
        let runner = Arc::new(ScriptedRunner::new(vec![1; 10]));

        let report = RepairLoop::new(
            generator.clone(),
            runner.clone(),
            LoopConfig::new().with_max_attempts(4),
        )
        .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
        .await
        .unwrap();

        assert_eq!(report.attempts.len(), 4);
        assert_eq!(runner.seen().len(), 4);
        assert_eq!(generator.repairs().len(), 4);
        assert_eq!(
            report.attempts.iter().map(|a| a.number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[tokio::test]
    async fn test_rollback_before_next_generation() {
        let h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(json!({ "tests": { "test_one.py": "1" }, "helpers.py": "x" })),
            Ok(json!({ "tests": { "test_two.py": "2" } })),
            Ok(json!({ "suite": { "test_three.py": "3" } })),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![1, 1, 0]));

        repair_loop(generator, runner.clone())
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap();

        // Each validation sees exactly the tree of its own attempt
        assert_eq!(
            runner.seen(),
            vec![
                vec![PathBuf::from("helpers.py"), PathBuf::from("tests/test_one.py")],
                vec![PathBuf::from("tests/test_two.py")],
                vec![PathBuf::from("suite/test_three.py")],
            ]
        );
        assert!(!h.run.project_dir.join("tests").exists());
    }

    #[tokio::test]
    async fn test_generation_failure_consumes_attempt() {
        let h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(CapabilityError::Timeout),
            Ok(tree_json("test_ok.py")),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![0]));

        let report = repair_loop(generator.clone(), runner)
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts.len(), 2);
        assert!(!report.attempts[0].is_success());
        assert!(report.attempts[0].tree.is_none());
        assert_eq!(report.rollbacks, 0);
        assert!(generator.repairs().iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_last_tree_restored_when_final_generation_fails() {
        let h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(tree_json("test_a.py")),
            Ok(tree_json("test_bb.py")),
            Err(CapabilityError::MalformedResponse("not json".into())),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![1, 1]));

        let report = repair_loop(generator, runner)
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap();

        assert_eq!(report.state, LoopState::Exhausted);
        assert!(h.run.project_dir.join("tests/test_bb.py").exists());
        assert!(!h.run.project_dir.join("tests/test_a.py").exists());
    }

    #[tokio::test]
    async fn test_invalid_tree_aborts() {
        let mut h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(json!({ "tests": { "test_x.py": 42 } })),
            Ok(tree_json("test_never.py")),
        ]));
        let runner = Arc::new(ScriptedRunner::new(vec![0]));

        let err = repair_loop(generator.clone(), runner.clone())
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidArtifact { attempt: 1, .. }));
        assert_eq!(generator.repairs().len(), 1);
        assert!(runner.seen().is_empty());

        let events = drain(&mut h.events);
        assert_eq!(events.last().unwrap().milestone, Milestone::Aborted);
    }

    #[tokio::test]
    async fn test_missing_tool_ends_loop() {
        let h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(tree_json("test_a.py"))]));

        let report = repair_loop(generator.clone(), Arc::new(MissingTool))
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap();

        assert_eq!(report.state, LoopState::Exhausted);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(generator.repairs().len(), 1);
        assert!(h.run.project_dir.join("tests/test_a.py").exists());
    }

    /// Swaps a generated file for a directory so the rollback cannot delete it.
    struct SwapFileForDir {
        file: &'static str,
    }

    #[async_trait]
    impl ValidationRunner for SwapFileForDir {
        async fn run(&self, project_dir: &Path, _report_dir: &Path) -> ExecutionResult {
            let path = project_dir.join(self.file);
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir_all(path.join("nested")).unwrap();
            ExecutionResult::FailureRetryable {
                exit_code: Some(1),
                output: "failed".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_rollback_failure_aborts() {
        let mut h = setup().await;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(tree_json("test_a.py")),
            Ok(tree_json("test_never.py")),
        ]));
        let runner = Arc::new(SwapFileForDir {
            file: "tests/test_a.py",
        });

        let err = repair_loop(generator.clone(), runner)
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Workspace(_)));
        assert_eq!(generator.repairs().len(), 1);

        let events = drain(&mut h.events);
        let last = events.last().unwrap();
        assert_eq!(last.milestone, Milestone::Aborted);
        assert!(last.event.status_text().unwrap().contains("rolled back"));
        assert!(events.iter().all(|e| e.milestone != Milestone::Retry));
    }

    /// Fails its second call after planting a file where the first tree
    /// needs a directory.
    struct BlockingGenerator {
        block: PathBuf,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ArtifactAdapter for BlockingGenerator {
        async fn generate(
            &self,
            _request: &ArtifactRequest<'_>,
        ) -> capability::Result<GeneratedArtifact> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == 1 {
                return Ok(GeneratedArtifact::new(tree_json("test_a.py")));
            }
            std::fs::write(&self.block, "blocked").unwrap();
            Err(CapabilityError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_restore_failure_aborts() {
        let mut h = setup().await;
        let generator = Arc::new(BlockingGenerator {
            block: h.run.project_dir.join("tests"),
            calls: Mutex::new(0),
        });
        let runner = Arc::new(ScriptedRunner::new(vec![1]));

        let err = RepairLoop::new(generator, runner, LoopConfig::new().with_max_attempts(2))
            .run(&context(), &TestPlan::new("plan"), &h.run, &h.emitter)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Workspace(_)));

        let events = drain(&mut h.events);
        let last = events.last().unwrap();
        assert_eq!(last.milestone, Milestone::Aborted);
        assert_eq!(last.attempt, Some(2));
        assert!(events.iter().all(|e| e.milestone != Milestone::Exhausted));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(LoopConfig::new().with_max_attempts(0).max_attempts, 1);
        assert_eq!(LoopConfig::default().max_attempts, 3);
    }
}
