//! CI pipeline orchestration.

use std::io::{self, Write};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScriptRevision;
use crate::plan::{Channel, CiPlan};
use crate::runner::{StageExecutor, StageResult};

/// Result of a complete CI pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique id of this run.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Toolchain classification the plan was built for.
    pub channel: Channel,

    /// Script variant the plan reproduced.
    pub revision: ScriptRevision,

    /// Whether all stages passed.
    pub success: bool,

    /// Whether the run stopped early by design (MSRV without tests).
    pub early_exit: bool,

    /// Results of the stages that ran, in order.
    pub stages: Vec<StageResult>,

    /// Names of stages that never ran because an earlier one failed.
    pub not_run: Vec<String>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Digest of the executed plan.
    pub plan_digest: String,
}

impl PipelineResult {
    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    /// The stage that stopped the pipeline, if any.
    pub fn first_failure(&self) -> Option<&StageResult> {
        self.stages.iter().find(|s| !s.passed())
    }

    /// Process exit code for this run: 0 on success, otherwise the exit code
    /// of the first failing stage.
    pub fn exit_code(&self) -> i32 {
        match self.first_failure() {
            // A failed stage that somehow reported 0 must still fail the run.
            Some(stage) if stage.exit_code == 0 => 1,
            Some(stage) => stage.exit_code,
            None => 0,
        }
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// CI pipeline orchestrator.
pub struct CiPipeline;

impl CiPipeline {
    /// Execute every enabled stage of `plan` in order, echoing each command
    /// line to stderr.
    ///
    /// The first stage that fails stops the pipeline; the remaining stages
    /// are listed in [`PipelineResult::not_run`].
    pub async fn run(executor: &dyn StageExecutor, plan: &CiPlan) -> PipelineResult {
        Self::run_with_echo(executor, plan, &mut io::stderr()).await
    }

    /// Like [`CiPipeline::run`], but writes the `+ <command line>` echo to
    /// `echo`. The echo does not go through the log filter.
    pub async fn run_with_echo(
        executor: &dyn StageExecutor,
        plan: &CiPlan,
        echo: &mut (dyn Write + Send),
    ) -> PipelineResult {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        info!(
            run_id = %run_id,
            channel = %plan.channel,
            rust_version = %plan.rust_version,
            revision = %plan.revision,
            "Starting CI pipeline"
        );

        let mut stage_results = Vec::new();
        let mut not_run = Vec::new();
        let mut all_passed = true;

        for config in &plan.stages {
            if !all_passed {
                not_run.push(config.name.clone());
                continue;
            }
            if !config.enabled {
                info!(stage = %config.name, "Skipping disabled stage");
                continue;
            }

            let command_line = config.command_line();
            if let Err(e) = writeln!(echo, "+ {}", command_line).and_then(|_| echo.flush()) {
                warn!(stage = %config.name, error = %e, "Failed to echo command");
            }
            debug!(stage = %config.name, command = %command_line, "Running stage");

            let stage_start = Instant::now();
            let result = match executor.execute(config).await {
                Ok(result) => result,
                Err(e) => {
                    // The stage never produced an exit status (spawn failure,
                    // timeout); record it as a failure with a shell-style code.
                    let duration_ms = stage_start.elapsed().as_millis() as u64;
                    warn!(stage = %config.name, error = %e, "Stage execution error");
                    StageResult::from_error(config, &e, duration_ms)
                }
            };

            if !result.passed() {
                all_passed = false;
                warn!(
                    stage = %result.stage_name,
                    exit_code = result.exit_code,
                    "Stage failed"
                );
            }
            stage_results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let early_exit = all_passed && plan.early_exit;

        if all_passed {
            if early_exit {
                info!(run_id = %run_id, "MSRV toolchain: skipping tests");
            }
            info!(run_id = %run_id, duration_ms, "CI pipeline completed successfully");
        } else {
            info!(run_id = %run_id, not_run = not_run.len(), "CI pipeline failed");
        }

        PipelineResult {
            run_id,
            started_at,
            channel: plan.channel,
            revision: plan.revision,
            success: all_passed,
            early_exit,
            stages: stage_results,
            not_run,
            duration_ms,
            plan_digest: plan.digest.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, exit_code: i32) -> StageResult {
        StageResult {
            stage_name: name.to_string(),
            command: vec!["cargo".to_string(), name.to_string()],
            exit_code,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: exit_code == 0,
        }
    }

    fn result_with(stages: Vec<StageResult>) -> PipelineResult {
        let success = stages.iter().all(|s| s.passed());
        PipelineResult {
            run_id: "run123".to_string(),
            started_at: Utc::now(),
            channel: Channel::Other,
            revision: ScriptRevision::SkipTestsOnMsrv,
            success,
            early_exit: false,
            stages,
            not_run: vec![],
            duration_ms: 300,
            plan_digest: "abc123".to_string(),
        }
    }

    #[test]
    fn test_pipeline_result_counts() {
        let result = result_with(vec![stage("build", 0), stage("doc", 0)]);

        assert_eq!(result.passed_count(), 2);
        assert_eq!(result.failed_count(), 0);
        assert!(result.success);
        assert!(result.first_failure().is_none());
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_pipeline_result_with_failures() {
        let result = result_with(vec![stage("build", 0), stage("doc", 101)]);

        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.success);
        assert_eq!(result.first_failure().unwrap().stage_name, "doc");
        assert_eq!(result.exit_code(), 101);
    }

    #[test]
    fn test_exit_code_never_zero_on_failure() {
        let mut odd = stage("build", 0);
        odd.success = false;
        let result = result_with(vec![odd]);
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_pipeline_result_serializes() {
        let result = result_with(vec![stage("build", 0)]);
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["channel"], "other");
        assert_eq!(json["revision"], "skip-tests-on-msrv");
        assert_eq!(json["stages"][0]["stage_name"], "build");
        assert_eq!(json["not_run"], serde_json::json!([]));
    }
}
