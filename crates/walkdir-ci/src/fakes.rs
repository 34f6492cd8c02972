//! In-memory fakes for the executor trait (testing only)
//!
//! Provides `RecordingExecutor`, which records every stage it is asked to run
//! and answers with scripted exit codes instead of spawning processes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CiError, Result};
use crate::runner::{StageExecutor, StageResult};
use crate::stage::StageConfig;

/// How a scripted stage should behave.
#[derive(Debug, Clone)]
enum Outcome {
    Exit(i32),
    Timeout,
    NotFound,
}

/// Executor that records calls and succeeds unless told otherwise.
///
/// Outcomes are keyed by stage name and apply to every stage with that name.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<StageConfig>>,
    outcomes: HashMap<String, Outcome>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make stages named `stage` exit with `code`.
    pub fn fail_on(mut self, stage: &str, code: i32) -> Self {
        self.outcomes.insert(stage.to_string(), Outcome::Exit(code));
        self
    }

    /// Make stages named `stage` time out.
    pub fn time_out_on(mut self, stage: &str) -> Self {
        self.outcomes.insert(stage.to_string(), Outcome::Timeout);
        self
    }

    /// Make stages named `stage` fail to spawn as if the program were missing.
    pub fn missing_program_on(mut self, stage: &str) -> Self {
        self.outcomes.insert(stage.to_string(), Outcome::NotFound);
        self
    }

    /// Every stage executed so far, in order.
    pub fn calls(&self) -> Vec<StageConfig> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of every stage executed so far, in order.
    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Command lines of every stage executed so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.command_line())
            .collect()
    }
}

#[async_trait]
impl StageExecutor for RecordingExecutor {
    async fn execute(&self, config: &StageConfig) -> Result<StageResult> {
        self.calls.lock().unwrap().push(config.clone());

        let exit_code = match self.outcomes.get(&config.name) {
            None => 0,
            Some(Outcome::Exit(code)) => *code,
            Some(Outcome::Timeout) => {
                return Err(CiError::Timeout {
                    stage: config.name.clone(),
                    secs: config.timeout_secs,
                })
            }
            Some(Outcome::NotFound) => {
                return Err(CiError::Spawn {
                    stage: config.name.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
                })
            }
        };

        Ok(StageResult {
            stage_name: config.name.clone(),
            command: config.command.clone(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            success: exit_code == 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_executor_records_and_scripts() {
        let executor = RecordingExecutor::new().fail_on("doc", 101);
        let build = StageConfig::custom("build", vec!["cargo".to_string(), "build".to_string()], 0);
        let doc = StageConfig::custom("doc", vec!["cargo".to_string(), "doc".to_string()], 0);

        assert!(executor.execute(&build).await.unwrap().passed());
        let failed = executor.execute(&doc).await.unwrap();
        assert_eq!(failed.exit_code, 101);
        assert_eq!(executor.call_names(), vec!["build", "doc"]);
        assert_eq!(executor.command_lines(), vec!["cargo build", "cargo doc"]);
    }

    #[tokio::test]
    async fn test_recording_executor_errors() {
        let executor = RecordingExecutor::new()
            .time_out_on("slow")
            .missing_program_on("ghost");
        let slow = StageConfig::custom("slow", vec!["x".to_string()], 5);
        let ghost = StageConfig::custom("ghost", vec!["x".to_string()], 5);

        assert_eq!(executor.execute(&slow).await.unwrap_err().exit_code(), 124);
        assert_eq!(executor.execute(&ghost).await.unwrap_err().exit_code(), 127);
        assert_eq!(executor.calls().len(), 2);
    }
}
