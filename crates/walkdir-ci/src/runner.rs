//! CI stage execution.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{CiError, Result};
use crate::stage::StageConfig;

/// Result of a stage execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// The command that ran.
    pub command: Vec<String>,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout (empty when output is inherited).
    pub stdout: String,

    /// Captured stderr (empty when output is inherited).
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StageResult {
    /// Whether this stage passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// A failed result for a stage that could not produce an exit status.
    pub fn from_error(config: &StageConfig, err: &CiError, duration_ms: u64) -> Self {
        Self {
            stage_name: config.name.clone(),
            command: config.command.clone(),
            exit_code: err.exit_code(),
            stdout: String::new(),
            stderr: err.to_string(),
            duration_ms,
            success: false,
        }
    }
}

/// Something that can run a single stage to completion.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Run `config` and report how it went.
    ///
    /// A non-zero exit is reported through [`StageResult`]. `Err` is kept for
    /// stages that never produced an exit status at all.
    async fn execute(&self, config: &StageConfig) -> Result<StageResult>;
}

/// Runs stages as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor {
    capture: bool,
}

impl ProcessExecutor {
    /// Children share this process's stdout and stderr.
    pub fn inherit() -> Self {
        Self { capture: false }
    }

    /// Children's stdout and stderr are collected into the [`StageResult`].
    pub fn capturing() -> Self {
        Self { capture: true }
    }
}

#[async_trait]
impl StageExecutor for ProcessExecutor {
    async fn execute(&self, config: &StageConfig) -> Result<StageResult> {
        let start = Instant::now();

        let (exe, args) = config
            .command
            .split_first()
            .ok_or_else(|| CiError::EmptyCommand(config.name.clone()))?;

        let mut command = Command::new(exe);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }
        if self.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let child = command.spawn().map_err(|source| CiError::Spawn {
            stage: config.name.clone(),
            source,
        })?;
        debug!(stage = %config.name, pid = ?child.id(), "spawned stage");

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| CiError::Timeout {
                stage: config.name.clone(),
                secs: config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = exit_code_of(output.status);

        Ok(StageResult {
            stage_name: config.name.clone(),
            command: config.command.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
            success: output.status.success(),
        })
    }
}

/// Map an exit status to a shell-style exit code.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str, timeout_secs: u64) -> StageConfig {
        StageConfig::custom(
            name,
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_secs,
        )
    }

    #[test]
    fn test_stage_result_passed() {
        let result = StageResult {
            stage_name: "build".to_string(),
            command: vec!["cargo".to_string(), "build".to_string()],
            exit_code: 0,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: true,
        };
        assert!(result.passed());
    }

    #[test]
    fn test_stage_result_failed() {
        let result = StageResult {
            stage_name: "build".to_string(),
            command: vec!["cargo".to_string(), "build".to_string()],
            exit_code: 101,
            stdout: "".to_string(),
            stderr: "error".to_string(),
            duration_ms: 100,
            success: false,
        };
        assert!(!result.passed());
    }

    #[test]
    fn test_stage_result_from_error() {
        let config = StageConfig::custom("doc", vec!["cargo".to_string()], 1);
        let err = CiError::Timeout {
            stage: "doc".to_string(),
            secs: 1,
        };
        let result = StageResult::from_error(&config, &err, 1000);
        assert_eq!(result.exit_code, 124);
        assert!(!result.passed());
        assert!(result.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let config = StageConfig::custom(
            "echo_test",
            vec!["echo".to_string(), "hello".to_string()],
            60,
        );

        let result = ProcessExecutor::capturing()
            .execute(&config)
            .await
            .expect("execute failed");
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
        assert_eq!(result.command, config.command);
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let config = StageConfig::custom("false_test", vec!["false".to_string()], 60);

        let result = ProcessExecutor::capturing()
            .execute(&config)
            .await
            .expect("execute failed");
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_execute_preserves_exit_code() {
        let result = ProcessExecutor::capturing()
            .execute(&sh("exit_3", "echo oops >&2; exit 3", 0))
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(result.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_execute_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh("pwd", "pwd", 0).in_dir(Some(dir.path().to_path_buf()));

        let result = ProcessExecutor::capturing().execute(&config).await.unwrap();
        assert!(result.passed());
        let reported = std::path::PathBuf::from(result.stdout.trim());
        assert_eq!(
            std::fs::canonicalize(reported).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_execute_missing_program() {
        let config = StageConfig::custom(
            "missing",
            vec!["walkdir-ci-definitely-not-a-program".to_string()],
            60,
        );
        let err = ProcessExecutor::capturing().execute(&config).await.unwrap_err();
        assert!(matches!(err, CiError::Spawn { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[tokio::test]
    async fn test_execute_empty_command() {
        let config = StageConfig::custom("empty", vec![], 60);
        let err = ProcessExecutor::inherit().execute(&config).await.unwrap_err();
        assert!(matches!(err, CiError::EmptyCommand(_)));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let err = ProcessExecutor::capturing()
            .execute(&sh("sleepy", "sleep 5", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CiError::Timeout { secs: 1, .. }));
        assert_eq!(err.exit_code(), 124);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_killed_by_signal() {
        let result = ProcessExecutor::capturing()
            .execute(&sh("killed", "kill -9 $$", 0))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 128 + 9);
    }
}
