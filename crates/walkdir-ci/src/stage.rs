//! CI stage definitions and configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::DependencyPin;

/// Builtin CI stages. Every one of them passes `--verbose` to cargo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// cargo update -p <package> --precise <version> --verbose
    PinDependency(DependencyPin),

    /// cargo build --verbose
    Build,

    /// cargo doc --verbose
    Doc,

    /// cargo test --verbose --all
    TestAll,

    /// cargo generate-lockfile --verbose -Z minimal-versions
    MinimalVersionsLockfile,

    /// cargo test --verbose
    Test,
}

impl BuiltinStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::PinDependency(_) => "pin_dependency",
            BuiltinStage::Build => "build",
            BuiltinStage::Doc => "doc",
            BuiltinStage::TestAll => "test_all",
            BuiltinStage::MinimalVersionsLockfile => "minimal_versions_lockfile",
            BuiltinStage::Test => "test",
        }
    }

    /// Get the arguments passed to cargo for this stage.
    pub fn args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            BuiltinStage::PinDependency(pin) => {
                return vec![
                    "update".to_string(),
                    "-p".to_string(),
                    pin.package.clone(),
                    "--precise".to_string(),
                    pin.precise.clone(),
                    "--verbose".to_string(),
                ];
            }
            BuiltinStage::Build => &["build", "--verbose"],
            BuiltinStage::Doc => &["doc", "--verbose"],
            BuiltinStage::TestAll => &["test", "--verbose", "--all"],
            BuiltinStage::MinimalVersionsLockfile => {
                &["generate-lockfile", "--verbose", "-Z", "minimal-versions"]
            }
            BuiltinStage::Test => &["test", "--verbose"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Get the stage's full command, invoking `cargo` as given.
    pub fn command(&self, cargo: &str) -> Vec<String> {
        let mut command = vec![cargo.to_string()];
        command.extend(self.args());
        command
    }
}

/// Configuration for a CI stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Directory to run the command in.
    pub current_dir: Option<PathBuf>,

    /// Timeout in seconds; 0 disables it.
    pub timeout_secs: u64,

    /// Whether this stage is enabled.
    pub enabled: bool,
}

impl StageConfig {
    /// Create a new stage configuration from a builtin stage.
    pub fn from_builtin(stage: &BuiltinStage, cargo: &str, timeout_secs: u64) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(cargo),
            current_dir: None,
            timeout_secs,
            enabled: true,
        }
    }

    /// Create a custom stage configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            current_dir: None,
            timeout_secs,
            enabled: true,
        }
    }

    /// Run this stage from `dir`.
    pub fn in_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The command as a shell-style line, used for the `+ ...` echo.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}
