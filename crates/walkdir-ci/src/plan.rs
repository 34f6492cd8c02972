//! Deriving the ordered stage list for a toolchain.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{CiConfig, ScriptRevision, NIGHTLY};
use crate::error::Result;
use crate::stage::{BuiltinStage, StageConfig};

/// Classification of the toolchain under test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The minimum supported toolchain.
    Msrv,

    /// The nightly toolchain.
    Nightly,

    /// Anything else, including an unset value.
    Other,
}

impl Channel {
    /// Classify `value` by exact comparison against `msrv` and `"nightly"`.
    pub fn classify(value: &str, msrv: &str) -> Self {
        if value == msrv {
            Channel::Msrv
        } else if value == NIGHTLY {
            Channel::Nightly
        } else {
            Channel::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Msrv => "msrv",
            Channel::Nightly => "nightly",
            Channel::Other => "other",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered stages one CI run executes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiPlan {
    /// Toolchain value the plan was built for.
    pub rust_version: String,

    /// How that value was classified.
    pub channel: Channel,

    /// Script variant the plan reproduces.
    pub revision: ScriptRevision,

    /// Stages in execution order.
    pub stages: Vec<StageConfig>,

    /// Whether the plan stops before the test step.
    pub early_exit: bool,

    /// SHA-256 over the ordered command lines.
    pub digest: String,
}

impl CiPlan {
    /// Build the plan for `config`.
    pub fn build(config: &CiConfig) -> Result<Self> {
        config.validate()?;

        let channel = Channel::classify(&config.rust_version, &config.msrv);
        let mut builtins = Vec::new();

        if channel == Channel::Msrv && config.revision == ScriptRevision::PinDependency {
            // Older cargo only honours --precise once a lock file exists,
            // so the first run creates it and the second applies the pin.
            let pin = BuiltinStage::PinDependency(config.pin.clone());
            builtins.push(pin.clone());
            builtins.push(pin);
        }

        builtins.push(BuiltinStage::Build);
        builtins.push(BuiltinStage::Doc);

        let early_exit =
            channel == Channel::Msrv && config.revision == ScriptRevision::SkipTestsOnMsrv;
        if !early_exit {
            builtins.push(BuiltinStage::TestAll);
            if channel == Channel::Nightly {
                builtins.push(BuiltinStage::MinimalVersionsLockfile);
                builtins.push(BuiltinStage::Build);
                builtins.push(BuiltinStage::Test);
            }
        }

        let stages: Vec<StageConfig> = builtins
            .iter()
            .map(|stage| {
                StageConfig::from_builtin(stage, &config.cargo, config.timeout_secs)
                    .in_dir(config.workspace.clone())
            })
            .collect();
        let digest = compute_plan_digest(&stages);

        debug!(
            channel = %channel,
            revision = %config.revision,
            stages = stages.len(),
            early_exit,
            "built CI plan"
        );

        Ok(Self {
            rust_version: config.rust_version.clone(),
            channel,
            revision: config.revision,
            stages,
            early_exit,
            digest,
        })
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Compute a deterministic digest of the ordered stage commands.
fn compute_plan_digest(stages: &[StageConfig]) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        for arg in &stage.command {
            hasher.update(arg.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DependencyPin;

    fn config_for(version: &str, revision: ScriptRevision) -> CiConfig {
        CiConfig {
            rust_version: version.to_string(),
            revision,
            ..CiConfig::default()
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(Channel::classify("1.74.0", "1.74.0"), Channel::Msrv);
        assert_eq!(Channel::classify("nightly", "1.74.0"), Channel::Nightly);
        assert_eq!(Channel::classify("stable", "1.74.0"), Channel::Other);
        assert_eq!(Channel::classify("1.74", "1.74.0"), Channel::Other);
        assert_eq!(Channel::classify("", "1.74.0"), Channel::Other);
        assert_eq!(Channel::classify("Nightly", "1.74.0"), Channel::Other);
    }

    #[test]
    fn test_other_plan_is_build_doc_test() {
        let plan = CiPlan::build(&config_for("stable", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        assert_eq!(plan.channel, Channel::Other);
        assert_eq!(plan.stage_names(), vec!["build", "doc", "test_all"]);
        assert!(!plan.early_exit);
    }

    #[test]
    fn test_other_plan_ignores_revision() {
        let a = CiPlan::build(&config_for("beta", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        let b = CiPlan::build(&config_for("beta", ScriptRevision::PinDependency)).unwrap();
        assert_eq!(a.stages, b.stages);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_msrv_skip_tests_plan() {
        let plan = CiPlan::build(&config_for("1.74.0", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        assert_eq!(plan.channel, Channel::Msrv);
        assert_eq!(plan.stage_names(), vec!["build", "doc"]);
        assert!(plan.early_exit);
    }

    #[test]
    fn test_msrv_pin_plan_pins_twice_then_runs_everything() {
        let mut config = config_for("1.74.0", ScriptRevision::PinDependency);
        config.pin = DependencyPin::new("lazy_static", "1.1.0");
        let plan = CiPlan::build(&config).unwrap();

        assert_eq!(
            plan.stage_names(),
            vec!["pin_dependency", "pin_dependency", "build", "doc", "test_all"]
        );
        assert_eq!(plan.stages[0].command, plan.stages[1].command);
        assert_eq!(
            plan.stages[0].command_line(),
            "cargo update -p lazy_static --precise 1.1.0 --verbose"
        );
        assert!(!plan.early_exit);
    }

    #[test]
    fn test_nightly_plan_adds_minimal_versions_cycle() {
        let plan = CiPlan::build(&config_for("nightly", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        assert_eq!(plan.channel, Channel::Nightly);
        assert_eq!(
            plan.stage_names(),
            vec![
                "build",
                "doc",
                "test_all",
                "minimal_versions_lockfile",
                "build",
                "test"
            ]
        );
    }

    #[test]
    fn test_every_planned_command_is_verbose() {
        for version in ["1.74.0", "nightly", "stable", ""] {
            for revision in [ScriptRevision::PinDependency, ScriptRevision::SkipTestsOnMsrv] {
                let plan = CiPlan::build(&config_for(version, revision)).unwrap();
                for stage in &plan.stages {
                    assert!(stage.command.contains(&"--verbose".to_string()));
                }
            }
        }
    }

    #[test]
    fn test_plan_uses_configured_cargo_and_workspace() {
        let config = CiConfig {
            rust_version: "stable".to_string(),
            cargo: "/opt/bin/cargo".to_string(),
            workspace: Some(std::path::PathBuf::from("/src/walkdir")),
            timeout_secs: 30,
            ..CiConfig::default()
        };
        let plan = CiPlan::build(&config).unwrap();
        for stage in &plan.stages {
            assert_eq!(stage.command[0], "/opt/bin/cargo");
            assert_eq!(
                stage.current_dir.as_deref(),
                Some(std::path::Path::new("/src/walkdir"))
            );
            assert_eq!(stage.timeout_secs, 30);
        }
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = CiConfig {
            msrv: "nightly".to_string(),
            ..CiConfig::default()
        };
        assert!(CiPlan::build(&config).is_err());
    }

    #[test]
    fn test_plan_digest_deterministic_and_order_sensitive() {
        let a = CiPlan::build(&config_for("nightly", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        let b = CiPlan::build(&config_for("nightly", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);

        let mut reversed = a.stages.clone();
        reversed.reverse();
        assert_ne!(compute_plan_digest(&reversed), a.digest);

        let other = CiPlan::build(&config_for("stable", ScriptRevision::SkipTestsOnMsrv)).unwrap();
        assert_ne!(a.digest, other.digest);
    }
}
