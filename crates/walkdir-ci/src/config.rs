//! CI run configuration.
//!
//! Every knob has a default in code. [`CiConfig::from_env`] overlays the
//! environment variables the CI runner provides.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CiError, Result};

/// Minimum supported toolchain version checked by default.
pub const DEFAULT_MSRV: &str = "1.74.0";

/// The toolchain literal that enables the minimal-versions cycle.
pub const NIGHTLY: &str = "nightly";

/// Environment variable naming the toolchain under test.
pub const RUST_VERSION_ENV: &str = "TRAVIS_RUST_VERSION";

/// Environment variable overriding [`DEFAULT_MSRV`].
pub const MSRV_ENV: &str = "WALKDIR_MSRV";

/// Environment variable naming the cargo program to invoke.
pub const CARGO_ENV: &str = "CARGO";

/// Which historical variant of the CI script to reproduce.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptRevision {
    /// On the MSRV toolchain, pin a dependency (twice) and run everything.
    PinDependency,

    /// On the MSRV toolchain, build and document but skip the tests.
    #[default]
    SkipTestsOnMsrv,
}

impl ScriptRevision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptRevision::PinDependency => "pin-dependency",
            ScriptRevision::SkipTestsOnMsrv => "skip-tests-on-msrv",
        }
    }
}

impl fmt::Display for ScriptRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptRevision {
    type Err = CiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pin-dependency" => Ok(ScriptRevision::PinDependency),
            "skip-tests-on-msrv" => Ok(ScriptRevision::SkipTestsOnMsrv),
            other => Err(CiError::InvalidConfig(format!(
                "unknown script revision '{}' (expected pin-dependency or skip-tests-on-msrv)",
                other
            ))),
        }
    }
}

/// A dependency held at an exact version on the MSRV toolchain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DependencyPin {
    /// Package id passed to `cargo update -p`.
    pub package: String,

    /// Version passed to `--precise`.
    pub precise: String,
}

impl DependencyPin {
    pub fn new(package: impl Into<String>, precise: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            precise: precise.into(),
        }
    }
}

impl Default for DependencyPin {
    fn default() -> Self {
        Self::new("lazy_static", "1.1.0")
    }
}

impl fmt::Display for DependencyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.precise)
    }
}

impl FromStr for DependencyPin {
    type Err = CiError;

    /// Parse `<package>@<version>`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('@') {
            Some((package, precise)) if !package.is_empty() && !precise.is_empty() => {
                Ok(Self::new(package, precise))
            }
            _ => Err(CiError::InvalidConfig(format!(
                "dependency pin '{}' must look like <package>@<version>",
                s
            ))),
        }
    }
}

/// Configuration for one CI run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiConfig {
    /// Toolchain under test. Unset reads as the empty string.
    pub rust_version: String,

    /// The literal that identifies the MSRV toolchain.
    pub msrv: String,

    /// Script variant to reproduce.
    pub revision: ScriptRevision,

    /// Dependency pinned by [`ScriptRevision::PinDependency`].
    pub pin: DependencyPin,

    /// Cargo program to invoke.
    pub cargo: String,

    /// Directory to run cargo in (current directory when unset).
    pub workspace: Option<PathBuf>,

    /// Per-stage timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            rust_version: String::new(),
            msrv: DEFAULT_MSRV.to_string(),
            revision: ScriptRevision::default(),
            pin: DependencyPin::default(),
            cargo: "cargo".to_string(),
            workspace: None,
            timeout_secs: 0,
        }
    }
}

impl CiConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty `WALKDIR_MSRV` and `CARGO` values are ignored; an empty
    /// `TRAVIS_RUST_VERSION` is kept as-is.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(version) = lookup(RUST_VERSION_ENV) {
            config.rust_version = version;
        }
        if let Some(msrv) = lookup(MSRV_ENV).filter(|v| !v.is_empty()) {
            config.msrv = msrv;
        }
        if let Some(cargo) = lookup(CARGO_ENV).filter(|v| !v.is_empty()) {
            config.cargo = cargo;
        }
        config
    }

    /// Check that the configuration can produce a meaningful plan.
    pub fn validate(&self) -> Result<()> {
        if self.msrv.is_empty() {
            return Err(CiError::InvalidConfig("MSRV must not be empty".to_string()));
        }
        if self.msrv == NIGHTLY {
            return Err(CiError::InvalidConfig(format!(
                "MSRV must be a release version, not '{}'",
                NIGHTLY
            )));
        }
        if self.cargo.is_empty() {
            return Err(CiError::InvalidConfig(
                "cargo program must not be empty".to_string(),
            ));
        }
        if self.pin.package.is_empty() || self.pin.precise.is_empty() {
            return Err(CiError::InvalidConfig(format!(
                "dependency pin '{}' is incomplete",
                self.pin
            )));
        }
        Ok(())
    }
}
