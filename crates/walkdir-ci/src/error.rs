//! Error types for walkdir-ci

use std::io;

use thiserror::Error;

/// Exit code reported when a stage's program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code reported when a stage's program exists but could not be started.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// Exit code reported when a stage exceeded its timeout.
pub const EXIT_TIMEOUT: i32 = 124;

/// Errors that can occur while planning or executing a CI run
#[derive(Error, Debug)]
pub enum CiError {
    /// The configuration cannot produce a meaningful plan
    #[error("Invalid CI configuration: {0}")]
    InvalidConfig(String),

    /// A stage had no program to run
    #[error("Stage {0} has empty command")]
    EmptyCommand(String),

    /// The stage's program could not be started
    #[error("Failed to spawn stage {stage}: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: io::Error,
    },

    /// The stage ran longer than its configured timeout
    #[error("Stage {stage} timed out after {secs} seconds")]
    Timeout { stage: String, secs: u64 },

    /// Waiting on a running stage failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CiError {
    /// Exit code to report for a stage that failed with this error.
    ///
    /// Follows the shell conventions for the cases where no child exit
    /// status exists.
    pub fn exit_code(&self) -> i32 {
        match self {
            CiError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                EXIT_NOT_FOUND
            }
            CiError::Spawn { .. } | CiError::EmptyCommand(_) => EXIT_CANNOT_EXECUTE,
            CiError::Timeout { .. } => EXIT_TIMEOUT,
            CiError::InvalidConfig(_) => 2,
            CiError::Io(_) => 1,
        }
    }
}

/// Result type for CI operations
pub type Result<T> = std::result::Result<T, CiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_not_found_maps_to_127() {
        let err = CiError::Spawn {
            stage: "build".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.exit_code(), 127);
        assert!(err.to_string().contains("build"));
    }

    #[test]
    fn test_spawn_permission_denied_maps_to_126() {
        let err = CiError::Spawn {
            stage: "build".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.exit_code(), 126);
        assert_eq!(CiError::EmptyCommand("x".to_string()).exit_code(), 126);
    }

    #[test]
    fn test_timeout_maps_to_124() {
        let err = CiError::Timeout {
            stage: "test_all".to_string(),
            secs: 5,
        };
        assert_eq!(err.exit_code(), 124);
        assert_eq!(err.to_string(), "Stage test_all timed out after 5 seconds");
    }
}
