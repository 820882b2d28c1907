//! CLI-specific error types and exit code mapping

use peerlab_core::error::ConfigError;
use peerlab_harness::HarnessError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A scenario run failed.
    #[error("{0}")]
    Harness(#[from] HarnessError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | Scenario / command failure       |
    /// | 2    | Configuration error              |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Harness(e) if matches!(e.root(), HarnessError::Config(_)) => 2,
            Self::Io(_) => 10,
            Self::Harness(_) | Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_exit_code_failed_scenario() {
        let err = CliError::Harness(HarnessError::TestFailed {
            pids: vec![4000],
            source: Box::new(HarnessError::AssertionFailed("Actual: 0\nExpected: 1".to_owned())),
        });
        assert_eq!(err.exit_code(), 1, "failed scenario should return exit code 1");
        assert!(err.to_string().starts_with("process with pids [4000] failed"));
    }

    #[test]
    fn test_exit_code_harness_config_error() {
        let err = CliError::Harness(HarnessError::Config(ConfigError::MissingEnv {
            var: "PEERLAB_TEMP_DIR".to_owned(),
        }));
        assert_eq!(
            err.exit_code(),
            2,
            "config errors raised inside the harness are still config errors"
        );
    }

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::FileNotFound {
            path: "peerlab.toml".to_owned(),
        }
        .into();
        match err {
            CliError::Config(msg) => assert!(msg.contains("peerlab.toml")),
            _ => panic!("expected Config error variant"),
        }
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("unknown scenario 'x'".to_owned());
        assert_eq!(format!("{}", err), "unknown scenario 'x'");
    }
}
