//! Configuration and setup errors shared by the workspace crates

use thiserror::Error;

/// Errors raised while loading configuration or wiring up the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),
}

/// Result alias for configuration and setup
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("client_id must not be empty".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: client_id must not be empty"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {}",
            io_err
        );

        let telemetry_err = Error::Telemetry("subscriber already set".into());
        assert!(telemetry_err.to_string().contains("subscriber already set"));
    }

    #[test]
    fn toml_errors_convert() {
        let parse = toml::from_str::<toml::Value>("not valid {{{{ toml").unwrap_err();
        let err: Error = parse.into();
        assert!(
            err.to_string().starts_with("TOML parse error:"),
            "got: {err}"
        );
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/token-session.toml")?)
        }
        let err = read_missing().unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got: {err:?}");
    }
}
