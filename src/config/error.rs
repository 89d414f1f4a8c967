//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),

    #[error("Config file `{0}` not found")]
    NotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("satchel.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("satchel.toml"));

        let validation_err = ConfigError::Validation("bundle path is empty".to_string());
        assert!(format!("{validation_err}").contains("bundle path is empty"));

        let missing = ConfigError::NotFound(PathBuf::from("satchel.toml"));
        assert_eq!(format!("{missing}"), "Config file `satchel.toml` not found");
    }
}
