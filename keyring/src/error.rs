//! Error types for keyring management

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeyringError>;

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Unknown keyring role: {0}")]
    UnknownRole(String),

    #[error("Failed executing '{command}' Error rc={retcode}, stdout={stdout} stderr={stderr}")]
    Generation {
        command: String,
        retcode: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Keyring secret is invalid")]
    InvalidSecret,

    #[error("Keyring could not be deleted: {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid cluster version: {0}")]
    Version(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_carries_command() {
        let err = KeyringError::Generation {
            command: "ceph-authtool -n client.admin --gen-key".into(),
            retcode: 2,
            stdout: String::new(),
            stderr: "permission denied".into(),
        };

        let message = err.to_string();
        assert!(message.contains("ceph-authtool -n client.admin --gen-key"));
        assert!(message.contains("rc=2"));
        assert!(message.contains("permission denied"));
    }
}
