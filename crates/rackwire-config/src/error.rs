//! Error types for patch loading and building.

use std::path::PathBuf;

use rackwire_core::GraphError;
use thiserror::Error;

/// Errors that can occur while loading, saving or building a patch.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A module entry names a kind no unit implements
    #[error("module '{id}' has unknown kind '{kind}'")]
    UnknownModuleKind {
        /// Module id from the patch.
        id: String,
        /// The unrecognized kind.
        kind: String,
    },

    /// Two module entries share an id
    #[error("duplicate module id '{0}'")]
    DuplicateModule(String),

    /// A link names a module id that is not declared
    #[error("link refers to unknown module '{0}'")]
    UnknownModule(String),

    /// A link endpoint is not of the form `module.port`
    #[error("bad port reference '{port}': {reason}")]
    BadPortRef {
        /// The endpoint as written.
        port: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A parameter is unknown, malformed or out of range
    #[error("invalid parameter '{param}' for module '{module}': {reason}")]
    InvalidParam {
        /// Module id from the patch.
        module: String,
        /// Parameter name.
        param: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// A patch-level setting has an unusable value
    #[error("patch setting '{field}' {reason}")]
    InvalidSetting {
        /// Field name in the patch file.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Links into one input ask for different summation policies
    #[error("links into '{0}' disagree on `sum`")]
    ConflictingSum(String),

    /// The graph rejected a module or link
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a directory creation error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_param(
        module: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidParam {
            module: module.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::invalid_param("osc", "frequency", "out of range");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'frequency' for module 'osc': out of range"
        );

        let err = ConfigError::UnknownModuleKind {
            id: "x".into(),
            kind: "reverb".into(),
        };
        assert_eq!(err.to_string(), "module 'x' has unknown kind 'reverb'");
    }

    #[test]
    fn test_setting_errors_display() {
        let err = ConfigError::InvalidSetting {
            field: "block_size",
            reason: "must be greater than zero",
        };
        assert_eq!(
            err.to_string(),
            "patch setting 'block_size' must be greater than zero"
        );
        let err = ConfigError::ConflictingSum("mix.in".into());
        assert_eq!(err.to_string(), "links into 'mix.in' disagree on `sum`");
    }

    #[test]
    fn test_graph_error_is_transparent() {
        let inner = GraphError::EmptyGraph;
        let err = ConfigError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
    }

    #[test]
    fn test_read_file_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::read_file("/tmp/missing.toml", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/missing.toml"));
    }
}
