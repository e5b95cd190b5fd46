//! Codec error types

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::format::ConfigFormat;
use crate::types::{NodePath, NodeType};

/// Errors that can occur while loading or saving a configuration
#[derive(Error, Debug)]
pub enum CodecError {
    /// Reading or writing the file failed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text does not parse as the claimed format
    #[error("{format} syntax error: {message}")]
    Syntax { format: ConfigFormat, message: String },

    /// The parsed document or the tree violates a structural assumption
    #[error("Invalid structure at {path}: {message}")]
    Shape { path: String, message: String },

    /// A scalar's text cannot be converted to the native type
    #[error("Invalid {node_type} value '{value}' at {path}: {message}")]
    Value {
        path: String,
        node_type: NodeType,
        value: String,
        message: String,
    },

    /// The tree uses something the target format cannot express
    #[error("Unsupported structure for {format} at {path}: {message}")]
    Unsupported {
        format: ConfigFormat,
        path: String,
        message: String,
    },

    /// No codec handles the extension
    #[error("No codec registered for extension '{0}'")]
    UnknownFormat(String),

    /// The tree does not belong to the configuration it is saved over
    #[error("UID mismatch: expected {expected}, found {found}")]
    UidMismatch { expected: String, found: String },
}

impl CodecError {
    /// Create an IO error for a file
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a syntax error
    pub fn syntax(format: ConfigFormat, message: impl std::fmt::Display) -> Self {
        Self::Syntax {
            format,
            message: message.to_string(),
        }
    }

    /// Create a shape error
    pub fn shape(path: &NodePath, message: impl Into<String>) -> Self {
        Self::Shape {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Create a value error
    pub fn value(
        path: &NodePath,
        node_type: NodeType,
        value: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Value {
            path: path.to_string(),
            node_type,
            value: value.into(),
            message: message.to_string(),
        }
    }

    /// Create an unsupported-structure error
    pub fn unsupported(format: ConfigFormat, path: &NodePath, message: impl Into<String>) -> Self {
        Self::Unsupported {
            format,
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Stable nonzero code of the error class
    pub fn code(&self) -> i32 {
        match self {
            CodecError::Io { .. } => 1,
            CodecError::Syntax { .. } => 2,
            CodecError::Shape { .. } => 3,
            CodecError::Value { .. } => 4,
            CodecError::Unsupported { .. } => 5,
            CodecError::UnknownFormat(_) => 6,
            CodecError::UidMismatch { .. } => 7,
        }
    }

    /// Whether the error was raised because the file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CodecError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<(NodePath, String)> for CodecError {
    fn from((path, message): (NodePath, String)) -> Self {
        CodecError::shape(&path, message)
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
