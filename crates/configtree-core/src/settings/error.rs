//! Settings error types

/// Errors that can occur while reading or writing a settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Settings error: {0}")]
    Other(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
