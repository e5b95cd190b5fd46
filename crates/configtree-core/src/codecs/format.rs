//! Supported on-disk formats

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One of the on-disk formats a codec exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Xml,
    Yaml,
    Toml,
    Ini,
}

impl ConfigFormat {
    pub const ALL: [ConfigFormat; 5] = [
        ConfigFormat::Json,
        ConfigFormat::Xml,
        ConfigFormat::Yaml,
        ConfigFormat::Toml,
        ConfigFormat::Ini,
    ];

    /// Lower-case identifier (`"json"`, `"yaml"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Xml => "xml",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Ini => "ini",
        }
    }

    /// File extensions handled by default, without the leading dot
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ConfigFormat::Json => &["json"],
            ConfigFormat::Xml => &["xml"],
            ConfigFormat::Yaml => &["yaml", "yml"],
            ConfigFormat::Toml => &["toml"],
            ConfigFormat::Ini => &["ini"],
        }
    }

    /// Look up the default format of an extension (`".YML"` and `"yml"` both work)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = normalize_extension(ext);
        ConfigFormat::ALL
            .iter()
            .copied()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Look up the default format of a path by its extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigFormat::Json => "JSON",
            ConfigFormat::Xml => "XML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Ini => "INI",
        })
    }
}

/// Lower-case an extension and strip its leading dot
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
