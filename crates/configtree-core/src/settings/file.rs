//! File-based codec settings (YAML)
//!
//! Supports user-level (~/.config/configtree/settings.yaml) and
//! workspace-level (.config/configtree/settings.yaml) files.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::codec::CodecSettings;
use super::error::{SettingsError, SettingsResult};

/// Settings level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsLevel {
    /// User-level settings (~/.config/configtree/settings.yaml)
    User,
    /// Workspace-level settings (.config/configtree/settings.yaml in the workspace root)
    Workspace,
}

impl SettingsLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsLevel::User => "user",
            SettingsLevel::Workspace => "workspace",
        }
    }
}

/// YAML file holding `CodecSettings`
///
/// A missing file reads as the default settings.
///
/// # Example
///
/// ```no_run
/// use configtree_core::settings::SettingsFile;
///
/// let settings = SettingsFile::user().load().unwrap();
/// println!("XML root element: {}", settings.xml.root_element);
/// ```
pub struct SettingsFile {
    path: PathBuf,
    level: SettingsLevel,
    cache: RwLock<Option<CodecSettings>>,
}

impl SettingsFile {
    /// Create a settings file for a specific path
    pub fn new(path: impl Into<PathBuf>, level: SettingsLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// User-level settings (~/.config/configtree/settings.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("configtree").join("settings.yaml"), SettingsLevel::User)
    }

    /// Workspace-level settings (.config/configtree/settings.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("configtree")
            .join("settings.yaml");
        Self::new(path, SettingsLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> SettingsLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Cached settings, read from disk on first use
    pub fn load(&self) -> SettingsResult<CodecSettings> {
        if let Some(settings) = self.cache.read().as_ref() {
            return Ok(settings.clone());
        }
        self.reload()
    }

    /// Re-read the file, replacing the cache
    pub fn reload(&self) -> SettingsResult<CodecSettings> {
        let settings = self.read()?;
        *self.cache.write() = Some(settings.clone());
        Ok(settings)
    }

    /// Write settings, creating parent directories
    pub fn save(&self, settings: &CodecSettings) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(settings)
            .map_err(|e| SettingsError::Other(format!("Failed to serialize YAML: {}", e)))?;
        fs::write(&self.path, content)?;

        *self.cache.write() = Some(settings.clone());
        Ok(())
    }

    fn read(&self) -> SettingsResult<CodecSettings> {
        if !self.path.exists() {
            return Ok(CodecSettings::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(CodecSettings::default());
        }
        serde_yaml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for SettingsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsFile")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}
