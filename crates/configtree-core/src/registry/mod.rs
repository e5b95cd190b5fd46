//! Extension → codec lookup
//!
//! A `CodecRegistry` is built once and then only read, so it can be shared
//! across threads behind an `Arc` without locking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::codecs::{normalize_extension, CodecError, CodecResult, ConfigCodec, ConfigFormat};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::settings::CodecSettings;
use crate::types::ConfigTree;
use crate::{log_debug, log_warn};

/// Immutable map from file extension to codec
///
/// # Example
///
/// ```
/// use configtree_core::logging::NoOpLogger;
/// use configtree_core::registry::CodecRegistry;
///
/// let registry = CodecRegistry::with_defaults(NoOpLogger::shared());
/// let codec = registry.get(".YML").unwrap();
/// assert_eq!(codec.name(), "yaml");
/// ```
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ConfigCodec>>,
    logger: SharedLogger,
}

impl CodecRegistry {
    /// Start an empty registry
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::new()
    }

    /// Every format under its default extensions, with default options
    pub fn with_defaults(logger: SharedLogger) -> Self {
        Self::from_settings(&CodecSettings::default(), logger)
    }

    /// Every format configured from `settings`, plus its extension aliases
    pub fn from_settings(settings: &CodecSettings, logger: SharedLogger) -> Self {
        let mut builder = Self::builder().with_logger(Arc::clone(&logger));
        let mut built: HashMap<ConfigFormat, Arc<dyn ConfigCodec>> = HashMap::new();
        for format in ConfigFormat::ALL {
            let codec = settings.build_codec(format, Arc::clone(&logger));
            built.insert(format, Arc::clone(&codec));
            builder = builder.register_format(codec);
        }
        for (ext, format) in settings.aliases() {
            if let Some(codec) = built.get(&format) {
                builder = builder.register(&ext, Arc::clone(codec));
            }
        }
        builder.build()
    }

    /// Codec for an extension (case-insensitive, leading dot optional)
    pub fn get(&self, ext: &str) -> Option<Arc<dyn ConfigCodec>> {
        self.codecs.get(&normalize_extension(ext)).cloned()
    }

    /// Codec for a path, by its extension
    pub fn for_path(&self, path: &Path) -> CodecResult<Arc<dyn ConfigCodec>> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.get(&ext).ok_or_else(|| {
            log_warn!(self.logger, "No codec for {}", path.display());
            CodecError::UnknownFormat(normalize_extension(&ext))
        })
    }

    /// Whether an extension has a codec
    pub fn supports(&self, ext: &str) -> bool {
        self.codecs.contains_key(&normalize_extension(ext))
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }

    /// Load a file with the codec its extension selects
    pub fn load(&self, path: &Path) -> CodecResult<ConfigTree> {
        let codec = self.for_path(path)?;
        log_debug!(self.logger, "Loading {} as {}", path.display(), codec.name());
        codec.load(path)
    }

    /// Save a tree with the codec its extension selects
    pub fn save(&self, path: &Path, tree: &ConfigTree) -> CodecResult<()> {
        let codec = self.for_path(path)?;
        log_debug!(self.logger, "Saving {} as {}", path.display(), codec.name());
        codec.save(path, tree)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Collects codecs before freezing them into a `CodecRegistry`
pub struct CodecRegistryBuilder {
    codecs: HashMap<String, Arc<dyn ConfigCodec>>,
    logger: SharedLogger,
}

impl CodecRegistryBuilder {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
            logger: NoOpLogger::shared(),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Map one extension to a codec, replacing any previous mapping
    pub fn register(mut self, ext: &str, codec: Arc<dyn ConfigCodec>) -> Self {
        let ext = normalize_extension(ext);
        if let Some(previous) = self.codecs.insert(ext.clone(), codec) {
            log_debug!(self.logger, "Extension '{}' no longer maps to {}", ext, previous.name());
        }
        self
    }

    /// Map every default extension of the codec's format to it
    pub fn register_format(self, codec: Arc<dyn ConfigCodec>) -> Self {
        codec
            .format()
            .extensions()
            .iter()
            .fold(self, |builder, ext| builder.register(ext, Arc::clone(&codec)))
    }

    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            codecs: self.codecs,
            logger: self.logger,
        }
    }
}

impl Default for CodecRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::{IniCodec, JsonCodec};
    use crate::types::ConfigNode;
    use tempfile::tempdir;

    #[test]
    fn test_default_extensions() {
        let registry = CodecRegistry::with_defaults(NoOpLogger::shared());
        assert_eq!(registry.extensions(), vec!["ini", "json", "toml", "xml", "yaml", "yml"]);
        for (ext, format) in [
            ("json", ConfigFormat::Json),
            (".XML", ConfigFormat::Xml),
            ("yml", ConfigFormat::Yaml),
            ("Yaml", ConfigFormat::Yaml),
            ("toml", ConfigFormat::Toml),
            ("ini", ConfigFormat::Ini),
        ] {
            assert_eq!(registry.get(ext).unwrap().format(), format);
        }
        assert!(registry.get("cfg").is_none());
        assert!(!registry.supports("cfg"));
    }

    #[test]
    fn test_for_path() {
        let registry = CodecRegistry::with_defaults(NoOpLogger::shared());
        let codec = registry.for_path(Path::new("/srv/app/db.TOML")).unwrap();
        assert_eq!(codec.format(), ConfigFormat::Toml);

        let err = registry.for_path(Path::new("/srv/app/db.hcl")).err().expect("expected error for .hcl");
        assert_eq!(err.to_string(), "No codec registered for extension 'hcl'");
        assert_eq!(err.code(), 6);
        assert!(registry.for_path(Path::new("/srv/app/Makefile")).is_err());
    }

    #[test]
    fn test_builder() {
        let registry = CodecRegistry::builder()
            .register(".cfg", Arc::new(IniCodec::default()))
            .register_format(Arc::new(JsonCodec::default()))
            .build();
        assert_eq!(registry.extensions(), vec!["cfg", "json"]);
        assert_eq!(registry.get("CFG").unwrap().format(), ConfigFormat::Ini);
    }

    #[test]
    fn test_settings_aliases() {
        let mut settings = CodecSettings::default();
        settings.extensions.insert(".conf".to_string(), ConfigFormat::Ini);
        settings.extensions.insert("json5".to_string(), ConfigFormat::Json);
        let registry = CodecRegistry::from_settings(&settings, NoOpLogger::shared());
        assert_eq!(registry.get("conf").unwrap().format(), ConfigFormat::Ini);
        assert_eq!(registry.get("json5").unwrap().format(), ConfigFormat::Json);
        assert!(registry.get("json").is_some());
    }

    #[test]
    fn test_load_and_save_by_extension() {
        let dir = tempdir().unwrap();
        let registry = CodecRegistry::with_defaults(NoOpLogger::shared());
        let tree = ConfigTree::new("app.yaml").with_items(vec![ConfigNode::integer("retries", 3)]);

        let path = dir.path().join("app.yaml");
        registry.save(&path, &tree).unwrap();
        let loaded = registry.load(&path).unwrap();
        assert!(tree.structurally_eq(&loaded));

        let err = registry.save(&dir.path().join("app.cfg"), &tree).unwrap_err();
        assert!(matches!(err, CodecError::UnknownFormat(_)));
    }
}
