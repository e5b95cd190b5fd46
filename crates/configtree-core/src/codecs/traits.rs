//! Codec trait definition

use std::fs;
use std::path::Path;

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use crate::types::ConfigTree;

/// Load/save capability for one on-disk format
///
/// Codecs hold no per-call state and can be shared across threads.
/// Implementations provide the text-level `parse` / `render` pair; the
/// file-level `load` / `save` are built on top of them.
///
/// # Example
///
/// ```
/// use configtree_core::{ConfigCodec, JsonCodec};
///
/// let codec = JsonCodec::default();
/// let tree = codec.parse(r#"{"debug": true}"#, "app.json").unwrap();
/// assert_eq!(tree.items[0].value, "true");
/// ```
pub trait ConfigCodec: Send + Sync {
    /// Format handled by this codec
    fn format(&self) -> ConfigFormat;

    /// Codec name (e.g. "json", "yaml")
    fn name(&self) -> &str {
        self.format().as_str()
    }

    /// Convert document text into a fresh tree named `configuration`
    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree>;

    /// Convert a tree into document text
    fn render(&self, tree: &ConfigTree) -> CodecResult<String>;

    /// Read and parse a file
    ///
    /// The tree's `configuration` is the file name.
    fn load(&self, path: &Path) -> CodecResult<ConfigTree> {
        let content = fs::read_to_string(path).map_err(|e| CodecError::io(path, e))?;
        self.parse(&content, &configuration_name(path))
    }

    /// Render a tree and write it over `path`
    fn save(&self, path: &Path, tree: &ConfigTree) -> CodecResult<()> {
        let content = self.render(tree)?;
        fs::write(path, content).map_err(|e| CodecError::io(path, e))
    }
}

/// Logical configuration name of a file (its file name)
pub fn configuration_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_name() {
        assert_eq!(configuration_name(Path::new("/srv/app/db.toml")), "db.toml");
        assert_eq!(configuration_name(Path::new("/")), "");
    }
}
