//! Codec option structures

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codecs::{
    normalize_extension, ConfigCodec, ConfigFormat, IniCodec, JsonCodec, TomlCodec, XmlCodec, YamlCodec,
    XML_ROOT_ELEMENT,
};
use crate::logging::SharedLogger;

/// Options for every codec plus extra extension aliases
///
/// Every field has a default, so a settings file only lists what it changes:
///
/// ```yaml
/// xml:
///   root_element: Settings
/// extensions:
///   conf: ini
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CodecSettings {
    pub json: JsonSettings,
    pub xml: XmlSettings,
    pub toml: TomlSettings,

    /// Extra extension → format mappings (`conf: ini`)
    pub extensions: BTreeMap<String, ConfigFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSettings {
    /// Indent output
    pub pretty: bool,
}

impl Default for JsonSettings {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlSettings {
    /// Element wrapping several top-level items
    pub root_element: String,
    /// Indentation width, `0` for compact output
    pub indent: usize,
    /// Write the `<?xml ...?>` declaration
    pub declaration: bool,
}

impl Default for XmlSettings {
    fn default() -> Self {
        Self {
            root_element: XML_ROOT_ELEMENT.to_string(),
            indent: 2,
            declaration: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlSettings {
    /// Multi-line arrays
    pub pretty: bool,
}

impl Default for TomlSettings {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl CodecSettings {
    /// Build the codec of a format with these options applied
    pub fn build_codec(&self, format: ConfigFormat, logger: SharedLogger) -> Arc<dyn ConfigCodec> {
        match format {
            ConfigFormat::Json => Arc::new(JsonCodec::new(logger).with_pretty(self.json.pretty)),
            ConfigFormat::Xml => Arc::new(
                XmlCodec::new(logger)
                    .with_root_element(self.xml.root_element.clone())
                    .with_indent(self.xml.indent)
                    .with_declaration(self.xml.declaration),
            ),
            ConfigFormat::Yaml => Arc::new(YamlCodec::new(logger)),
            ConfigFormat::Toml => Arc::new(TomlCodec::new(logger).with_pretty(self.toml.pretty)),
            ConfigFormat::Ini => Arc::new(IniCodec::new(logger)),
        }
    }

    /// Extension aliases with normalized keys
    pub fn aliases(&self) -> impl Iterator<Item = (String, ConfigFormat)> + '_ {
        self.extensions
            .iter()
            .map(|(ext, format)| (normalize_extension(ext), *format))
    }
}
