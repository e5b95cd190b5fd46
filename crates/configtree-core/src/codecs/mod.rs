//! Format codecs
//!
//! Each codec converts between one on-disk format and the canonical
//! `ConfigTree`.
//!
//! ## Metadata
//!
//! JSON, YAML and TOML carry a node's meta map as a sibling entry keyed
//! `%<name>`. XML carries it as element attributes, with `Type` reserved for
//! the node type. INI has no metadata channel.
//!
//! ## List members
//!
//! JSON names list members by index (`"0"`, `"1"`, ...); XML, YAML and TOML
//! name them `li`. The names carry no meaning and are ignored by
//! `ConfigTree::structurally_eq`.

mod error;
mod format;
mod traits;
mod meta;
mod json;
mod xml;
mod yaml;
mod toml;
mod ini;

pub use error::{CodecError, CodecResult};
pub use format::{normalize_extension, ConfigFormat};
pub use traits::{configuration_name, ConfigCodec};
pub use meta::{meta_key, META_PREFIX};

pub use self::ini::IniCodec;
pub use self::json::JsonCodec;
pub use self::toml::TomlCodec;
pub use self::xml::{XmlCodec, XML_ROOT_ELEMENT};
pub use self::yaml::YamlCodec;

use crate::logging::SharedLogger;

/// Create a codec with default options for the given format
pub fn create_codec(format: ConfigFormat, logger: SharedLogger) -> Box<dyn ConfigCodec> {
    match format {
        ConfigFormat::Json => Box::new(JsonCodec::new(logger)),
        ConfigFormat::Xml => Box::new(XmlCodec::new(logger)),
        ConfigFormat::Yaml => Box::new(YamlCodec::new(logger)),
        ConfigFormat::Toml => Box::new(TomlCodec::new(logger)),
        ConfigFormat::Ini => Box::new(IniCodec::new(logger)),
    }
}
