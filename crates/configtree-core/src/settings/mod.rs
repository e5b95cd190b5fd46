//! Codec settings
//!
//! Options that shape codec output, plus extension aliases:
//! - `CodecSettings`: the settings themselves, all fields defaulted
//! - `SettingsFile`: YAML file-backed settings (user or workspace level)

mod codec;
mod error;
mod file;

pub use codec::{CodecSettings, JsonSettings, TomlSettings, XmlSettings};
pub use error::{SettingsError, SettingsResult};
pub use file::{SettingsFile, SettingsLevel};
