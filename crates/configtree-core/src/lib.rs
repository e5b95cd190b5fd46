//! ConfigTree Core
//!
//! One canonical configuration tree and five format codecs (JSON, XML, YAML,
//! TOML, INI) converting between it and files on disk.
//!
//! ## Layout
//!
//! - `types`: `ConfigTree`, `ConfigNode`, `NodeType` and the `Outcome` envelope
//! - `codecs`: the `ConfigCodec` trait and one codec per format
//! - `registry`: extension → codec lookup
//! - `settings`: codec options, optionally read from a YAML settings file
//! - `store`: service-scoped files with uid checks, locking and backups
//! - `logging`: injectable logger used by all of the above
//!
//! ```rust
//! use configtree_core::{ConfigCodec, JsonCodec, TomlCodec, NodeType};
//!
//! let tree = JsonCodec::default()
//!     .parse(r#"{"server":{"port":8080,"%port":{"unit":"tcp"}}}"#, "app.json")
//!     .unwrap();
//! let port = tree.item("server").unwrap().child("port").unwrap();
//! assert_eq!(port.node_type, NodeType::Integer);
//! assert_eq!(port.meta["unit"], "tcp");
//!
//! // Same tree, different format
//! let toml = TomlCodec::default().render(&tree).unwrap();
//! assert!(toml.contains("port = 8080"));
//! ```

pub mod types;
pub mod logging;
pub mod codecs;
pub mod registry;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use types::{ConfigNode, ConfigTree, NodePath, NodeType, Outcome, DEFAULT_UID};

pub use codecs::{
    create_codec, CodecError, CodecResult, ConfigCodec, ConfigFormat,
    IniCodec, JsonCodec, TomlCodec, XmlCodec, YamlCodec,
};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger, SharedLogger};

pub use registry::{CodecRegistry, CodecRegistryBuilder};

pub use settings::{CodecSettings, SettingsFile};

pub use store::{ConfigStore, ServiceScope};
