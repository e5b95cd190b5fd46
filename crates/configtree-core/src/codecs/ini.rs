//! INI codec
//!
//! Sections map to top-level categories, settings to `string` children.
//! INI has no types, no nesting and no metadata channel, so saving anything
//! else fails instead of flattening it.
//!
//! Values are escaped on save, and wrapped in double quotes when the reader
//! would otherwise trim or unquote them.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use ini::{EscapePolicy, Ini, WriteOption};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use super::traits::{configuration_name, ConfigCodec};
use crate::log_debug;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::{ConfigNode, ConfigTree, NodePath, NodeType};

/// INI codec
pub struct IniCodec {
    logger: SharedLogger,
}

impl Default for IniCodec {
    fn default() -> Self {
        Self::new(NoOpLogger::shared())
    }
}

impl IniCodec {
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }
}

impl ConfigCodec for IniCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Ini
    }

    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let ini = Ini::load_from_str(content).map_err(|e| CodecError::syntax(ConfigFormat::Ini, e))?;
        let root = NodePath::root();
        let mut items: Vec<ConfigNode> = Vec::new();

        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                for (key, value) in properties.iter() {
                    upsert(&mut items, ConfigNode::string(key, value));
                }
                continue;
            };

            let index = match items.iter().position(|n| n.name == section) {
                Some(i) if items[i].node_type == NodeType::Category => i,
                Some(_) => {
                    return Err(CodecError::shape(
                        &root.key(section),
                        format!("section [{}] collides with a setting of the same name", section),
                    ))
                }
                None => {
                    items.push(ConfigNode::category(section, Vec::new()));
                    items.len() - 1
                }
            };
            for (key, value) in properties.iter() {
                upsert(&mut items[index].children, ConfigNode::string(key, value));
            }
        }

        log_debug!(self.logger, "Parsed INI '{}' with {} top-level items", configuration, items.len());
        Ok(ConfigTree::new(configuration).with_items(items))
    }

    fn render(&self, tree: &ConfigTree) -> CodecResult<String> {
        tree.validate()?;
        let root = NodePath::root();
        let mut ini = Ini::new();

        for item in &tree.items {
            let path = root.key(&item.name);
            check_representable(item, &path)?;
            match item.node_type {
                NodeType::String => {
                    ini.with_general_section().set(item.name.as_str(), encode_value(&item.value));
                }
                NodeType::Category => {
                    check_name(&item.name, &path, &[']'])?;
                    ini.with_section(Some(item.name.as_str()));
                    for child in &item.children {
                        let child_path = path.key(&child.name);
                        check_representable(child, &child_path)?;
                        if child.node_type != NodeType::String {
                            return Err(CodecError::unsupported(ConfigFormat::Ini, &child_path, nested_message(child)));
                        }
                        ini.with_section(Some(item.name.as_str()))
                            .set(child.name.as_str(), encode_value(&child.value));
                    }
                }
                _ => return Err(CodecError::unsupported(ConfigFormat::Ini, &path, nested_message(item))),
            }
        }

        let mut buffer = Vec::new();
        let options = WriteOption {
            escape_policy: EscapePolicy::Nothing,
            ..WriteOption::default()
        };
        ini.write_to_opt(&mut buffer, options)
            .map_err(|e| CodecError::syntax(ConfigFormat::Ini, e))?;
        log_debug!(self.logger, "Rendered INI '{}'", tree.configuration);
        String::from_utf8(buffer).map_err(|e| CodecError::syntax(ConfigFormat::Ini, e))
    }

    /// A missing file reads as an empty configuration
    fn load(&self, path: &Path) -> CodecResult<ConfigTree> {
        let configuration = configuration_name(path);
        match fs::read_to_string(path) {
            Ok(content) => self.parse(&content, &configuration),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log_debug!(self.logger, "INI file {} does not exist, using an empty tree", path.display());
                Ok(ConfigTree::new(configuration))
            }
            Err(e) => Err(CodecError::io(path, e)),
        }
    }
}

fn upsert(nodes: &mut Vec<ConfigNode>, node: ConfigNode) {
    match nodes.iter_mut().find(|n| n.name == node.name) {
        Some(existing) => *existing = node,
        None => nodes.push(node),
    }
}

/// Escape a value so the reader returns it unchanged
fn encode_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            ';' | '#' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    let needs_quotes = value.trim() != value || value.starts_with(['"', '\'']) || value.ends_with(['"', '\'']);
    if needs_quotes {
        format!("\"{}\"", escaped)
    } else {
        escaped
    }
}

fn check_representable(node: &ConfigNode, path: &NodePath) -> CodecResult<()> {
    if !node.meta.is_empty() {
        return Err(CodecError::unsupported(ConfigFormat::Ini, path, "metadata has no INI form"));
    }
    if node.node_type == NodeType::String {
        check_name(&node.name, path, &['=', ':'])?;
    }
    Ok(())
}

fn check_name(name: &str, path: &NodePath, forbidden: &[char]) -> CodecResult<()> {
    let valid = !name.trim().is_empty()
        && name.trim() == name
        && !name.starts_with(['[', ';', '#'])
        && !name.contains(forbidden)
        && !name.contains(['\n', '\r', '\\', '"']);
    if valid {
        Ok(())
    } else {
        Err(CodecError::unsupported(
            ConfigFormat::Ini,
            path,
            format!("'{}' cannot be written as an INI name", name),
        ))
    }
}

fn nested_message(node: &ConfigNode) -> String {
    match node.node_type {
        NodeType::Category => "nested category".to_string(),
        NodeType::List => "list".to_string(),
        other => format!("{} value; INI holds strings only", other),
    }
}
