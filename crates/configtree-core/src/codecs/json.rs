//! JSON codec

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use super::meta::{emit_entries, lift_entries, warn_dropped_list_meta};
use super::traits::ConfigCodec;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::log_debug;
use crate::types::scalar::{format_float, parse_bool};
use crate::types::{ConfigNode, ConfigTree, NodePath, NodeType};

/// JSON codec
///
/// The document root must be an object. Arrays become lists whose members
/// are named by their index (`"0"`, `"1"`, ...).
pub struct JsonCodec {
    pretty: bool,
    logger: SharedLogger,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(NoOpLogger::shared())
    }
}

impl JsonCodec {
    /// Create a JSON codec that pretty-prints on save
    pub fn new(logger: SharedLogger) -> Self {
        Self { pretty: true, logger }
    }

    /// Toggle pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn build_children(&self, map: &Map<String, Value>, path: &NodePath) -> CodecResult<Vec<ConfigNode>> {
        let entries = map.iter().map(|(k, v)| (k.clone(), v)).collect();
        lift_entries(
            entries,
            path,
            self.logger.as_ref(),
            |name, value, child_path| self.build_node(name, value, child_path),
            read_meta,
        )
    }

    fn build_node(&self, name: &str, value: &Value, path: &NodePath) -> CodecResult<ConfigNode> {
        let node = match value {
            Value::Object(map) => ConfigNode::category(name, self.build_children(map, path)?),
            Value::Array(items) => {
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.build_node(&i.to_string(), item, &path.index(i)))
                    .collect::<CodecResult<Vec<_>>>()?;
                ConfigNode::list(name, children)
            }
            Value::String(s) => ConfigNode::string(name, s.as_str()),
            Value::Number(n) => number_node(name, n),
            Value::Bool(b) => ConfigNode::boolean(name, *b),
            Value::Null => ConfigNode::null(name),
        };
        Ok(node)
    }

    fn build_object(&self, nodes: &[ConfigNode], path: &NodePath) -> CodecResult<Map<String, Value>> {
        let entries = emit_entries(
            ConfigFormat::Json,
            nodes,
            path,
            |node, child_path| self.build_value(node, child_path),
            |meta| {
                Value::Object(
                    meta.iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                )
            },
        )?;
        Ok(entries.into_iter().collect())
    }

    fn build_value(&self, node: &ConfigNode, path: &NodePath) -> CodecResult<Value> {
        let value = match node.node_type {
            NodeType::Category => Value::Object(self.build_object(&node.children, path)?),
            NodeType::List => {
                let mut items = Vec::with_capacity(node.children.len());
                for (i, child) in node.children.iter().enumerate() {
                    let child_path = path.index(i);
                    warn_dropped_list_meta(self.logger.as_ref(), child, &child_path);
                    items.push(self.build_value(child, &child_path)?);
                }
                Value::Array(items)
            }
            NodeType::String | NodeType::Datetime => Value::String(node.value.clone()),
            NodeType::Integer => match node.value.parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(e) => match node.value.parse::<u64>() {
                    Ok(u) => Value::from(u),
                    Err(_) => return Err(CodecError::value(path, node.node_type, &node.value, e)),
                },
            },
            NodeType::Unsigned => {
                let u = node
                    .value
                    .parse::<u64>()
                    .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?;
                Value::from(u)
            }
            NodeType::Float => {
                let f = node
                    .value
                    .parse::<f64>()
                    .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?;
                Number::from_f64(f).map(Value::Number).ok_or_else(|| {
                    CodecError::value(path, node.node_type, &node.value, "JSON cannot represent non-finite numbers")
                })?
            }
            NodeType::Bool => parse_bool(&node.value)
                .map(Value::Bool)
                .ok_or_else(|| CodecError::value(path, node.node_type, &node.value, "expected true or false"))?,
            NodeType::Null => Value::Null,
        };
        Ok(value)
    }
}

fn number_node(name: &str, n: &Number) -> ConfigNode {
    if let Some(i) = n.as_i64() {
        ConfigNode::integer(name, i)
    } else if let Some(u) = n.as_u64() {
        ConfigNode::scalar(name, NodeType::Integer, u.to_string())
    } else {
        ConfigNode::scalar(name, NodeType::Float, format_float(n.as_f64().unwrap_or_default()))
    }
}

fn read_meta(value: &Value, path: &NodePath) -> CodecResult<BTreeMap<String, String>> {
    let Value::Object(map) = value else {
        return Err(CodecError::shape(path, "metadata entry must be an object"));
    };
    map.iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(CodecError::shape(path, format!("metadata value '{}' must be a scalar", k)))
                }
            };
            Ok((k.clone(), text))
        })
        .collect()
}

impl ConfigCodec for JsonCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Json
    }

    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let doc: Value = serde_json::from_str(content).map_err(|e| CodecError::syntax(ConfigFormat::Json, e))?;
        let root = NodePath::root();
        let Value::Object(map) = doc else {
            return Err(CodecError::shape(&root, "root must be a JSON object"));
        };

        let items = self.build_children(&map, &root)?;
        log_debug!(self.logger, "Parsed JSON '{}' with {} top-level entries", configuration, items.len());
        Ok(ConfigTree::new(configuration).with_items(items))
    }

    fn render(&self, tree: &ConfigTree) -> CodecResult<String> {
        tree.validate()?;
        let root = Value::Object(self.build_object(&tree.items, &NodePath::root())?);
        let mut text = if self.pretty {
            serde_json::to_string_pretty(&root)
        } else {
            serde_json::to_string(&root)
        }
        .map_err(|e| CodecError::syntax(ConfigFormat::Json, e))?;
        text.push('\n');
        log_debug!(self.logger, "Rendered JSON '{}' with {} top-level entries", tree.configuration, tree.items.len());
        Ok(text)
    }
}
