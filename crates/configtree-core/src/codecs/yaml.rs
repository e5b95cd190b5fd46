//! YAML codec
//!
//! Mappings walk like JSON objects, including `%name` sidecars. Scalars keep
//! the type YAML resolves for them; plain strings that read as a date or
//! timestamp become `datetime`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Number, Value};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use super::meta::{emit_entries, lift_entries, warn_dropped_list_meta};
use super::traits::ConfigCodec;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::scalar::{format_bool, format_float, is_datetime, parse_bool};
use crate::types::{ConfigNode, ConfigTree, NodePath, NodeType};
use crate::{log_debug, log_warn};

/// Local tag pinning a scalar to `string`
pub const STRING_TAG: &str = "str";

/// Name given to sequence members
pub const LIST_ITEM: &str = "li";

/// YAML codec
///
/// Every document of a multi-document stream is read; their top-level
/// mappings are merged in order.
pub struct YamlCodec {
    logger: SharedLogger,
}

impl Default for YamlCodec {
    fn default() -> Self {
        Self::new(NoOpLogger::shared())
    }
}

impl YamlCodec {
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }

    fn build_children(&self, mapping: &Mapping, path: &NodePath) -> CodecResult<Vec<ConfigNode>> {
        let entries = mapping
            .iter()
            .map(|(k, v)| Ok((key_text(k, path)?, v)))
            .collect::<CodecResult<Vec<_>>>()?;
        lift_entries(
            entries,
            path,
            self.logger.as_ref(),
            |name, value, child_path| self.build_node(name, value, child_path),
            |value, meta_path| read_meta(value, meta_path),
        )
    }

    fn build_node(&self, name: &str, value: &Value, path: &NodePath) -> CodecResult<ConfigNode> {
        let node = match value {
            Value::Mapping(mapping) => ConfigNode::category(name, self.build_children(mapping, path)?),
            Value::Sequence(items) => {
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.build_node(LIST_ITEM, item, &path.index(i)))
                    .collect::<CodecResult<Vec<_>>>()?;
                ConfigNode::list(name, children)
            }
            Value::Null => ConfigNode::null(name),
            Value::Bool(b) => ConfigNode::boolean(name, *b),
            Value::Number(n) => number_node(name, n),
            Value::String(s) if is_datetime(s) => ConfigNode::datetime(name, s.as_str()),
            Value::String(s) => ConfigNode::string(name, s.as_str()),
            Value::Tagged(tagged) => match &tagged.value {
                Value::String(s) if tagged.tag == STRING_TAG => ConfigNode::string(name, s.as_str()),
                inner => {
                    log_debug!(self.logger, "Ignoring tag {} at {}", tagged.tag, path);
                    self.build_node(name, inner, path)?
                }
            },
        };
        Ok(node)
    }

    fn build_mapping(&self, nodes: &[ConfigNode], path: &NodePath) -> CodecResult<Mapping> {
        let entries = emit_entries(
            ConfigFormat::Yaml,
            nodes,
            path,
            |node, child_path| self.build_value(node, child_path),
            |meta| {
                Value::Mapping(
                    meta.iter()
                        .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                        .collect(),
                )
            },
        )?;
        Ok(entries
            .into_iter()
            .map(|(k, v)| (Value::String(k), v))
            .collect())
    }

    fn build_value(&self, node: &ConfigNode, path: &NodePath) -> CodecResult<Value> {
        let value = match node.node_type {
            NodeType::Category => Value::Mapping(self.build_mapping(&node.children, path)?),
            NodeType::List => {
                let mut items = Vec::with_capacity(node.children.len());
                for (i, child) in node.children.iter().enumerate() {
                    let child_path = path.index(i);
                    warn_dropped_list_meta(self.logger.as_ref(), child, &child_path);
                    items.push(self.build_value(child, &child_path)?);
                }
                Value::Sequence(items)
            }
            // A plain scalar that reads as a timestamp would come back as datetime
            NodeType::String if is_datetime(&node.value) => Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(STRING_TAG),
                value: Value::String(node.value.clone()),
            })),
            NodeType::String | NodeType::Datetime => Value::String(node.value.clone()),
            NodeType::Integer => match node.value.parse::<i64>() {
                Ok(i) => Value::Number(i.into()),
                Err(e) => match node.value.parse::<u64>() {
                    Ok(u) => Value::Number(u.into()),
                    Err(_) => return Err(CodecError::value(path, node.node_type, &node.value, e)),
                },
            },
            NodeType::Unsigned => {
                let u = node
                    .value
                    .parse::<u64>()
                    .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?;
                Value::Number(u.into())
            }
            NodeType::Float => {
                let f = node
                    .value
                    .parse::<f64>()
                    .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?;
                Value::Number(f.into())
            }
            NodeType::Bool => parse_bool(&node.value)
                .map(Value::Bool)
                .ok_or_else(|| CodecError::value(path, node.node_type, &node.value, "expected true or false"))?,
            NodeType::Null => Value::Null,
        };
        Ok(value)
    }
}

impl ConfigCodec for YamlCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Yaml
    }

    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let root = NodePath::root();
        let mut items: Vec<ConfigNode> = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let mut value = Value::deserialize(document).map_err(|e| CodecError::syntax(ConfigFormat::Yaml, e))?;
            value
                .apply_merge()
                .map_err(|e| CodecError::syntax(ConfigFormat::Yaml, e))?;

            let mapping = match value {
                Value::Mapping(mapping) => mapping,
                Value::Null => continue,
                other => {
                    log_warn!(
                        self.logger,
                        "Skipping document {} of '{}': top level is a {} rather than a mapping",
                        index,
                        configuration,
                        value_kind(&other)
                    );
                    continue;
                }
            };

            for node in self.build_children(&mapping, &root)? {
                if let Some(existing) = items.iter_mut().find(|n| n.name == node.name) {
                    log_warn!(self.logger, "Key '{}' of '{}' is redefined by document {}", node.name, configuration, index);
                    *existing = node;
                } else {
                    items.push(node);
                }
            }
        }

        log_debug!(self.logger, "Parsed YAML '{}' with {} top-level items", configuration, items.len());
        Ok(ConfigTree::new(configuration).with_items(items))
    }

    fn render(&self, tree: &ConfigTree) -> CodecResult<String> {
        tree.validate()?;
        let mapping = self.build_mapping(&tree.items, &NodePath::root())?;
        let text = serde_yaml::to_string(&Value::Mapping(mapping))
            .map_err(|e| CodecError::syntax(ConfigFormat::Yaml, e))?;
        log_debug!(self.logger, "Rendered YAML '{}'", tree.configuration);
        Ok(text)
    }
}

fn number_node(name: &str, n: &Number) -> ConfigNode {
    if let Some(i) = n.as_i64() {
        ConfigNode::integer(name, i)
    } else if let Some(u) = n.as_u64() {
        ConfigNode::scalar(name, NodeType::Integer, u.to_string())
    } else {
        ConfigNode::scalar(name, NodeType::Float, format_float(n.as_f64().unwrap_or(f64::NAN)))
    }
}

fn key_text(key: &Value, path: &NodePath) -> CodecResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(format_bool(*b).to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Tagged(tagged) => key_text(&tagged.value, path),
        other => Err(CodecError::shape(
            path,
            format!("mapping keys must be scalars, found a {}", value_kind(other)),
        )),
    }
}

fn read_meta(value: &Value, path: &NodePath) -> CodecResult<BTreeMap<String, String>> {
    let Value::Mapping(mapping) = value else {
        return Err(CodecError::shape(path, "metadata must be a mapping of scalars"));
    };
    mapping
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_) => {
                    return Err(CodecError::shape(path, "metadata values must be scalars"))
                }
                Value::Null => String::new(),
                scalar => key_text(scalar, path)?,
            };
            Ok((key_text(k, path)?, text))
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn parse(text: &str) -> ConfigTree {
        YamlCodec::default().parse(text, "test.yaml").unwrap()
    }

    fn round_trip(tree: &ConfigTree) -> ConfigTree {
        let codec = YamlCodec::default();
        let text = codec.render(tree).unwrap();
        codec.parse(&text, "test.yaml").unwrap()
    }

    #[test]
    fn test_scalar_classification() {
        let tree = parse(
            "empty:\nnothing: ~\nflag: true\ncount: 42\nratio: 1.5\nwhen: 2024-01-01T10:00:00Z\nday: 2024-01-01\nname: web\nquoted: \"42\"\nblank: \"\"\n",
        );
        let kinds: Vec<(&str, NodeType)> = tree.items.iter().map(|n| (n.name.as_str(), n.node_type)).collect();
        assert_eq!(
            kinds,
            vec![
                ("empty", NodeType::Null),
                ("nothing", NodeType::Null),
                ("flag", NodeType::Bool),
                ("count", NodeType::Integer),
                ("ratio", NodeType::Float),
                ("when", NodeType::Datetime),
                ("day", NodeType::Datetime),
                ("name", NodeType::String),
                ("quoted", NodeType::String),
                ("blank", NodeType::String),
            ]
        );
        assert_eq!(tree.item("count").unwrap().value, "42");
        assert_eq!(tree.item("ratio").unwrap().value, "1.5");
    }

    #[test]
    fn test_metadata_lifting() {
        let tree = parse("server:\n  port: 8080\n  '%port':\n    unit: tcp\n    weight: 3\n");
        let server = tree.item("server").unwrap();
        assert_eq!(server.children.len(), 1);
        let port = server.child("port").unwrap();
        assert_eq!(port.node_type, NodeType::Integer);
        assert_eq!(port.meta.get("unit").map(String::as_str), Some("tcp"));
        assert_eq!(port.meta.get("weight").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_sequences_become_lists() {
        let tree = parse("hosts:\n  - a\n  - b\n  - port: 1\n");
        let hosts = tree.item("hosts").unwrap();
        assert_eq!(hosts.node_type, NodeType::List);
        assert!(hosts.children.iter().all(|c| c.name == LIST_ITEM));
        assert_eq!(hosts.children[2].node_type, NodeType::Category);
    }

    #[test]
    fn test_strings_that_look_typed_survive() {
        let tree = ConfigTree::new("t.yaml").with_items(vec![
            ConfigNode::string("a", "true"),
            ConfigNode::string("b", "8080"),
            ConfigNode::string("c", "2024-01-01"),
            ConfigNode::string("d", "null"),
            ConfigNode::string("e", ""),
            ConfigNode::string("f", "1.5"),
            ConfigNode::string("g", " 2024-01-01"),
        ]);
        let again = round_trip(&tree);
        assert!(tree.structurally_eq(&again));
    }

    #[test]
    fn test_padded_dates_stay_strings() {
        let tree = parse("a: ' 2024-01-01'\nb: \"2024-01-01 \"\nc: 2024-01-01\n");
        let types: Vec<NodeType> = tree.items.iter().map(|n| n.node_type).collect();
        assert_eq!(types, vec![NodeType::String, NodeType::String, NodeType::Datetime]);
        assert_eq!(tree.item("a").unwrap().value, " 2024-01-01");
    }

    #[test]
    fn test_type_coverage() {
        let tree = ConfigTree::new("t.yaml").with_items(vec![
            ConfigNode::integer("i", i64::MIN),
            ConfigNode::float("f", -0.25),
            ConfigNode::boolean("b", true),
            ConfigNode::null("n"),
            ConfigNode::datetime("d", "2024-02-29T12:00:00+02:00"),
            ConfigNode::category("c", vec![ConfigNode::string("x", "y").with_meta("k", "v")]),
            ConfigNode::list("l", Vec::new()),
            ConfigNode::category("empty", Vec::new()),
        ]);
        let again = round_trip(&tree);
        assert!(tree.structurally_eq(&again));
    }

    #[test]
    fn test_unsigned_reloads_as_integer() {
        let tree = ConfigTree::new("t.yaml").with_items(vec![ConfigNode::unsigned("u", u64::MAX)]);
        let again = round_trip(&tree);
        let u = again.item("u").unwrap();
        assert_eq!(u.node_type, NodeType::Integer);
        assert_eq!(u.value, u64::MAX.to_string());
    }

    #[test]
    fn test_list_order_is_preserved() {
        let children = (1..=5).map(|i| ConfigNode::integer(i.to_string(), i)).collect();
        let tree = ConfigTree::new("t.yaml").with_items(vec![ConfigNode::list("l", children)]);
        let again = round_trip(&tree);
        let values: Vec<&str> = again.items[0].children.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_multiple_documents_merge() {
        let logger = Arc::new(MemoryLogger::new());
        let codec = YamlCodec::new(logger.clone());
        let tree = codec
            .parse("a: 1\nb: 2\n---\n- skipped\n---\nb: 3\nc: 4\n", "multi.yaml")
            .unwrap();
        let names: Vec<&str> = tree.items.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(tree.item("b").unwrap().value, "3");
        assert!(logger.contains(LogLevel::Warn, "sequence"));
        assert!(logger.contains(LogLevel::Warn, "redefined"));
    }

    #[test]
    fn test_empty_stream_is_empty_tree() {
        assert!(parse("").items.is_empty());
        assert!(parse("# only a comment\n").items.is_empty());
    }

    #[test]
    fn test_merge_keys_are_applied() {
        let tree = parse("base: &base\n  retries: 3\nservice:\n  <<: *base\n  name: api\n");
        let service = tree.item("service").unwrap();
        assert_eq!(service.child("retries").unwrap().value, "3");
        assert!(service.child("<<").is_none());
    }

    #[test]
    fn test_non_scalar_key_is_shape_error() {
        let err = YamlCodec::default().parse("? [a, b]\n: 1\n", "t.yaml").unwrap_err();
        assert!(matches!(err, CodecError::Shape { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_syntax_error() {
        let err = YamlCodec::default().parse("a: [1, 2\n", "t.yaml").unwrap_err();
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn test_invalid_bool_fails_save() {
        let tree = ConfigTree::new("t.yaml").with_items(vec![ConfigNode::scalar("b", NodeType::Bool, "yes")]);
        let err = YamlCodec::default().render(&tree).unwrap_err();
        assert_eq!(err.to_string(), "Invalid bool value 'yes' at b: expected true or false");
    }

    #[test]
    fn test_load_and_save_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.yml");
        std::fs::write(&path, "server:\n  port: 8080\n  '%port':\n    unit: tcp\n").unwrap();

        let codec = YamlCodec::default();
        let tree = codec.load(&path).unwrap();
        assert_eq!(tree.configuration, "app.yml");
        codec.save(&path, &tree).unwrap();
        assert!(tree.structurally_eq(&codec.load(&path).unwrap()));
    }
}
