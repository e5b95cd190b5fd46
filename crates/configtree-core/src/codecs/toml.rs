//! TOML codec
//!
//! Tables walk like JSON objects, including `%name` sidecars. TOML integers
//! are signed, so `unsigned` nodes get a `"%%name" = "unsigned"` type hint next
//! to them and values above `i64::MAX` are written as decimal strings. The hint
//! key cannot clash with a node or its `%name` sidecar.

use std::collections::{BTreeMap, HashMap};

use chrono::SecondsFormat;
use toml::value::Datetime;
use toml::{Table, Value};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use super::meta::{check_entry_name, lift_entries, meta_key, warn_dropped_list_meta};
use super::traits::ConfigCodec;
use crate::{log_debug, log_warn};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::types::scalar::{format_bool, format_float, format_utc, parse_bool, parse_offset_datetime};
use crate::types::{ConfigNode, ConfigTree, NodePath, NodeType};

/// Key prefix of a type hint entry
pub const TYPE_HINT_PREFIX: &str = "%%";

/// Name given to array members
pub const LIST_ITEM: &str = "li";

/// TOML codec
pub struct TomlCodec {
    pretty: bool,
    logger: SharedLogger,
}

impl Default for TomlCodec {
    fn default() -> Self {
        Self::new(NoOpLogger::shared())
    }
}

impl TomlCodec {
    pub fn new(logger: SharedLogger) -> Self {
        Self { pretty: true, logger }
    }

    /// Toggle multi-line arrays on save
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn build_children(&self, table: &Table, path: &NodePath) -> CodecResult<Vec<ConfigNode>> {
        let mut hints: HashMap<&str, &Value> = HashMap::new();
        let mut entries = Vec::with_capacity(table.len());
        for (key, value) in table {
            match key.strip_prefix(TYPE_HINT_PREFIX) {
                Some(target) => {
                    hints.insert(target, value);
                }
                None => entries.push((key.clone(), value)),
            }
        }

        let mut nodes = lift_entries(
            entries,
            path,
            self.logger.as_ref(),
            |name, value, child_path| self.build_node(name, value, child_path),
            read_meta,
        )?;
        for node in &mut nodes {
            if let Some(hint) = hints.remove(node.name.as_str()) {
                apply_type_hint(node, hint, &path.key(&node.name))?;
            }
        }
        for target in hints.keys() {
            log_warn!(
                self.logger,
                "Dropping type hint '{}{}' at {}: no entry named '{}'",
                TYPE_HINT_PREFIX,
                target,
                path,
                target
            );
        }
        Ok(nodes)
    }

    fn build_node(&self, name: &str, value: &Value, path: &NodePath) -> CodecResult<ConfigNode> {
        let node = match value {
            Value::Table(table) => ConfigNode::category(name, self.build_children(table, path)?),
            Value::Array(items) => {
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.build_node(LIST_ITEM, item, &path.index(i)))
                    .collect::<CodecResult<Vec<_>>>()?;
                ConfigNode::list(name, children)
            }
            Value::String(s) => ConfigNode::string(name, s.as_str()),
            Value::Integer(i) => ConfigNode::integer(name, *i),
            Value::Float(f) => ConfigNode::float(name, *f),
            Value::Boolean(b) => ConfigNode::boolean(name, *b),
            Value::Datetime(dt) => ConfigNode::datetime(name, datetime_text(dt)),
        };
        Ok(node)
    }

    fn build_table(&self, nodes: &[ConfigNode], path: &NodePath) -> CodecResult<Table> {
        let mut table = Table::new();
        for node in nodes {
            let child_path = path.key(&node.name);
            check_entry_name(ConfigFormat::Toml, &node.name, &child_path)?;

            let value = self.build_value(node, &child_path)?;
            table.insert(node.name.clone(), value);

            if !node.meta.is_empty() {
                let sidecar: Table = node
                    .meta
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                table.insert(meta_key(&node.name), Value::Table(sidecar));
            }
            if node.node_type == NodeType::Unsigned {
                table.insert(
                    format!("{}{}", TYPE_HINT_PREFIX, node.name),
                    Value::String(NodeType::Unsigned.to_string()),
                );
            }
        }
        Ok(table)
    }

    fn build_value(&self, node: &ConfigNode, path: &NodePath) -> CodecResult<Value> {
        let value = match node.node_type {
            NodeType::Category => Value::Table(self.build_table(&node.children, path)?),
            NodeType::List => {
                let mut items = Vec::with_capacity(node.children.len());
                for (i, child) in node.children.iter().enumerate() {
                    let child_path = path.index(i);
                    warn_dropped_list_meta(self.logger.as_ref(), child, &child_path);
                    let item = match child.node_type {
                        NodeType::Unsigned => list_unsigned(child, &child_path)?,
                        _ => self.build_value(child, &child_path)?,
                    };
                    items.push(item);
                }
                Value::Array(items)
            }
            NodeType::String => Value::String(node.value.clone()),
            NodeType::Integer => node
                .value
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?,
            NodeType::Unsigned => {
                let u = parse_unsigned(node, path)?;
                match i64::try_from(u) {
                    Ok(i) => Value::Integer(i),
                    Err(_) => Value::String(u.to_string()),
                }
            }
            NodeType::Float => node
                .value
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))?,
            NodeType::Bool => parse_bool(&node.value)
                .map(Value::Boolean)
                .ok_or_else(|| CodecError::value(path, node.node_type, &node.value, "expected true or false"))?,
            NodeType::Datetime => Value::Datetime(parse_datetime(node, path)?),
            NodeType::Null => {
                return Err(CodecError::unsupported(
                    ConfigFormat::Toml,
                    path,
                    "TOML has no null value",
                ))
            }
        };
        Ok(value)
    }
}

impl ConfigCodec for TomlCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Toml
    }

    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let table = content
            .parse::<Table>()
            .map_err(|e| CodecError::syntax(ConfigFormat::Toml, e))?;
        let items = self.build_children(&table, &NodePath::root())?;
        log_debug!(self.logger, "Parsed TOML '{}' with {} top-level items", configuration, items.len());
        Ok(ConfigTree::new(configuration).with_items(items))
    }

    fn render(&self, tree: &ConfigTree) -> CodecResult<String> {
        tree.validate()?;
        let table = self.build_table(&tree.items, &NodePath::root())?;
        let text = if self.pretty {
            toml::to_string_pretty(&table)
        } else {
            toml::to_string(&table)
        }
        .map_err(|e| CodecError::syntax(ConfigFormat::Toml, e))?;
        log_debug!(self.logger, "Rendered TOML '{}'", tree.configuration);
        Ok(text)
    }
}

/// Offset and local date-times become UTC timestamps, bare dates and times
/// keep their TOML text
fn datetime_text(dt: &Datetime) -> String {
    let text = dt.to_string();
    if dt.offset.is_some() || (dt.date.is_some() && dt.time.is_some()) {
        if let Some(parsed) = parse_offset_datetime(&text) {
            return format_utc(parsed);
        }
    }
    text
}

fn parse_datetime(node: &ConfigNode, path: &NodePath) -> CodecResult<Datetime> {
    let text = match parse_offset_datetime(&node.value) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => node.value.clone(),
    };
    text.parse::<Datetime>()
        .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))
}

fn parse_unsigned(node: &ConfigNode, path: &NodePath) -> CodecResult<u64> {
    node.value
        .parse::<u64>()
        .map_err(|e| CodecError::value(path, node.node_type, &node.value, e))
}

/// Array members have no sidecar to carry the type hint
fn list_unsigned(node: &ConfigNode, path: &NodePath) -> CodecResult<Value> {
    let u = parse_unsigned(node, path)?;
    i64::try_from(u).map(Value::Integer).map_err(|_| {
        CodecError::unsupported(
            ConfigFormat::Toml,
            path,
            format!("unsigned list member {} does not fit a TOML integer", u),
        )
    })
}

/// Retype a node from its `%%name` hint
fn apply_type_hint(node: &mut ConfigNode, hint: &Value, path: &NodePath) -> CodecResult<()> {
    let hint = match hint {
        Value::String(s) => s.as_str(),
        _ => return Err(CodecError::shape(path, "type hint must be a string")),
    };
    match hint.parse::<NodeType>() {
        Ok(NodeType::Unsigned) if matches!(node.node_type, NodeType::Integer | NodeType::String) => {
            node.value
                .parse::<u64>()
                .map_err(|e| CodecError::value(path, NodeType::Unsigned, &node.value, e))?;
            node.node_type = NodeType::Unsigned;
            Ok(())
        }
        _ => Err(CodecError::shape(
            path,
            format!("type hint '{}' does not apply to a {} value", hint, node.node_type),
        )),
    }
}

fn read_meta(value: &Value, path: &NodePath) -> CodecResult<BTreeMap<String, String>> {
    let Value::Table(table) = value else {
        return Err(CodecError::shape(path, "metadata must be a table of scalars"));
    };
    table
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                Value::Integer(i) => i.to_string(),
                Value::Float(f) => format_float(*f),
                Value::Boolean(b) => format_bool(*b).to_string(),
                Value::Datetime(dt) => dt.to_string(),
                Value::Array(_) | Value::Table(_) => {
                    return Err(CodecError::shape(path, "metadata values must be scalars"))
                }
            };
            Ok((k.clone(), text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn parse(text: &str) -> ConfigTree {
        TomlCodec::default().parse(text, "test.toml").unwrap()
    }

    fn round_trip(tree: &ConfigTree) -> ConfigTree {
        let codec = TomlCodec::default();
        let text = codec.render(tree).unwrap();
        codec.parse(&text, "test.toml").unwrap()
    }

    #[test]
    fn test_integer_scenario() {
        let tree = parse("port = 8080\n");
        assert_eq!(tree.items.len(), 1);
        let port = &tree.items[0];
        assert_eq!(port.name, "port");
        assert_eq!(port.node_type, NodeType::Integer);
        assert_eq!(port.value, "8080");
    }

    #[test]
    fn test_tables_and_sidecars() {
        let tree = parse("[server]\nport = 8080\n\"%port\" = { unit = \"tcp\", weight = 2 }\n");
        let server = tree.item("server").unwrap();
        assert_eq!(server.node_type, NodeType::Category);
        assert_eq!(server.children.len(), 1);
        let port = server.child("port").unwrap();
        assert_eq!(port.meta.get("unit").map(String::as_str), Some("tcp"));
        assert_eq!(port.meta.get("weight").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_arrays_become_lists() {
        let tree = parse("hosts = [\"a\", \"b\"]\n\n[[backends]]\nname = \"x\"\n\n[[backends]]\nname = \"y\"\n");
        let hosts = tree.item("hosts").unwrap();
        assert_eq!(hosts.node_type, NodeType::List);
        assert!(hosts.children.iter().all(|c| c.name == LIST_ITEM));

        let backends = tree.item("backends").unwrap();
        assert_eq!(backends.node_type, NodeType::List);
        assert_eq!(backends.children[1].child("name").unwrap().value, "y");
    }

    #[test]
    fn test_datetimes() {
        let tree = parse(
            "odt = 1979-05-27T07:32:00-08:00\nldt = 1979-05-27T07:32:00\nld = 1979-05-27\nlt = 07:32:00\n",
        );
        let values: Vec<&str> = tree.items.iter().map(|n| n.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["1979-05-27T15:32:00Z", "1979-05-27T07:32:00Z", "1979-05-27", "07:32:00"]
        );
        assert!(tree.items.iter().all(|n| n.node_type == NodeType::Datetime));
        assert!(tree.structurally_eq(&round_trip(&tree)));
    }

    #[test]
    fn test_unsigned_round_trip() {
        let tree = ConfigTree::new("t.toml").with_items(vec![
            ConfigNode::unsigned("big", u64::MAX),
            ConfigNode::unsigned("small", 7).with_meta("unit", "ms"),
        ]);
        let text = TomlCodec::default().render(&tree).unwrap();
        assert!(text.contains("big = \"18446744073709551615\""));

        let again = round_trip(&tree);
        assert!(tree.structurally_eq(&again));
        let small = again.item("small").unwrap();
        assert_eq!(small.node_type, NodeType::Unsigned);
        assert_eq!(small.meta.len(), 1);
    }

    #[test]
    fn test_type_coverage() {
        let tree = ConfigTree::new("t.toml").with_items(vec![
            ConfigNode::string("s", "2024-01-01"),
            ConfigNode::string("e", ""),
            ConfigNode::integer("i", i64::MIN),
            ConfigNode::float("f", 0.125),
            ConfigNode::boolean("b", false),
            ConfigNode::datetime("d", "2024-02-29T12:00:00Z"),
            ConfigNode::list("l", vec![ConfigNode::integer(LIST_ITEM, 1), ConfigNode::string(LIST_ITEM, "two")]),
            ConfigNode::category(
                "c",
                vec![ConfigNode::category("deep", vec![ConfigNode::string("x", "y").with_meta("k", "v")])],
            ),
        ]);
        assert!(tree.structurally_eq(&round_trip(&tree)));
    }

    #[test]
    fn test_extreme_floats_use_exponent_text() {
        let tree = parse("big = 1e300\ntiny = -2.5e-9\n");
        assert_eq!(tree.item("big").unwrap().value, "1e300");
        assert_eq!(tree.item("tiny").unwrap().value, "-2.5e-9");
        assert!(tree.structurally_eq(&round_trip(&tree)));
    }

    #[test]
    fn test_list_order_is_preserved() {
        let children = (1..=5).map(|i| ConfigNode::integer(i.to_string(), i)).collect();
        let tree = ConfigTree::new("t.toml").with_items(vec![ConfigNode::list("l", children)]);
        let again = round_trip(&tree);
        let values: Vec<&str> = again.items[0].children.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_null_is_unsupported() {
        let tree = ConfigTree::new("t.toml").with_items(vec![ConfigNode::null("n")]);
        let err = TomlCodec::default().render(&tree).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported structure for TOML at n: TOML has no null value");
    }

    #[test]
    fn test_save_time_value_errors() {
        let codec = TomlCodec::default();
        for node in [
            ConfigNode::scalar("i", NodeType::Integer, "18446744073709551615"),
            ConfigNode::scalar("u", NodeType::Unsigned, "-1"),
            ConfigNode::scalar("f", NodeType::Float, "fast"),
            ConfigNode::scalar("d", NodeType::Datetime, "yesterday"),
        ] {
            let tree = ConfigTree::new("t.toml").with_items(vec![node]);
            assert_eq!(codec.render(&tree).unwrap_err().code(), 4);
        }
    }

    #[test]
    fn test_oversized_unsigned_list_member() {
        let tree = ConfigTree::new("t.toml").with_items(vec![ConfigNode::list(
            "l",
            vec![ConfigNode::unsigned(LIST_ITEM, u64::MAX)],
        )]);
        assert!(matches!(
            TomlCodec::default().render(&tree),
            Err(CodecError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_type_is_ordinary_meta() {
        let tree = parse("name = \"x\"\n\"%name\" = { Type = \"string\" }\n");
        let name = tree.item("name").unwrap();
        assert_eq!(name.node_type, NodeType::String);
        assert_eq!(name.meta.get("Type").map(String::as_str), Some("string"));

        let tree = ConfigTree::new("t.toml").with_items(vec![
            ConfigNode::integer("retries", 3).with_meta("Type", "count"),
            ConfigNode::unsigned("limit", 9).with_meta("Type", "unsigned"),
        ]);
        let again = round_trip(&tree);
        assert!(tree.structurally_eq(&again));
        let retries = again.item("retries").unwrap();
        assert_eq!(retries.node_type, NodeType::Integer);
        assert_eq!(retries.meta.get("Type").map(String::as_str), Some("count"));
        let limit = again.item("limit").unwrap();
        assert_eq!(limit.node_type, NodeType::Unsigned);
        assert_eq!(limit.meta.get("Type").map(String::as_str), Some("unsigned"));
    }

    #[test]
    fn test_type_hint_entry() {
        let text = TomlCodec::default()
            .render(&ConfigTree::new("t.toml").with_items(vec![ConfigNode::unsigned("small", 7)]))
            .unwrap();
        assert!(text.contains("\"%%small\" = \"unsigned\""), "{}", text);
        assert!(!text.contains("\"%small\""), "{}", text);
    }

    #[test]
    fn test_bad_type_hint() {
        let err = TomlCodec::default()
            .parse("a = true\n\"%%a\" = \"unsigned\"\n", "t.toml")
            .unwrap_err();
        assert!(matches!(err, CodecError::Shape { .. }));
    }

    #[test]
    fn test_orphan_type_hint_is_dropped() {
        let logger = Arc::new(MemoryLogger::new());
        let tree = TomlCodec::new(logger.clone())
            .parse("a = 1\n\"%%ghost\" = \"unsigned\"\n", "t.toml")
            .unwrap();
        assert_eq!(tree.items.len(), 1);
        assert_eq!(tree.items[0].node_type, NodeType::Integer);
        assert!(logger.contains(LogLevel::Warn, "%%ghost"));
    }

    #[test]
    fn test_syntax_error() {
        let err = TomlCodec::default().parse("a = = 1\n", "t.toml").unwrap_err();
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn test_load_and_save_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[db]\nport = 5432\nhost = \"localhost\"\n").unwrap();

        let codec = TomlCodec::default();
        let tree = codec.load(&path).unwrap();
        assert_eq!(tree.configuration, "app.toml");
        codec.save(&path, &tree).unwrap();
        assert!(tree.structurally_eq(&codec.load(&path).unwrap()));
    }
}
