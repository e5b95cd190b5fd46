//! Configuration node types

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::path::NodePath;

/// Kind of a configuration node
///
/// Containers (`Category`, `List`) carry children, every other kind carries a
/// canonical string in `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Map of uniquely named children
    Category,
    /// Ordered sequence of children
    List,
    String,
    /// Signed 64-bit integer
    Integer,
    Float,
    /// Unsigned 64-bit integer
    Unsigned,
    Bool,
    Null,
    /// RFC3339 / ISO-8601 timestamp text
    Datetime,
}

impl NodeType {
    /// All node kinds, containers first
    pub const ALL: [NodeType; 9] = [
        NodeType::Category,
        NodeType::List,
        NodeType::String,
        NodeType::Integer,
        NodeType::Float,
        NodeType::Unsigned,
        NodeType::Bool,
        NodeType::Null,
        NodeType::Datetime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Category => "category",
            NodeType::List => "list",
            NodeType::String => "string",
            NodeType::Integer => "integer",
            NodeType::Float => "float",
            NodeType::Unsigned => "unsigned",
            NodeType::Bool => "bool",
            NodeType::Null => "null",
            NodeType::Datetime => "datetime",
        }
    }

    /// Whether nodes of this kind carry children instead of a value
    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::Category | NodeType::List)
    }

    /// Whether nodes of this kind carry a value instead of children
    pub fn is_scalar(&self) -> bool {
        !self.is_container()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a node kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node type '{0}'")]
pub struct UnknownNodeType(pub String);

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownNodeType(s.to_string()))
    }
}

/// A single entry of a configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    /// Key under which the node was found (positional placeholder for list members)
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Canonical scalar text, empty for containers and `null`
    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub children: Vec<ConfigNode>,

    /// Sidecar annotations (XML attributes, `%name` entries)
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl ConfigNode {
    fn empty(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            value: String::new(),
            children: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Create a category node
    pub fn category(name: impl Into<String>, children: Vec<ConfigNode>) -> Self {
        let mut node = Self::empty(name, NodeType::Category);
        node.children = children;
        node
    }

    /// Create a list node
    pub fn list(name: impl Into<String>, children: Vec<ConfigNode>) -> Self {
        let mut node = Self::empty(name, NodeType::List);
        node.children = children;
        node
    }

    /// Create a scalar node from already canonical text
    pub fn scalar(name: impl Into<String>, node_type: NodeType, value: impl Into<String>) -> Self {
        let mut node = Self::empty(name, node_type);
        node.value = value.into();
        node
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::scalar(name, NodeType::String, value)
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::scalar(name, NodeType::Integer, value.to_string())
    }

    pub fn unsigned(name: impl Into<String>, value: u64) -> Self {
        Self::scalar(name, NodeType::Unsigned, value.to_string())
    }

    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::scalar(name, NodeType::Float, super::scalar::format_float(value))
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::scalar(name, NodeType::Bool, if value { "true" } else { "false" })
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::empty(name, NodeType::Null)
    }

    pub fn datetime(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::scalar(name, NodeType::Datetime, value)
    }

    /// Add a meta entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Find a direct child by name, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut ConfigNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn is_container(&self) -> bool {
        self.node_type.is_container()
    }

    /// Check the node invariants recursively
    ///
    /// Returns the path of the first offending node and a description.
    pub fn validate(&self, path: &NodePath) -> Result<(), (NodePath, String)> {
        if self.node_type.is_container() {
            if !self.value.is_empty() {
                return Err((path.clone(), format!("{} node must not carry a value", self.node_type)));
            }
        } else if !self.children.is_empty() {
            return Err((path.clone(), format!("{} node must not have children", self.node_type)));
        }

        if self.node_type == NodeType::Category {
            check_unique_names(&self.children, path)?;
        }

        for (index, child) in self.children.iter().enumerate() {
            let child_path = match self.node_type {
                NodeType::List => path.index(index),
                _ => path.key(&child.name),
            };
            child.validate(&child_path)?;
        }
        Ok(())
    }

    /// Compare type, value, meta and children, ignoring category child order
    /// and list placeholder names
    pub fn structurally_eq(&self, other: &ConfigNode) -> bool {
        if self.node_type != other.node_type || self.value != other.value || self.meta != other.meta {
            return false;
        }
        match self.node_type {
            NodeType::List => {
                self.children.len() == other.children.len()
                    && self
                        .children
                        .iter()
                        .zip(&other.children)
                        .all(|(a, b)| a.structurally_eq(b))
            }
            _ => keyed_eq(&self.children, &other.children),
        }
    }
}

/// Reject duplicate names among map-like siblings
pub(crate) fn check_unique_names(nodes: &[ConfigNode], path: &NodePath) -> Result<(), (NodePath, String)> {
    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.name.as_str()) {
            return Err((path.key(&node.name), format!("duplicate key '{}'", node.name)));
        }
    }
    Ok(())
}

/// Order-insensitive comparison of map-like siblings
pub(crate) fn keyed_eq(a: &[ConfigNode], b: &[ConfigNode]) -> bool {
    a.len() == b.len()
        && a.iter().all(|left| {
            b.iter()
                .find(|right| right.name == left.name)
                .is_some_and(|right| left.structurally_eq(right))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_round_trips_through_str() {
        for t in NodeType::ALL {
            assert_eq!(t.as_str().parse::<NodeType>().unwrap(), t);
        }
        assert!("object".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_node_type_serde_names() {
        let json = serde_json::to_string(&NodeType::Datetime).unwrap();
        assert_eq!(json, "\"datetime\"");
        let parsed: NodeType = serde_json::from_str("\"unsigned\"").unwrap();
        assert_eq!(parsed, NodeType::Unsigned);
    }

    #[test]
    fn test_validate_rejects_scalar_with_children() {
        let mut node = ConfigNode::string("name", "x");
        node.children.push(ConfigNode::string("inner", "y"));
        let (path, msg) = node.validate(&NodePath::root().key("name")).unwrap_err();
        assert_eq!(path.to_string(), "name");
        assert!(msg.contains("children"));
    }

    #[test]
    fn test_validate_rejects_duplicate_category_keys() {
        let node = ConfigNode::category(
            "server",
            vec![ConfigNode::integer("port", 1), ConfigNode::integer("port", 2)],
        );
        let (path, msg) = node.validate(&NodePath::root().key("server")).unwrap_err();
        assert_eq!(path.to_string(), "server.port");
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn test_validate_allows_repeated_list_names() {
        let node = ConfigNode::list(
            "hosts",
            vec![ConfigNode::string("li", "a"), ConfigNode::string("li", "b")],
        );
        assert!(node.validate(&NodePath::root().key("hosts")).is_ok());
    }

    #[test]
    fn test_structural_equality_ignores_order_and_placeholders() {
        let a = ConfigNode::category(
            "root",
            vec![
                ConfigNode::integer("a", 1),
                ConfigNode::list("l", vec![ConfigNode::string("0", "x"), ConfigNode::string("1", "y")]),
            ],
        );
        let b = ConfigNode::category(
            "root",
            vec![
                ConfigNode::list("l", vec![ConfigNode::string("li", "x"), ConfigNode::string("li", "y")]),
                ConfigNode::integer("a", 1),
            ],
        );
        assert!(a.structurally_eq(&b));

        let c = ConfigNode::category(
            "root",
            vec![
                ConfigNode::integer("a", 1),
                ConfigNode::list("l", vec![ConfigNode::string("li", "y"), ConfigNode::string("li", "x")]),
            ],
        );
        assert!(!a.structurally_eq(&c));
    }

    #[test]
    fn test_meta_participates_in_equality() {
        let a = ConfigNode::integer("port", 80).with_meta("unit", "tcp");
        let b = ConfigNode::integer("port", 80);
        assert!(!a.structurally_eq(&b));
    }

    #[test]
    fn test_child_lookup_and_edit() {
        let mut server = ConfigNode::category(
            "server",
            vec![ConfigNode::string("host", "localhost"), ConfigNode::integer("port", 80)],
        );
        assert!(server.child("missing").is_none());
        assert!(server.child_mut("missing").is_none());

        if let Some(port) = server.child_mut("port") {
            port.value = "8080".to_string();
        }
        assert_eq!(server.child("port").unwrap().value, "8080");
        assert!(server.validate(&NodePath::root()).is_ok());
    }
}
