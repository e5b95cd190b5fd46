//! Configuration tree root

use serde::{Deserialize, Serialize};

use super::node::{check_unique_names, keyed_eq, ConfigNode};
use super::path::NodePath;

/// Identifier given to trees the collaborator has not assigned one to yet
pub const DEFAULT_UID: &str = "00000000000000000000000000000000";

/// Root container of a parsed configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    /// Logical name of the document (the file name after a load)
    #[serde(rename = "config", default)]
    pub configuration: String,

    /// Opaque identifier owned by the caller; codecs never rewrite it
    #[serde(default = "default_uid")]
    pub uid: String,

    /// Top-level entries in source order
    #[serde(default)]
    pub items: Vec<ConfigNode>,
}

fn default_uid() -> String {
    DEFAULT_UID.to_string()
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new("")
    }
}

impl ConfigTree {
    /// Create an empty tree with the default uid
    pub fn new(configuration: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            uid: default_uid(),
            items: Vec::new(),
        }
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Replace the top-level items
    pub fn with_items(mut self, items: Vec<ConfigNode>) -> Self {
        self.items = items;
        self
    }

    /// Find a top-level item by name
    pub fn item(&self, name: &str) -> Option<&ConfigNode> {
        self.items.iter().find(|n| n.name == name)
    }

    /// Check the tree invariants
    ///
    /// Top-level items behave like the children of a category.
    pub fn validate(&self) -> Result<(), (NodePath, String)> {
        let root = NodePath::root();
        check_unique_names(&self.items, &root)?;
        for item in &self.items {
            item.validate(&root.key(&item.name))?;
        }
        Ok(())
    }

    /// Structural equality of the item sets, ignoring `configuration` and `uid`
    pub fn structurally_eq(&self, other: &ConfigTree) -> bool {
        keyed_eq(&self.items, &other.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    #[test]
    fn test_new_tree_has_default_uid() {
        let tree = ConfigTree::new("app.json");
        assert_eq!(tree.uid, DEFAULT_UID);
        assert!(tree.items.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let tree = ConfigTree::new("app.json")
            .with_uid("abc")
            .with_items(vec![ConfigNode::integer("port", 8080).with_meta("unit", "tcp")]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["config"], "app.json");
        assert_eq!(json["uid"], "abc");
        assert_eq!(json["items"][0]["type"], "integer");
        assert_eq!(json["items"][0]["value"], "8080");
        assert_eq!(json["items"][0]["meta"]["unit"], "tcp");
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let tree: ConfigTree = serde_json::from_str(
            r#"{"config":"x.ini","items":[{"name":"a","type":"category","children":[{"name":"k","type":"string","value":"v"}]}]}"#,
        )
        .unwrap();
        assert_eq!(tree.uid, DEFAULT_UID);
        let a = tree.item("a").unwrap();
        assert_eq!(a.node_type, NodeType::Category);
        assert_eq!(a.child("k").unwrap().value, "v");
        assert!(a.meta.is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_items() {
        let tree = ConfigTree::new("x").with_items(vec![
            ConfigNode::string("a", "1"),
            ConfigNode::string("a", "2"),
        ]);
        let (path, _) = tree.validate().unwrap_err();
        assert_eq!(path.to_string(), "a");
    }

    #[test]
    fn test_structural_equality_ignores_identity_fields() {
        let a = ConfigTree::new("a.json").with_items(vec![ConfigNode::boolean("on", true)]);
        let b = ConfigTree::new("b.yaml")
            .with_uid("other")
            .with_items(vec![ConfigNode::boolean("on", true)]);
        assert!(a.structurally_eq(&b));
    }
}
