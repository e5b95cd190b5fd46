//! XML codec
//!
//! Elements map to nodes, attributes to meta. The reserved `Type` attribute
//! carries the node type of scalar elements; list members are `<li>` elements.

use std::collections::BTreeMap;
use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use super::traits::ConfigCodec;
use crate::logging::{NoOpLogger, SharedLogger};
use crate::{log_debug, log_warn};
use crate::types::{ConfigNode, ConfigTree, NodePath, NodeType};

/// Attribute holding the node type
pub const TYPE_ATTRIBUTE: &str = "Type";

/// Element name of list members
pub const LIST_ITEM: &str = "li";

/// Root element used when a tree has several top-level items
pub const XML_ROOT_ELEMENT: &str = "Config";

/// Parsed element, before classification
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

/// XML codec
///
/// The document element is the single top-level node of the tree.
pub struct XmlCodec {
    root_element: String,
    indent: usize,
    declaration: bool,
    logger: SharedLogger,
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new(NoOpLogger::shared())
    }
}

impl XmlCodec {
    /// Create an XML codec with two-space indentation and an XML declaration
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            root_element: XML_ROOT_ELEMENT.to_string(),
            indent: 2,
            declaration: true,
            logger,
        }
    }

    /// Element wrapping several top-level items
    pub fn with_root_element(mut self, name: impl Into<String>) -> Self {
        self.root_element = name.into();
        self
    }

    /// Indentation width, `0` for compact output
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Toggle the `<?xml ...?>` declaration
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    fn write_node(
        &self,
        writer: &mut Writer<Vec<u8>>,
        node: &ConfigNode,
        element: &str,
        path: &NodePath,
    ) -> CodecResult<()> {
        check_element_name(element, path)?;
        if node.meta.contains_key(TYPE_ATTRIBUTE) {
            return Err(CodecError::unsupported(
                ConfigFormat::Xml,
                path,
                format!("meta key '{}' is reserved for the node type", TYPE_ATTRIBUTE),
            ));
        }

        let mut start = BytesStart::new(element);
        let write_type = match node.node_type {
            NodeType::String => false,
            NodeType::Category | NodeType::List => node.children.is_empty(),
            _ => true,
        };
        if write_type {
            start.push_attribute((TYPE_ATTRIBUTE, node.node_type.as_str()));
        }
        for (key, value) in &node.meta {
            check_element_name(key, path)?;
            start.push_attribute((key.as_str(), value.as_str()));
        }

        match node.node_type {
            NodeType::Category | NodeType::List if !node.children.is_empty() => {
                let is_list = node.node_type == NodeType::List;
                if !is_list && node.children.iter().all(|c| c.name == LIST_ITEM) {
                    return Err(CodecError::unsupported(
                        ConfigFormat::Xml,
                        path,
                        format!("a category whose children are all named '{}' reads back as a list", LIST_ITEM),
                    ));
                }
                writer.write_event(Event::Start(start.borrow())).map_err(write_error)?;
                for (i, child) in node.children.iter().enumerate() {
                    if is_list {
                        self.write_node(writer, child, LIST_ITEM, &path.index(i))?;
                    } else {
                        self.write_node(writer, child, &child.name, &path.key(&child.name))?;
                    }
                }
                writer.write_event(Event::End(BytesEnd::new(element))).map_err(write_error)?;
            }
            _ if node.value.is_empty() || node.node_type == NodeType::Null => {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            }
            _ => {
                writer.write_event(Event::Start(start.borrow())).map_err(write_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&node.value)))
                    .map_err(write_error)?;
                writer.write_event(Event::End(BytesEnd::new(element))).map_err(write_error)?;
            }
        }
        Ok(())
    }
}

impl ConfigCodec for XmlCodec {
    fn format(&self) -> ConfigFormat {
        ConfigFormat::Xml
    }

    fn parse(&self, content: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let root = read_document(content)?;
        let item = build_node(&root, &NodePath::root().key(&root.name))?;
        log_debug!(self.logger, "Parsed XML '{}' with root element <{}>", configuration, root.name);
        Ok(ConfigTree::new(configuration).with_items(vec![item]))
    }

    fn render(&self, tree: &ConfigTree) -> CodecResult<String> {
        tree.validate()?;
        let root = NodePath::root();

        let mut writer = if self.indent > 0 {
            Writer::new_with_indent(Vec::new(), b' ', self.indent)
        } else {
            Writer::new(Vec::new())
        };
        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
                .map_err(write_error)?;
        }

        match tree.items.as_slice() {
            [] => {
                return Err(CodecError::unsupported(
                    ConfigFormat::Xml,
                    &root,
                    "an XML document needs at least one top-level item",
                ))
            }
            [item] => self.write_node(&mut writer, item, &item.name, &root.key(&item.name))?,
            items => {
                log_warn!(
                    self.logger,
                    "Wrapping {} top-level items of '{}' in <{}>",
                    items.len(),
                    tree.configuration,
                    self.root_element
                );
                let wrapper = ConfigNode::category(self.root_element.clone(), items.to_vec());
                self.write_node(&mut writer, &wrapper, &self.root_element, &root)?;
            }
        }

        let mut text = String::from_utf8(writer.into_inner()).map_err(write_error)?;
        text.push('\n');
        log_debug!(self.logger, "Rendered XML '{}'", tree.configuration);
        Ok(text)
    }
}

fn write_error(e: impl Display) -> CodecError {
    CodecError::syntax(ConfigFormat::Xml, e)
}

fn read_document(content: &str) -> CodecResult<Element> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            CodecError::syntax(ConfigFormat::Xml, format!("{} (at byte {})", e, reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => stack.push(read_element(&start)?),
            Event::Empty(start) => {
                let element = read_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CodecError::syntax(ConfigFormat::Xml, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| CodecError::syntax(ConfigFormat::Xml, e))?;
                    top.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(CodecError::syntax(
            ConfigFormat::Xml,
            format!("element <{}> is never closed", open.name),
        ));
    }
    root.ok_or_else(|| CodecError::syntax(ConfigFormat::Xml, "document has no root element"))
}

fn read_element(start: &BytesStart<'_>) -> CodecResult<Element> {
    let name = utf8(start.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CodecError::syntax(ConfigFormat::Xml, e))?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| CodecError::syntax(ConfigFormat::Xml, e))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> CodecResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(CodecError::syntax(ConfigFormat::Xml, "document has more than one root element"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> CodecResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| CodecError::syntax(ConfigFormat::Xml, e))
}

fn build_node(element: &Element, path: &NodePath) -> CodecResult<ConfigNode> {
    let mut declared = None;
    let mut meta = BTreeMap::new();
    for (key, value) in &element.attributes {
        if key == TYPE_ATTRIBUTE {
            let node_type = value
                .parse::<NodeType>()
                .map_err(|e| CodecError::shape(path, e.to_string()))?;
            declared = Some(node_type);
        } else {
            meta.insert(key.clone(), value.clone());
        }
    }

    let mut node = if element.children.is_empty() {
        match declared.unwrap_or(NodeType::String) {
            NodeType::Category => ConfigNode::category(&element.name, Vec::new()),
            NodeType::List => ConfigNode::list(&element.name, Vec::new()),
            NodeType::Null => ConfigNode::null(&element.name),
            NodeType::String => ConfigNode::string(&element.name, element.text.as_str()),
            other => ConfigNode::scalar(&element.name, other, element.text.trim()),
        }
    } else {
        if let Some(t) = declared.filter(|t| t.is_scalar()) {
            return Err(CodecError::shape(
                path,
                format!("element with child elements cannot have {}=\"{}\"", TYPE_ATTRIBUTE, t),
            ));
        }
        if element.children.iter().all(|c| c.name == LIST_ITEM) {
            let children = element
                .children
                .iter()
                .enumerate()
                .map(|(i, child)| build_node(child, &path.index(i)))
                .collect::<CodecResult<Vec<_>>>()?;
            ConfigNode::list(&element.name, children)
        } else {
            let mut children = Vec::with_capacity(element.children.len());
            for child in &element.children {
                let child_path = path.key(&child.name);
                if children.iter().any(|c: &ConfigNode| c.name == child.name) {
                    return Err(CodecError::shape(
                        &child_path,
                        format!("duplicate element <{}>; list members must be <{}> elements", child.name, LIST_ITEM),
                    ));
                }
                children.push(build_node(child, &child_path)?);
            }
            ConfigNode::category(&element.name, children)
        }
    };
    node.meta = meta;
    Ok(node)
}

/// Reject names that cannot be element or attribute names
fn check_element_name(name: &str, path: &NodePath) -> CodecResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CodecError::unsupported(
            ConfigFormat::Xml,
            path,
            format!("'{}' is not a valid XML name", name),
        ))
    }
}
