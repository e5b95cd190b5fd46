//! `%name` sidecar convention shared by the JSON, YAML and TOML codecs
//!
//! A node's meta map travels as a sibling entry whose key is the node's name
//! prefixed with `%`. Sidecars never become nodes themselves.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::error::{CodecError, CodecResult};
use super::format::ConfigFormat;
use crate::logging::Logger;
use crate::log_warn;
use crate::types::{ConfigNode, NodePath};

pub const META_PREFIX: char = '%';

/// Sidecar key of a node name
pub fn meta_key(name: &str) -> String {
    format!("{}{}", META_PREFIX, name)
}

/// Walk the entries of a native mapping, lifting sidecars into `meta`
///
/// `build` converts a regular entry into a node, `read_meta` converts a
/// sidecar value into a meta map. Sidecars without a sibling are dropped with
/// a warning.
pub(crate) fn lift_entries<'a, V: 'a>(
    entries: Vec<(String, &'a V)>,
    path: &NodePath,
    logger: &dyn Logger,
    mut build: impl FnMut(&str, &'a V, &NodePath) -> CodecResult<ConfigNode>,
    mut read_meta: impl FnMut(&'a V, &NodePath) -> CodecResult<BTreeMap<String, String>>,
) -> CodecResult<Vec<ConfigNode>> {
    let mut sidecars: HashMap<String, &'a V> = HashMap::new();
    let mut names: HashSet<&str> = HashSet::new();
    for (key, value) in &entries {
        match key.strip_prefix(META_PREFIX) {
            Some(target) => {
                sidecars.insert(target.to_string(), *value);
            }
            None => {
                names.insert(key.as_str());
            }
        }
    }

    for target in sidecars.keys() {
        if !names.contains(target.as_str()) {
            log_warn!(logger, "Dropping metadata '{}' at {}: no entry named '{}'", meta_key(target), path, target);
        }
    }

    let mut nodes = Vec::with_capacity(names.len());
    for (key, value) in &entries {
        if key.starts_with(META_PREFIX) {
            continue;
        }
        let child_path = path.key(key);
        let mut node = build(key, *value, &child_path)?;
        if let Some(sidecar) = sidecars.get(key.as_str()) {
            node.meta = read_meta(*sidecar, &child_path)?;
        }
        nodes.push(node);
    }
    Ok(nodes)
}

/// Emit map-like siblings, each followed by its sidecar when it has meta
pub(crate) fn emit_entries<V>(
    format: ConfigFormat,
    nodes: &[ConfigNode],
    path: &NodePath,
    mut emit: impl FnMut(&ConfigNode, &NodePath) -> CodecResult<V>,
    mut emit_meta: impl FnMut(&BTreeMap<String, String>) -> V,
) -> CodecResult<Vec<(String, V)>> {
    let mut entries = Vec::with_capacity(nodes.len());
    for node in nodes {
        let child_path = path.key(&node.name);
        check_entry_name(format, &node.name, &child_path)?;
        let value = emit(node, &child_path)?;
        entries.push((node.name.clone(), value));
        if !node.meta.is_empty() {
            entries.push((meta_key(&node.name), emit_meta(&node.meta)));
        }
    }
    Ok(entries)
}

/// Names starting with `%` would read back as sidecars
pub(crate) fn check_entry_name(format: ConfigFormat, name: &str, path: &NodePath) -> CodecResult<()> {
    if name.starts_with(META_PREFIX) {
        return Err(CodecError::unsupported(
            format,
            path,
            format!("key '{}' collides with the metadata prefix '{}'", name, META_PREFIX),
        ));
    }
    Ok(())
}

/// Warn about meta on list members, which has no sidecar slot
pub(crate) fn warn_dropped_list_meta(logger: &dyn Logger, node: &ConfigNode, path: &NodePath) {
    if !node.meta.is_empty() {
        log_warn!(logger, "Dropping metadata of list member at {}: lists carry no sidecars", path);
    }
}
