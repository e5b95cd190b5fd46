//! Canonical tree types
//!
//! Every codec converts its native document to and from these types.

mod node;
mod tree;
mod path;
mod outcome;
pub mod scalar;

pub use node::{ConfigNode, NodeType, UnknownNodeType};
pub use tree::{ConfigTree, DEFAULT_UID};
pub use path::NodePath;
pub use outcome::{Outcome, SUCCESS_CODE};
