//! Document tree, traversal traits and debug dump

pub mod dump;
pub mod nodes;
pub mod visitor;

pub use dump::TreeDump;
pub use nodes::*;
pub use visitor::{walk_document, walk_section, Visitor, VisitorMut};
