//! Emoji DOM - Document Object Model
//!
//! Generational arena DOM tree. Node ids carry the generation of their slot,
//! so an id held after its node was removed never aliases a newer node.

mod node;
mod tree;
mod document;
mod observer;
mod serialize;

pub use node::{Node, NodeData, ElementData, Attribute};
pub use tree::{DomTree, DomError, DomResult};
pub use document::Document;
pub use observer::{MutationObserver, MutationRecord};
pub use serialize::{Serialized, TextSpan, escape_text, escape_attr};

/// Node identifier (arena slot plus slot generation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at allocation time
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Elements whose text content is serialized without escaping
pub const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Elements that never have an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];
