use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::dom_tree::{Document, Handle, Node};
use crate::parser::attributes::parse_class_tokens;

/// Lookup tables used to narrow down selector candidates.
///
/// Built once per pass. Only `class` and `style` change during a pass and
/// classes are only ever removed, so the class index can go stale in the
/// direction of returning too many candidates, never too few; every
/// candidate is still checked against the live attributes by the matcher.
#[derive(Debug, Default)]
pub struct DomIndices {
    /// Every element, in document order.
    pub elements: Vec<Handle>,
    /// Maps an element's "id" attribute to the nodes carrying it (duplicates happen in the wild).
    pub id_map: HashMap<String, Vec<Handle>>,
    /// Maps a class name to all nodes that have that class.
    pub class_map: HashMap<String, Vec<Handle>>,
    /// Maps a lowercase tag name (e.g., "div") to all nodes with that tag.
    pub tag_map: HashMap<String, Vec<Handle>>,
    positions: HashMap<usize, usize>,
}

impl DomIndices {
    /// Build the indices for the entire document.
    pub fn build(document: &Document) -> Self {
        let mut indices = DomIndices::default();
        for node in document.elements() {
            indices.insert(node);
        }
        log::trace!(
            "indexed {} elements ({} ids, {} classes, {} tags)",
            indices.elements.len(),
            indices.id_map.len(),
            indices.class_map.len(),
            indices.tag_map.len()
        );
        indices
    }

    fn insert(&mut self, node: Handle) {
        if let Node::Element(elem) = &*node.borrow() {
            self.positions
                .insert(Self::key(&node), self.elements.len());

            // Index by tag (store tag names in lowercase for case-insensitive matching)
            self.tag_map
                .entry(elem.tag.to_ascii_lowercase())
                .or_default()
                .push(Rc::clone(&node));

            if let Some(id_value) = elem.attr("id") {
                self.id_map
                    .entry(id_value.to_string())
                    .or_default()
                    .push(Rc::clone(&node));
            }

            if let Some(class_attr) = elem.attr("class") {
                for class in parse_class_tokens(class_attr) {
                    self.class_map
                        .entry(class)
                        .or_default()
                        .push(Rc::clone(&node));
                }
            }
        }
        self.elements.push(node);
    }

    fn key(node: &Handle) -> usize {
        Rc::as_ptr(node) as usize
    }

    /// Document position of an indexed element.
    pub fn position(&self, node: &Handle) -> Option<usize> {
        self.positions.get(&Self::key(node)).copied()
    }
}
