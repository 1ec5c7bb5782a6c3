use html5ever::{LocalName, Namespace, QualName};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub mod dom_tree {
    use super::*;

    /// Shared handle to a node in the tree.
    pub type Handle = Rc<RefCell<Node>>;

    /// Non-owning back pointer (element -> parent).
    pub type WeakHandle = Weak<RefCell<Node>>;

    #[derive(Debug, Clone)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        Text(String),
        Comment(String),
    }

    #[derive(Debug, Clone, Default)]
    pub struct DocumentRootNode {
        pub children: Vec<Handle>,
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        /// Attributes in source order. Names keep their namespace so foreign
        /// content (`xlink:href` and friends) serializes back unchanged.
        pub attributes: Vec<(QualName, String)>,
        pub children: Vec<Handle>,
        pub parent: Option<WeakHandle>,
    }

    /// How the source text was handed to the parser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ParseMode {
        /// A complete document (`<html>` present in the source).
        Document,
        /// A snippet parsed in a `<body>` context.
        Fragment,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: Handle,
        pub doctype: RefCell<Option<Doctype>>,
        pub mode: ParseMode,
    }

    #[derive(Debug)]
    pub struct Doctype {
        pub name: String,
        pub public_id: String,
        pub system_id: String,
    }

    impl Doctype {
        /// Text between `<!DOCTYPE ` and `>`, identifiers included.
        pub fn declaration(&self) -> String {
            match (self.public_id.is_empty(), self.system_id.is_empty()) {
                (true, true) => self.name.clone(),
                (true, false) => format!("{} SYSTEM \"{}\"", self.name, self.system_id),
                (false, true) => format!("{} PUBLIC \"{}\"", self.name, self.public_id),
                (false, false) => format!(
                    "{} PUBLIC \"{}\" \"{}\"",
                    self.name, self.public_id, self.system_id
                ),
            }
        }
    }

    impl DocumentRootNode {
        pub fn new() -> Self {
            DocumentRootNode {
                children: Vec::new(),
            }
        }
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: Vec::new(),
                children: Vec::new(),
                parent: None,
            }
        }

        /// Value of a non-namespaced attribute, if present.
        pub fn attr(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|(qual, _)| qual.ns.is_empty() && &*qual.local == name)
                .map(|(_, value)| value.as_str())
        }

        /// Overwrite (or append) a non-namespaced attribute, keeping its position.
        pub fn set_attr(&mut self, name: &str, value: String) {
            match self
                .attributes
                .iter_mut()
                .find(|(qual, _)| qual.ns.is_empty() && &*qual.local == name)
            {
                Some((_, slot)) => *slot = value,
                None => self.attributes.push((
                    QualName::new(None, Namespace::default(), LocalName::from(name)),
                    value,
                )),
            }
        }

        pub fn remove_attr(&mut self, name: &str) {
            self.attributes
                .retain(|(qual, _)| !(qual.ns.is_empty() && &*qual.local == name));
        }

        /// Concatenated text of the direct text children (the content of a `<style>`).
        pub fn text_content(&self) -> String {
            let mut out = String::new();
            for child in &self.children {
                if let Node::Text(text) = &*child.borrow() {
                    out.push_str(text);
                }
            }
            out
        }

        /// Replace every child with a single text node.
        pub fn set_text_content(&mut self, text: String) {
            self.children = vec![Rc::new(RefCell::new(Node::Text(text)))];
        }
    }

    impl Node {
        pub fn children(&self) -> &[Handle] {
            match self {
                Node::DocumentRoot(root) => &root.children,
                Node::Element(elem) => &elem.children,
                Node::Text(_) | Node::Comment(_) => &[],
            }
        }

        pub fn as_element(&self) -> Option<&ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        pub fn as_element_mut(&mut self) -> Option<&mut ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }
    }

    impl Document {
        /// Every element in document (pre-)order.
        pub fn elements(&self) -> Vec<Handle> {
            let mut out = Vec::new();
            collect_elements(&self.root, &mut out);
            out
        }

        /// The `<style>` elements in document order.
        pub fn style_elements(&self) -> Vec<Handle> {
            self.elements()
                .into_iter()
                .filter(|handle| {
                    handle
                        .borrow()
                        .as_element()
                        .is_some_and(|elem| elem.tag.eq_ignore_ascii_case("style"))
                })
                .collect()
        }
    }

    fn collect_elements(node: &Handle, out: &mut Vec<Handle>) {
        let node_ref = node.borrow();
        if matches!(&*node_ref, Node::Element(_)) {
            out.push(Rc::clone(node));
        }
        for child in node_ref.children() {
            collect_elements(child, out);
        }
    }

    pub fn new_document(mode: ParseMode) -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::new()))),
            doctype: RefCell::new(None),
            mode,
        }
    }
}
