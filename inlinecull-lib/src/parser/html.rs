//! Parsing HTML into the crate's DOM tree and serializing it back.
//!
//! html5ever does the tokenizing and tree construction; `InlineCullTreeSink`
//! builds the `crate::dom::dom_tree` structures it asks for. Serialization
//! goes back through html5ever's serializer so escaping rules (raw text in
//! `<style>`/`<script>`, attribute quoting) match what the parser accepted.

use crate::dom::dom_tree::{self, Handle, Node, ParseMode};
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink},
    local_name, namespace_url, ns, Attribute, LocalName, Namespace, ParseOpts, QualName,
};
use std::borrow::Cow;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// Parses the provided HTML into a DOM tree.
///
/// Sources that carry a doctype or an `<html>`, `<head>` or `<body>` tag are
/// parsed as full documents; anything else is treated as a snippet in a
/// `<body>` context so that serializing it again does not wrap it in a
/// synthesized `<html><head><body>` skeleton.
pub fn create_dom_tree(html_content: &str) -> dom_tree::Document {
    let mode = detect_mode(html_content);
    let tree_sink = InlineCullTreeSink::new(mode);
    match mode {
        ParseMode::Document => {
            html5ever::parse_document(tree_sink, ParseOpts::default()).one(html_content)
        }
        ParseMode::Fragment => html5ever::parse_fragment(
            tree_sink,
            ParseOpts::default(),
            QualName::new(None, ns!(html), local_name!("body")),
            Vec::new(),
        )
        .one(html_content),
    }
}

fn detect_mode(html_content: &str) -> ParseMode {
    let lowered = html_content.to_ascii_lowercase();
    let is_document = lowered.contains("<!doctype")
        || ["html", "head", "body"]
            .iter()
            .any(|tag| has_start_tag(&lowered, tag));
    if is_document {
        ParseMode::Document
    } else {
        ParseMode::Fragment
    }
}

/// `<head` must not match `<header`.
fn has_start_tag(lowered: &str, tag: &str) -> bool {
    let needle = format!("<{}", tag);
    lowered.match_indices(&needle).any(|(index, _)| {
        match lowered[index + needle.len()..].chars().next() {
            None => true,
            Some(next) => next == '>' || next == '/' || next.is_ascii_whitespace(),
        }
    })
}

/// Serializes a document produced by [`create_dom_tree`].
///
/// Fragment documents emit only the snippet's own nodes.
pub fn serialize_document(document: &dom_tree::Document) -> io::Result<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut bytes, &SerializableDocument(document), opts)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

struct SerializableDocument<'a>(&'a dom_tree::Document);

impl Serialize for SerializableDocument<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: &mut S,
        _traversal_scope: TraversalScope,
    ) -> io::Result<()> {
        let document = self.0;
        match document.mode {
            ParseMode::Document => {
                if let Some(doctype) = &*document.doctype.borrow() {
                    serializer.write_doctype(&doctype.declaration())?;
                }
                for child in document.root.borrow().children() {
                    serialize_node(child, serializer)?;
                }
            }
            ParseMode::Fragment => {
                // The fragment parser hangs everything off a synthetic <html> root.
                let root = document.root.borrow();
                for context in root.children() {
                    for child in context.borrow().children() {
                        serialize_node(child, serializer)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn serialize_node<S: Serializer>(node: &Handle, serializer: &mut S) -> io::Result<()> {
    match &*node.borrow() {
        Node::DocumentRoot(root) => {
            for child in &root.children {
                serialize_node(child, serializer)?;
            }
        }
        Node::Element(elem) => {
            serializer.start_elem(
                elem.qual_name.clone(),
                elem.attributes
                    .iter()
                    .map(|(name, value)| (name, value.as_str())),
            )?;
            for child in &elem.children {
                serialize_node(child, serializer)?;
            }
            serializer.end_elem(elem.qual_name.clone())?;
        }
        Node::Text(text) => serializer.write_text(text)?,
        Node::Comment(text) => serializer.write_comment(text)?,
    }
    Ok(())
}

/// A TreeSink building the crate's DOM tree for html5ever.
///
/// Element children keep a weak pointer to their parent so the tree builder's
/// re-parenting operations (foster parenting, adoption agency) can be honoured.
pub struct InlineCullTreeSink {
    document: dom_tree::Document,
}

impl InlineCullTreeSink {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            document: dom_tree::new_document(mode),
        }
    }
}

/// Owned element name handed back to the tree builder.
#[derive(Debug)]
pub struct CullElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for CullElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

fn into_node(child: NodeOrText<Handle>) -> Handle {
    match child {
        NodeOrText::AppendNode(node) => node,
        NodeOrText::AppendText(text) => Rc::new(RefCell::new(Node::Text(text.to_string()))),
    }
}

fn set_parent(child: &Handle, parent: &Handle) {
    if let Node::Element(elem) = &mut *child.borrow_mut() {
        elem.parent = Some(Rc::downgrade(parent));
    }
}

fn parent_of(node: &Handle) -> Option<Handle> {
    match &*node.borrow() {
        Node::Element(elem) => elem.parent.as_ref().and_then(|weak| weak.upgrade()),
        _ => None,
    }
}

fn children_mut(node: &mut Node) -> Option<&mut Vec<Handle>> {
    match node {
        Node::DocumentRoot(root) => Some(&mut root.children),
        Node::Element(elem) => Some(&mut elem.children),
        Node::Text(_) | Node::Comment(_) => None,
    }
}

/// Appends text to the node at `index - 1` when that node is text already.
fn merge_into_previous_text(children: &[Handle], index: usize, text: &str) -> bool {
    if index == 0 {
        return false;
    }
    if let Node::Text(existing) = &mut *children[index - 1].borrow_mut() {
        existing.push_str(text);
        return true;
    }
    false
}

impl TreeSink for InlineCullTreeSink {
    type Handle = Handle;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = CullElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {}", msg);
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match &*target.borrow() {
            Node::Element(elem) => CullElemName {
                ns: elem.qual_name.ns.clone(),
                local: elem.qual_name.local.clone(),
            },
            // The tree builder only asks for names of elements it created.
            _ => CullElemName {
                ns: ns!(),
                local: local_name!(""),
            },
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let mut element = dom_tree::ElementNode::new(name.local.to_string(), name);
        element.attributes = attrs
            .into_iter()
            .map(|attr| (attr.name, attr.value.to_string()))
            .collect();
        Rc::new(RefCell::new(Node::Element(element)))
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(Node::Comment(text.to_string())))
    }

    /// Processing instructions only exist in XML; keep the text so nothing is lost.
    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(Node::Comment(format!("?{} {}?", target, data))))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        if let NodeOrText::AppendText(text) = &child {
            let parent_ref = parent.borrow();
            let children = parent_ref.children();
            if merge_into_previous_text(children, children.len(), text) {
                return;
            }
        }
        let child = into_node(child);
        set_parent(&child, parent);
        if let Some(children) = children_mut(&mut parent.borrow_mut()) {
            children.push(child);
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if parent_of(element).is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        *self.document.doctype.borrow_mut() = Some(dom_tree::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
    }

    /// `<template>` contents live directly under the template element.
    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    /// Quirks mode only affects rendering, which this crate never does.
    fn set_quirks_mode(&self, mode: QuirksMode) {
        log::trace!("document quirks mode: {:?}", mode);
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some(parent) = parent_of(sibling) else {
            return;
        };
        let index = {
            let parent_ref = parent.borrow();
            match parent_ref
                .children()
                .iter()
                .position(|node| Rc::ptr_eq(node, sibling))
            {
                Some(index) => index,
                None => return,
            }
        };
        if let NodeOrText::AppendText(text) = &child {
            if merge_into_previous_text(parent.borrow().children(), index, text) {
                return;
            }
        }
        let child = into_node(child);
        set_parent(&child, &parent);
        if let Some(children) = children_mut(&mut parent.borrow_mut()) {
            children.insert(index, child);
        };
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let Node::Element(elem) = &mut *target.borrow_mut() {
            for attr in attrs {
                if !elem.attributes.iter().any(|(name, _)| *name == attr.name) {
                    elem.attributes.push((attr.name, attr.value.to_string()));
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        let Some(parent) = parent_of(target) else {
            return;
        };
        if let Some(children) = children_mut(&mut parent.borrow_mut()) {
            children.retain(|node| !Rc::ptr_eq(node, target));
        }
        if let Node::Element(elem) = &mut *target.borrow_mut() {
            elem.parent = None;
        }
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let moved = match children_mut(&mut node.borrow_mut()) {
            Some(children) => std::mem::take(children),
            None => return,
        };
        for child in &moved {
            set_parent(child, new_parent);
        }
        if let Some(children) = children_mut(&mut new_parent.borrow_mut()) {
            children.extend(moved);
        }
    }
}
