//! Renderable view tree.
//!
//! A [`Node`] is the output of every renderable piece of the app: the shell,
//! routed pages and the reload prompt. Text is stored verbatim; escaping only
//! happens in [`Node::to_html`].

use std::fmt::Write as _;

/// Elements that never carry children or a closing tag.
const VOID_ELEMENTS: &[&str] = &["img", "br", "hr", "input", "meta", "link"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Attributes in insertion order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|value| value.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Node {
    pub fn element(tag: impl Into<String>) -> Element {
        Element::new(tag)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn empty() -> Self {
        Node::Fragment(Vec::new())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// True when the node renders nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Element(_) => false,
            Node::Text(text) => text.is_empty(),
            Node::Fragment(children) => children.iter().all(Node::is_empty),
        }
    }

    /// Concatenated text of the subtree, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Node::Fragment(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Depth-first search for the first element matching `predicate`.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        match self {
            Node::Text(_) => None,
            Node::Element(element) => {
                if predicate(element) {
                    return Some(element);
                }
                element.children.iter().find_map(|c| c.find(predicate))
            }
            Node::Fragment(children) => children.iter().find_map(|c| c.find(predicate)),
        }
    }

    pub fn find_by_class(&self, class: &str) -> Option<&Element> {
        self.find(&|element| element.has_class(class))
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Node::Fragment(children) => {
                for child in children {
                    child.write_html(out);
                }
            }
            Node::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attrs {
                    let _ = write!(out, " {}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value));
                }
                out.push('>');
                if element.is_void() {
                    return;
                }
                for child in &element.children {
                    child.write_html(out);
                }
                let _ = write!(out, "</{}>", element.tag);
            }
        }
    }
}
