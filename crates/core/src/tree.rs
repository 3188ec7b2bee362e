//! A generic document tree.
//!
//! Backends build a tree of typed nodes (document, pages, paragraphs, runs,
//! images) which can be printed, serialized to JSON, or walked recursively
//! to rebuild a document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// The kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Document,
    Page,
    Paragraph,
    /// A formatted DOCX run.
    Run,
    /// A styled PDF text span.
    Text,
    /// Container for images that could not be positioned in the flow.
    Images,
    Image,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Page => "page",
            Self::Paragraph => "paragraph",
            Self::Run => "run",
            Self::Text => "text",
            Self::Images => "images",
            Self::Image => "image",
        }
    }
}

/// A node in the document tree.
///
/// `content` holds text for runs/spans and a file path for images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a node with no content or attributes.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            content: None,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Set the node content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set an attribute. `null` values are skipped.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute in place. `null` values are skipped.
    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if !value.is_null() {
            self.attributes.insert(key.to_string(), value);
        }
    }

    pub fn add_child(&mut self, node: TreeNode) {
        self.children.push(node);
    }

    /// First direct child of the given type.
    pub fn find_child(&self, node_type: NodeType) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.node_type == node_type)
    }

    /// First direct child of the given type, created and appended if missing.
    pub fn child_or_insert(&mut self, node_type: NodeType) -> &mut TreeNode {
        let pos = match self.children.iter().position(|c| c.node_type == node_type) {
            Some(pos) => pos,
            None => {
                self.children.push(TreeNode::new(node_type));
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }

    /// Truthy attribute check: `true`, non-zero numbers and non-empty strings.
    pub fn attr_flag(&self, key: &str) -> bool {
        match self.attributes.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }

    /// Visit this node and all descendants depth-first, pre-order.
    pub fn walk<F: FnMut(&TreeNode, usize)>(&self, f: &mut F) {
        self.walk_at(0, f);
    }

    fn walk_at<F: FnMut(&TreeNode, usize)>(&self, level: usize, f: &mut F) {
        f(self, level);
        for child in &self.children {
            child.walk_at(level + 1, f);
        }
    }

    /// Number of nodes of the given type in this subtree.
    pub fn count(&self, node_type: NodeType) -> usize {
        let mut n = 0;
        self.walk(&mut |node, _| {
            if node.node_type == node_type {
                n += 1;
            }
        });
        n
    }
}

/// Render a tree as indented text, four spaces per level.
///
/// ```text
/// DOCUMENT:
///     PARAGRAPH:
///         RUN: Hello
///           bold: true
/// ```
pub fn display_tree(node: &TreeNode) -> String {
    let mut out = String::new();
    node.walk(&mut |n, level| {
        let indent = " ".repeat(level * 4);
        let _ = writeln!(
            out,
            "{}{}: {}",
            indent,
            n.node_type.as_str().to_uppercase(),
            n.content.as_deref().unwrap_or("")
        );
        for (attr, value) in &n.attributes {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = writeln!(out, "{}  {}: {}", indent, attr, shown);
        }
    });
    out
}
