//! Document tree shared by the JSON and XML elements
//!
//! Nodes live in an `ego_tree` arena, the same structure `scraper` uses for
//! HTML documents.

use super::xpath::{NodeKind, XPathNode};
use ego_tree::{NodeId, NodeRef};
use serde_json::Value;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct TreeNode {
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) attributes: Vec<(String, String)>,
    /// Scalar of a JSON node; containers hold an empty object or array
    pub(crate) value: Value,
}

impl TreeNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            text: String::new(),
            attributes: Vec::new(),
            value: Value::Null,
        }
    }
}

/// One decoded document
#[derive(Debug)]
pub(crate) struct Tree {
    nodes: ego_tree::Tree<TreeNode>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: ego_tree::Tree::new(TreeNode::new(NodeKind::Root)),
        }
    }

    pub(crate) fn root_id(&self) -> NodeId {
        self.nodes.root().id()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<NodeRef<'_, TreeNode>> {
        self.nodes.get(id)
    }

    /// Replaces the value of the node `id`
    pub(crate) fn set_value(&mut self, id: NodeId, value: Value) {
        if let Some(mut node) = self.nodes.get_mut(id) {
            node.value().value = value;
        }
    }

    /// Appends an element under `parent` and returns its id
    pub(crate) fn push_element(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        attributes: Vec<(String, String)>,
        value: Value,
    ) -> NodeId {
        let element = TreeNode {
            name: name.into(),
            attributes,
            value,
            ..TreeNode::new(NodeKind::Element)
        };

        match self.nodes.get_mut(parent) {
            Some(mut parent) => parent.append(element).id(),
            None => self.nodes.root_mut().append(element).id(),
        }
    }

    /// Appends a text node under `parent`, merging with a preceding text node
    pub(crate) fn push_text(&mut self, parent: NodeId, text: &str) {
        let mut parent = match self.nodes.get_mut(parent) {
            Some(parent) => parent,
            None => return,
        };

        if let Some(mut last) = parent.last_child() {
            if last.value().kind == NodeKind::Text {
                last.value().text.push_str(text);
                return;
            }
        }

        parent.append(TreeNode {
            text: text.to_string(),
            ..TreeNode::new(NodeKind::Text)
        });
    }
}

/// Handle to a node (or one of its attributes) of a shared [`Tree`]
#[derive(Debug, Clone)]
pub(crate) struct TreeRef {
    tree: Rc<Tree>,
    id: NodeId,
    attribute: Option<usize>,
}

impl TreeRef {
    pub(crate) fn root(tree: Rc<Tree>) -> Self {
        let id = tree.root_id();
        Self {
            tree,
            id,
            attribute: None,
        }
    }

    fn at(&self, id: NodeId) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            id,
            attribute: None,
        }
    }

    pub(crate) fn node_ref(&self) -> Option<NodeRef<'_, TreeNode>> {
        self.tree.get(self.id)
    }

    fn attribute(&self) -> Option<&(String, String)> {
        let index = self.attribute?;
        self.node_ref()?.value().attributes.get(index)
    }
}

impl PartialEq for TreeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
            && self.id == other.id
            && self.attribute == other.attribute
    }
}

impl Eq for TreeRef {}

impl Hash for TreeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.tree).hash(state);
        self.id.hash(state);
        self.attribute.hash(state);
    }
}

impl XPathNode for TreeRef {
    fn kind(&self) -> NodeKind {
        if self.attribute.is_some() {
            return NodeKind::Attribute;
        }
        self.node_ref()
            .map_or(NodeKind::Other, |node| node.value().kind)
    }

    fn name(&self) -> Option<String> {
        if let Some((name, _)) = self.attribute() {
            return Some(name.clone());
        }
        let node = self.node_ref()?;
        match node.value().kind {
            NodeKind::Element => Some(node.value().name.clone()),
            _ => None,
        }
    }

    fn parent(&self) -> Option<Self> {
        if self.attribute.is_some() {
            return Some(self.at(self.id));
        }
        self.node_ref()?.parent().map(|parent| self.at(parent.id()))
    }

    fn children(&self) -> Vec<Self> {
        if self.attribute.is_some() {
            return Vec::new();
        }
        self.node_ref()
            .map(|node| node.children().map(|child| self.at(child.id())).collect())
            .unwrap_or_default()
    }

    fn attributes(&self) -> Vec<Self> {
        if self.attribute.is_some() {
            return Vec::new();
        }
        let count = self
            .node_ref()
            .map_or(0, |node| node.value().attributes.len());

        (0..count)
            .map(|index| Self {
                attribute: Some(index),
                ..self.at(self.id)
            })
            .collect()
    }

    fn string_value(&self) -> String {
        if let Some((_, value)) = self.attribute() {
            return value.clone();
        }

        // descendants() starts with the node itself.
        self.node_ref()
            .map(|node| {
                node.descendants()
                    .map(|n| n.value())
                    .filter(|n| n.kind == NodeKind::Text)
                    .map(|n| n.text.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TreeRef {
        let mut tree = Tree::new();
        let root = tree.root_id();
        let book = tree.push_element(
            root,
            "book",
            vec![("id".to_string(), "7".to_string())],
            Value::Null,
        );
        let title = tree.push_element(book, "title", Vec::new(), json!("Dune"));
        tree.push_text(title, "Du");
        tree.push_text(title, "ne");
        tree.push_text(book, " by ");
        let author = tree.push_element(book, "author", Vec::new(), Value::Null);
        tree.push_text(author, "Herbert");
        tree.set_value(book, json!({}));
        TreeRef::root(Rc::new(tree))
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let root = sample();
        let book = root.children().remove(0);
        let title = book.children().remove(0);
        assert_eq!(title.children().len(), 1);
        assert_eq!(title.string_value(), "Dune");
    }

    #[test]
    fn test_string_value_in_document_order() {
        let root = sample();
        assert_eq!(root.string_value(), "Dune by Herbert");

        let text = root.children()[0].children()[1].clone();
        assert_eq!(text.kind(), NodeKind::Text);
        assert_eq!(text.string_value(), " by ");
    }

    #[test]
    fn test_parent_links() {
        let root = sample();
        let book = root.children().remove(0);
        let author = book.children().remove(2);

        assert_eq!(author.name().as_deref(), Some("author"));
        assert_eq!(author.parent(), Some(book.clone()));
        assert_eq!(book.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(book.node_ref().unwrap().value().value, json!({}));
    }

    #[test]
    fn test_attributes() {
        let root = sample();
        let book = root.children().remove(0);
        let attrs = book.attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].kind(), NodeKind::Attribute);
        assert_eq!(attrs[0].name().as_deref(), Some("id"));
        assert_eq!(attrs[0].string_value(), "7");
        assert_eq!(attrs[0].parent(), Some(book.clone()));
        assert!(attrs[0].children().is_empty());
        assert_ne!(attrs[0], book);
    }

    #[test]
    fn test_handles_of_different_trees_differ() {
        assert_ne!(sample(), sample());
    }
}
