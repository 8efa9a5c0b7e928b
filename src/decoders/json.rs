//! JSON element
//!
//! Object keys become element names and array items become unnamed child
//! elements, so `//items/*` selects every item of the `items` array. Scalars
//! are stored as the text of their element; the value of a container is
//! rebuilt from its subtree when asked for.

use super::tree::{Tree, TreeNode, TreeRef};
use super::xpath::{NodeKind, XPath, XPathNode};
use crate::crawler::Response;
use crate::engine::Element;
use crate::rules::ExprType;
use crate::{Result, TrawlError};
use ego_tree::{NodeId, NodeRef};
use serde_json::{Map, Value};
use std::rc::Rc;

/// Content-Type pattern handled by [`parse_json`]
pub const JSON_PATTERN: &str = r"^application/(json|x-json|([a-z]+\+json))";

/// Parses the response body as a JSON document
pub fn parse_json(response: &dyn Response) -> Result<Box<dyn Element>> {
    let document: Value =
        serde_json::from_slice(response.body()).map_err(|err| TrawlError::Decode {
            url: response.url().to_string(),
            message: err.to_string(),
        })?;

    Ok(Box::new(JsonElement(TreeRef::root(Rc::new(build_tree(&document))))))
}

fn build_tree(document: &Value) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root_id();
    tree.set_value(root, shape(document));
    append(&mut tree, root, document);
    tree
}

/// Value stored on a node: scalars as they are, containers empty
fn shape(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::Object(Map::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        scalar => scalar.clone(),
    }
}

fn append(tree: &mut Tree, parent: NodeId, value: &Value) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                let id = tree.push_element(parent, key.as_str(), Vec::new(), shape(child));
                append(tree, id, child);
            }
        }
        Value::Array(items) => {
            for item in items {
                let id = tree.push_element(parent, "", Vec::new(), shape(item));
                append(tree, id, item);
            }
        }
        Value::Null => {}
        Value::String(s) => tree.push_text(parent, s),
        scalar => tree.push_text(parent, &scalar.to_string()),
    }
}

/// Rebuilds the JSON value of `node` from its subtree
fn rebuild(node: NodeRef<'_, TreeNode>) -> Value {
    let elements = node
        .children()
        .filter(|child| child.value().kind == NodeKind::Element);

    match &node.value().value {
        Value::Object(_) => Value::Object(
            elements
                .map(|child| (child.value().name.clone(), rebuild(child)))
                .collect(),
        ),
        Value::Array(_) => Value::Array(elements.map(rebuild).collect()),
        scalar => scalar.clone(),
    }
}

/// A node of a decoded JSON document
pub struct JsonElement(TreeRef);

impl JsonElement {
    fn query(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<TreeRef>> {
        match expr_type {
            ExprType::Unset | ExprType::XPath => Ok(XPath::compile(expr)?.select(&self.0)),
            other => Err(TrawlError::ExprType {
                expr_type: other.to_string(),
            }),
        }
    }
}

impl Element for JsonElement {
    fn find(&self, expr: &str, expr_type: &ExprType) -> Result<Option<Box<dyn Element>>> {
        Ok(self
            .query(expr, expr_type)?
            .into_iter()
            .next()
            .map(|node| Box::new(JsonElement(node)) as Box<dyn Element>))
    }

    fn find_all(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<Box<dyn Element>>> {
        Ok(self
            .query(expr, expr_type)?
            .into_iter()
            .map(|node| Box::new(JsonElement(node)) as Box<dyn Element>)
            .collect())
    }

    fn value(&self) -> Value {
        match self.0.kind() {
            NodeKind::Text | NodeKind::Attribute => Value::String(self.0.string_value()),
            _ => self.0.node_ref().map_or(Value::Null, rebuild),
        }
    }
}
