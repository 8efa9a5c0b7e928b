//! HTML element, backed by `scraper`
//!
//! XPath is the default dialect; CSS selectors are supported as well.

use super::xpath::{NodeKind, XPath, XPathNode};
use crate::crawler::Response;
use crate::engine::Element;
use crate::rules::ExprType;
use crate::{Result, TrawlError};
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector as CssSelector};
use serde_json::Value;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Content-Type pattern handled by [`parse_html`]
pub const HTML_PATTERN: &str = r"^text/html";

/// Parses the response body as an HTML document
pub fn parse_html(response: &dyn Response) -> Result<Box<dyn Element>> {
    let source = String::from_utf8_lossy(response.body());
    let doc = Rc::new(Html::parse_document(&source));
    let id = doc.tree.root().id();

    Ok(Box::new(HtmlElement(HtmlNode {
        doc,
        id,
        attribute: None,
    })))
}

#[derive(Clone)]
struct HtmlNode {
    doc: Rc<Html>,
    id: NodeId,
    attribute: Option<String>,
}

impl HtmlNode {
    fn node(&self) -> Option<NodeRef<'_, Node>> {
        self.doc.tree.get(self.id)
    }

    fn at(&self, id: NodeId) -> Self {
        Self {
            doc: Rc::clone(&self.doc),
            id,
            attribute: None,
        }
    }

    fn css_select(&self, selector: &CssSelector) -> Vec<Self> {
        if self.attribute.is_some() {
            return Vec::new();
        }

        let node = match self.node() {
            Some(node) => node,
            None => return Vec::new(),
        };

        match ElementRef::wrap(node) {
            Some(element) => element.select(selector).map(|e| self.at(e.id())).collect(),
            None if node.value().is_document() || node.value().is_fragment() => self
                .doc
                .select(selector)
                .map(|e| self.at(e.id()))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl PartialEq for HtmlNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.doc, &other.doc) && self.id == other.id && self.attribute == other.attribute
    }
}

impl Eq for HtmlNode {}

impl Hash for HtmlNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.doc).hash(state);
        self.id.hash(state);
        self.attribute.hash(state);
    }
}

impl XPathNode for HtmlNode {
    fn kind(&self) -> NodeKind {
        if self.attribute.is_some() {
            return NodeKind::Attribute;
        }
        match self.node().map(|node| node.value()) {
            Some(Node::Document) | Some(Node::Fragment) => NodeKind::Root,
            Some(Node::Element(_)) => NodeKind::Element,
            Some(Node::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn name(&self) -> Option<String> {
        if let Some(attribute) = &self.attribute {
            return Some(attribute.clone());
        }
        self.node()
            .and_then(|node| node.value().as_element().map(|e| e.name().to_string()))
    }

    fn parent(&self) -> Option<Self> {
        if self.attribute.is_some() {
            return Some(self.at(self.id));
        }
        self.node()
            .and_then(|node| node.parent())
            .map(|parent| self.at(parent.id()))
    }

    fn children(&self) -> Vec<Self> {
        if self.attribute.is_some() {
            return Vec::new();
        }
        self.node()
            .map(|node| node.children().map(|child| self.at(child.id())).collect())
            .unwrap_or_default()
    }

    fn attributes(&self) -> Vec<Self> {
        if self.attribute.is_some() {
            return Vec::new();
        }
        let element = match self.node().and_then(|node| node.value().as_element()) {
            Some(element) => element,
            None => return Vec::new(),
        };

        element
            .attrs()
            .map(|(name, _)| Self {
                attribute: Some(name.to_string()),
                ..self.at(self.id)
            })
            .collect()
    }

    fn string_value(&self) -> String {
        let node = match self.node() {
            Some(node) => node,
            None => return String::new(),
        };

        if let Some(attribute) = &self.attribute {
            return node
                .value()
                .as_element()
                .and_then(|element| element.attr(attribute))
                .unwrap_or_default()
                .to_string();
        }

        let mut out = String::new();
        for descendant in node.descendants() {
            if let Some(text) = descendant.value().as_text() {
                out.push_str(text);
            }
        }
        out
    }
}

/// A node of a decoded HTML document
pub struct HtmlElement(HtmlNode);

impl HtmlElement {
    fn wrap(nodes: Vec<HtmlNode>) -> Vec<Box<dyn Element>> {
        nodes
            .into_iter()
            .map(|node| Box::new(HtmlElement(node)) as Box<dyn Element>)
            .collect()
    }

    fn query(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<HtmlNode>> {
        match expr_type {
            ExprType::Unset | ExprType::XPath => Ok(XPath::compile(expr)?.select(&self.0)),
            ExprType::Css => {
                let selector = CssSelector::parse(expr).map_err(|err| {
                    TrawlError::Expression(format!("invalid CSS selector {:?}: {}", expr, err))
                })?;
                Ok(self.0.css_select(&selector))
            }
            other => Err(TrawlError::ExprType {
                expr_type: other.to_string(),
            }),
        }
    }
}

impl Element for HtmlElement {
    fn find(&self, expr: &str, expr_type: &ExprType) -> Result<Option<Box<dyn Element>>> {
        Ok(self.query(expr, expr_type)?.into_iter().next().map(|node| {
            Box::new(HtmlElement(node)) as Box<dyn Element>
        }))
    }

    fn find_all(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<Box<dyn Element>>> {
        Ok(Self::wrap(self.query(expr, expr_type)?))
    }

    fn value(&self) -> Value {
        Value::String(self.0.string_value())
    }
}
