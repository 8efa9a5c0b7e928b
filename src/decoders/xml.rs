//! XML element, backed by `quick-xml`

use super::tree::{Tree, TreeRef};
use ego_tree::NodeId;
use super::xpath::{XPath, XPathNode};
use crate::crawler::Response;
use crate::engine::Element;
use crate::rules::ExprType;
use crate::{Result, TrawlError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::rc::Rc;

/// Content-Type pattern handled by [`parse_xml`]
pub const XML_PATTERN: &str =
    r"(?i)((application|image|message|model)/((\w|\.|-)+\+?)?|text/)(wb)?xml";

/// Parses the response body as an XML document
///
/// Element and attribute names lose their namespace prefix.
pub fn parse_xml(response: &dyn Response) -> Result<Box<dyn Element>> {
    let decode_err = |message: String| TrawlError::Decode {
        url: response.url().to_string(),
        message,
    };

    let mut reader = Reader::from_reader(response.body());
    reader.config_mut().trim_text(false);

    let mut tree = Tree::new();
    let root = tree.root_id();
    let mut stack = vec![root];
    let mut buf = Vec::new();

    loop {
        let parent = stack.last().copied().unwrap_or(root);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let index = push_element(&mut tree, parent, &e).map_err(decode_err)?;
                stack.push(index);
            }
            Ok(Event::Empty(e)) => {
                push_element(&mut tree, parent, &e).map_err(decode_err)?;
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| decode_err(err.to_string()))?;
                if parent != root {
                    tree.push_text(parent, &text);
                }
            }
            Ok(Event::CData(e)) => {
                tree.push_text(parent, &String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(decode_err(format!(
                    "XML parse error at position {}: {}",
                    reader.error_position(),
                    err
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if stack.len() > 1 {
        let open = stack
            .last()
            .and_then(|&id| tree.get(id))
            .map(|node| node.value().name.clone())
            .unwrap_or_default();
        return Err(decode_err(format!("unclosed element <{}>", open)));
    }

    Ok(Box::new(XmlElement(TreeRef::root(Rc::new(tree)))))
}

fn push_element(
    tree: &mut Tree,
    parent: NodeId,
    start: &BytesStart<'_>,
) -> std::result::Result<NodeId, String> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        attributes.push((key, value.to_string()));
    }

    Ok(tree.push_element(parent, name, attributes, Value::Null))
}

/// A node of a decoded XML document
pub struct XmlElement(TreeRef);

impl XmlElement {
    fn query(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<TreeRef>> {
        match expr_type {
            ExprType::Unset | ExprType::XPath => Ok(XPath::compile(expr)?.select(&self.0)),
            other => Err(TrawlError::ExprType {
                expr_type: other.to_string(),
            }),
        }
    }
}

impl Element for XmlElement {
    fn find(&self, expr: &str, expr_type: &ExprType) -> Result<Option<Box<dyn Element>>> {
        Ok(self
            .query(expr, expr_type)?
            .into_iter()
            .next()
            .map(|node| Box::new(XmlElement(node)) as Box<dyn Element>))
    }

    fn find_all(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<Box<dyn Element>>> {
        Ok(self
            .query(expr, expr_type)?
            .into_iter()
            .map(|node| Box::new(XmlElement(node)) as Box<dyn Element>)
            .collect())
    }

    fn value(&self) -> Value {
        Value::String(self.0.string_value())
    }
}
