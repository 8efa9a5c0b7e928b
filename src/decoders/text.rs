//! Plain text element, queried with regular expressions

use crate::crawler::Response;
use crate::engine::Element;
use crate::rules::ExprType;
use crate::{Result, TrawlError};
use regex::Regex;
use serde_json::Value;

/// Content-Type pattern handled by [`parse_text`]
pub const TEXT_PATTERN: &str = r"^text/plain";

/// Wraps the response body as text
pub fn parse_text(response: &dyn Response) -> Result<Box<dyn Element>> {
    Ok(Box::new(TextElement(
        String::from_utf8_lossy(response.body()).into_owned(),
    )))
}

/// A run of text; the document itself or one match inside it
pub struct TextElement(String);

impl TextElement {
    fn compile(expr: &str, expr_type: &ExprType) -> Result<Regex> {
        match expr_type {
            ExprType::Unset | ExprType::Regular => Regex::new(expr).map_err(|err| {
                TrawlError::Expression(format!("invalid regular expression {:?}: {}", expr, err))
            }),
            other => Err(TrawlError::ExprType {
                expr_type: other.to_string(),
            }),
        }
    }
}

impl Element for TextElement {
    fn find(&self, expr: &str, expr_type: &ExprType) -> Result<Option<Box<dyn Element>>> {
        let regex = Self::compile(expr, expr_type)?;
        Ok(regex
            .find(&self.0)
            .map(|m| Box::new(TextElement(m.as_str().to_string())) as Box<dyn Element>))
    }

    fn find_all(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<Box<dyn Element>>> {
        let regex = Self::compile(expr, expr_type)?;
        Ok(regex
            .find_iter(&self.0)
            .map(|m| Box::new(TextElement(m.as_str().to_string())) as Box<dyn Element>)
            .collect())
    }

    fn value(&self) -> Value {
        Value::String(self.0.clone())
    }
}
