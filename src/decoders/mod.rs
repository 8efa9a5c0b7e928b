//! Content decoders
//!
//! A decoder turns a response body into a queryable [`Element`] tree. The
//! [`Decoders`] registry picks one by matching the response Content-Type
//! against registered patterns, in registration order, and then runs the
//! rule set's selectors through the extraction engine.
//!
//! Dialects per format:
//!
//! | Format | Default | Also accepted |
//! |--------|---------|---------------|
//! | HTML   | XPath   | CSS           |
//! | JSON   | XPath   |               |
//! | XML    | XPath   |               |
//! | Text   | regex   |               |

mod html;
mod json;
mod text;
mod tree;
mod xml;
mod xpath;

pub use html::{parse_html, HtmlElement, HTML_PATTERN};
pub use json::{parse_json, JsonElement, JSON_PATTERN};
pub use text::{parse_text, TextElement, TEXT_PATTERN};
pub use xml::{parse_xml, XmlElement, XML_PATTERN};

use crate::crawler::{ContentDecoderRegistry, Response};
use crate::engine::{find_selectors, Element, Extracted};
use crate::rules::RuleSet;
use crate::{Result, TrawlError};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Turns a response into the root element of its content
pub type DecodeFn = Arc<dyn Fn(&dyn Response) -> Result<Box<dyn Element>> + Send + Sync>;

struct Entry {
    pattern: String,
    regex: Regex,
    decode: DecodeFn,
}

/// Registry of decoders keyed by Content-Type pattern
pub struct Decoders {
    entries: RwLock<Vec<Entry>>,
}

impl Decoders {
    /// Creates a registry with the HTML, JSON, text and XML decoders
    pub fn new() -> Result<Self> {
        let decoders = Self::empty();
        decoders.set(HTML_PATTERN, parse_html)?;
        decoders.set(JSON_PATTERN, parse_json)?;
        decoders.set(TEXT_PATTERN, parse_text)?;
        decoders.set(XML_PATTERN, parse_xml)?;
        Ok(decoders)
    }

    /// Creates a registry without decoders
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers `decode` for Content-Types matching `pattern`
    ///
    /// An empty pattern is ignored. Registering a pattern again replaces its
    /// decoder and keeps its position.
    ///
    /// # Arguments
    ///
    /// * `pattern` - Regular expression matched against the Content-Type
    /// * `decode` - Function turning a response into its root element
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the pattern compiled
    /// * `Err(TrawlError::InvalidInput)` - If it did not
    pub fn set<F>(&self, pattern: &str, decode: F) -> Result<()>
    where
        F: Fn(&dyn Response) -> Result<Box<dyn Element>> + Send + Sync + 'static,
    {
        if pattern.is_empty() {
            return Ok(());
        }

        let regex = Regex::new(pattern).map_err(|err| {
            TrawlError::InvalidInput(format!("invalid Content-Type pattern {:?}: {}", pattern, err))
        })?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let decode: DecodeFn = Arc::new(decode);
        match entries.iter_mut().find(|entry| entry.pattern == pattern) {
            Some(entry) => entry.decode = decode,
            None => entries.push(Entry {
                pattern: pattern.to_string(),
                regex,
                decode,
            }),
        }
        Ok(())
    }

    /// Unregisters `pattern`, returning true if it was registered
    pub fn remove(&self, pattern: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|entry| entry.pattern != pattern);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, content_type: &str) -> Option<DecodeFn> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|entry| entry.regex.is_match(content_type))
            .map(|entry| Arc::clone(&entry.decode))
    }
}

#[async_trait(?Send)]
impl ContentDecoderRegistry for Decoders {
    fn matches(&self, content_type: &str) -> bool {
        self.lookup(content_type).is_some()
    }

    async fn decode(&self, rules: &RuleSet, response: &dyn Response) -> Result<Extracted> {
        let content_type = response.content_type();
        let decode = self
            .lookup(content_type)
            .ok_or_else(|| TrawlError::NotMatch {
                content_type: content_type.to_string(),
            })?;

        debug!(url = %response.url(), %content_type, "Decoding");
        let root = decode(response)?;
        Ok(find_selectors(rules, response, &rules.selectors, root.as_ref()).await)
    }

    fn reset(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Selector;
    use crate::testing::StubResponse;
    use serde_json::json;
    use serde_json::Value;

    #[test]
    fn test_default_patterns() {
        let decoders = Decoders::new().unwrap();
        assert_eq!(decoders.len(), 4);

        for content_type in [
            "text/html; charset=utf-8",
            "application/json",
            "application/x-json",
            "application/ld+json",
            "text/plain",
            "text/xml",
            "application/xml",
            "application/rss+xml",
            "image/svg+xml",
            "application/vnd.wap.wbxml",
        ] {
            assert!(decoders.matches(content_type), "{} should match", content_type);
        }

        for content_type in ["image/png", "application/octet-stream", ""] {
            assert!(!decoders.matches(content_type), "{} should not match", content_type);
        }
    }

    #[test]
    fn test_set_and_remove() {
        let decoders = Decoders::empty();
        assert!(decoders.is_empty());

        decoders.set("", parse_text).unwrap();
        assert!(decoders.is_empty());

        assert!(matches!(
            decoders.set("(", parse_text),
            Err(TrawlError::InvalidInput(_))
        ));

        decoders.set("^text/csv", parse_text).unwrap();
        decoders.set("^text/csv", parse_html).unwrap();
        assert_eq!(decoders.len(), 1);
        assert!(decoders.matches("text/csv"));

        assert!(decoders.remove("^text/csv"));
        assert!(!decoders.remove("^text/csv"));
        assert!(!decoders.matches("text/csv"));
    }

    #[tokio::test]
    async fn test_decode_runs_selectors() {
        let decoders = Decoders::new().unwrap();
        let response = StubResponse::new(
            "https://ex.test/api",
            "application/json",
            r#"{"name": "trawl", "tags": ["a", "b"]}"#,
        );

        let mut rules = RuleSet::default();
        rules.selectors = vec![
            Selector::new("name", "//name"),
            Selector::new("tags", "//tags/*").all(),
        ];

        let extracted = decoders.decode(&rules, &response).await.unwrap();
        assert_eq!(
            Value::Object(extracted.output),
            json!({"name": "trawl", "tags": ["a", "b"]})
        );
    }

    #[tokio::test]
    async fn test_replaced_decoder_is_used() {
        let decoders = Decoders::new().unwrap();
        decoders.set(HTML_PATTERN, parse_text).unwrap();

        let response = StubResponse::new("https://ex.test/", "text/html", "<p>42</p>");
        let mut rules = RuleSet::default();
        rules.selectors = vec![Selector::new("n", r"\d+")];

        let extracted = decoders.decode(&rules, &response).await.unwrap();
        assert_eq!(Value::Object(extracted.output), json!({"n": "42"}));
    }

    #[tokio::test]
    async fn test_decode_errors() {
        let decoders = Decoders::new().unwrap();
        let rules = RuleSet::default();

        let png = StubResponse::new("https://ex.test/x.png", "image/png", "");
        assert!(matches!(
            decoders.decode(&rules, &png).await,
            Err(TrawlError::NotMatch { .. })
        ));

        let broken = StubResponse::new("https://ex.test/api", "application/json", "{");
        assert!(matches!(
            decoders.decode(&rules, &broken).await,
            Err(TrawlError::Decode { .. })
        ));

        decoders.reset();
        assert!(decoders.is_empty());
    }
}
