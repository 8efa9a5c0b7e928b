use super::convert::{process_raw, ConvFunc, Schema, Setter};
use super::pool::{Pool, Reusable};
use super::rule_set::{acquire_rules, RuleSet};
use super::{
    FieldValue, Fields, KEY_ALL, KEY_DELAY, KEY_EXPR, KEY_FOLLOW, KEY_HEADER,
    KEY_IGNORE_ROBOTS_TXT, KEY_METHOD, KEY_NAME, KEY_PROXY, KEY_TIMEOUT, KEY_TYPE,
    KEY_USE_COOKIES,
};
use crate::error_map::ErrorMap;
use crate::{RuleError, TrawlError};
use serde_json::Value;
use std::fmt;
use tracing::debug;

const SELECTOR_POOL_CAPACITY: usize = 1024;

static SELECTOR_POOL: Pool<Selector> = Pool::new(SELECTOR_POOL_CAPACITY);

/// Expression dialect of a selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExprType {
    /// Use the default dialect of the decoded content
    #[default]
    Unset,
    XPath,
    Css,
    Regular,
    /// A dialect no built-in element understands
    Other(String),
}

impl ExprType {
    /// Parses a type tag, ignoring case
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "" => Self::Unset,
            "xpath" => Self::XPath,
            "css" => Self::Css,
            "regular" | "regex" | "regexp" => Self::Regular,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unset => "",
            Self::XPath => "xpath",
            Self::Css => "css",
            Self::Regular => "regular",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named extraction node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    /// Selector name, also the output key
    pub name: String,

    /// Match expression
    pub expr: String,

    /// Expression dialect
    pub expr_type: ExprType,

    /// Match every element instead of the first one
    pub all: bool,

    /// Treat the matched values as URLs to fetch and extract
    pub follow: bool,

    /// Nested selectors
    pub selectors: Vec<Selector>,

    /// Request overrides applied when following, plus unrecognized keys
    pub fields: Fields,
}

/// Takes a cleared selector from the pool
pub fn acquire_selector() -> Selector {
    SELECTOR_POOL.acquire()
}

/// Clears the selector and returns it to the pool
pub fn release_selector(selector: Selector) {
    SELECTOR_POOL.release(selector);
}

impl Selector {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        let mut selector = acquire_selector();
        selector.name = name.into();
        selector.expr = expr.into();
        selector
    }

    pub fn with_type(mut self, expr_type: ExprType) -> Self {
        self.expr_type = expr_type;
        self
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    pub fn follow(mut self) -> Self {
        self.follow = true;
        self
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.set_selectors(selectors);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Resolves the rule set used when following this selector
    ///
    /// Each request field is taken from the selector's field bag when present
    /// with the right type, otherwise it is inherited from `src`. The nested
    /// selectors become the selectors of the new rule set. The URL is left
    /// unset for the caller to fill in.
    pub fn rules(&self, src: &RuleSet) -> RuleSet {
        let mut rules = acquire_rules();

        rules.method = match self.fields.get(KEY_METHOD) {
            Some(FieldValue::Raw(Value::String(method))) => method.clone(),
            other => {
                self.log_inherited(KEY_METHOD, other);
                src.method.clone()
            }
        };

        rules.proxy = match self.fields.get(KEY_PROXY) {
            Some(FieldValue::Url(proxy)) => Some(proxy.clone()),
            other => {
                self.log_inherited(KEY_PROXY, other);
                src.proxy.clone()
            }
        };

        rules.header = match self.fields.get(KEY_HEADER) {
            Some(FieldValue::Header(header)) => header.clone(),
            other => {
                self.log_inherited(KEY_HEADER, other);
                src.header.clone()
            }
        };

        rules.timeout = self.duration_or(KEY_TIMEOUT, src.timeout);
        rules.use_cookies = self.bool_or(KEY_USE_COOKIES, src.use_cookies);
        rules.ignore_robots_txt = self.bool_or(KEY_IGNORE_ROBOTS_TXT, src.ignore_robots_txt);
        rules.delay = self.duration_or(KEY_DELAY, src.delay);

        rules.selectors = self.selectors.clone();
        rules
    }

    /// Clears the selector and returns it to the pool
    pub fn release(self) {
        release_selector(self);
    }

    fn bool_or(&self, key: &str, inherited: bool) -> bool {
        let value = self.fields.get(key);
        value.and_then(FieldValue::as_bool).unwrap_or_else(|| {
            self.log_inherited(key, value);
            inherited
        })
    }

    fn duration_or(&self, key: &str, inherited: std::time::Duration) -> std::time::Duration {
        let value = self.fields.get(key);
        value.and_then(FieldValue::as_duration).unwrap_or_else(|| {
            self.log_inherited(key, value);
            inherited
        })
    }

    fn log_inherited(&self, key: &str, value: Option<&FieldValue>) {
        if let Some(value) = value {
            debug!(
                selector = %self.name,
                key,
                ?value,
                "Override has the wrong type, inheriting"
            );
        }
    }
}

impl Reusable for Selector {
    fn clear(&mut self) {
        self.name.clear();
        self.expr.clear();
        self.expr_type = ExprType::Unset;
        self.all = false;
        self.follow = false;

        for selector in self.selectors.drain(..) {
            release_selector(selector);
        }

        self.fields.clear();
    }
}

impl Schema for Selector {
    fn setter(key: &str) -> Option<Setter<Self>> {
        SCHEMA
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, set)| *set)
    }

    fn set_selectors(&mut self, selectors: Vec<Selector>) {
        for old in std::mem::replace(&mut self.selectors, selectors) {
            release_selector(old);
        }
    }

    fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }
}

const SCHEMA: &[(&str, Setter<Selector>)] = &[
    (KEY_EXPR, set_expr),
    (KEY_TYPE, set_type),
    (KEY_ALL, set_all),
    (KEY_FOLLOW, set_follow),
];

fn set_expr(selector: &mut Selector, value: FieldValue) -> Result<(), RuleError> {
    match value {
        FieldValue::Raw(Value::String(expr)) => {
            selector.expr = expr;
            Ok(())
        }
        _ => Err(RuleError::NotAssignable),
    }
}

fn set_type(selector: &mut Selector, value: FieldValue) -> Result<(), RuleError> {
    let raw = value.as_str().ok_or(RuleError::NotAssignable)?;
    selector.expr_type = ExprType::parse(raw);
    Ok(())
}

fn set_all(selector: &mut Selector, value: FieldValue) -> Result<(), RuleError> {
    selector.all = value.as_bool().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

fn set_follow(selector: &mut Selector, value: FieldValue) -> Result<(), RuleError> {
    selector.follow = value.as_bool().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

/// Builds one selector from its raw form
///
/// An empty string yields `None`. A failing object yields the aggregate of its
/// failing keys.
pub(crate) fn new_selector(
    name: &str,
    raw: Value,
    conv: ConvFunc,
) -> Result<Option<Selector>, TrawlError> {
    let mut selector = match raw {
        Value::String(expr) if expr.is_empty() => return Ok(None),
        Value::String(expr) => {
            let mut selector = acquire_selector();
            selector.expr = expr;
            selector
        }
        Value::Object(mut object) => {
            object.remove(KEY_NAME);

            let mut selector = acquire_selector();
            let errs = process_raw(object, &mut selector, conv);
            if !errs.is_empty() {
                release_selector(selector);
                return Err(errs.into());
            }
            selector
        }
        _ => return Err(RuleError::InvalidSelector.into()),
    };

    selector.name = name.to_string();
    Ok(Some(selector))
}

/// Builds a sibling list from a raw name-to-selector mapping
///
/// Entries with an empty name or a null value are skipped. Failing entries are
/// collected under their name without stopping the others.
pub(crate) fn new_selectors(
    raw: Value,
    conv: ConvFunc,
) -> Result<(Vec<Selector>, ErrorMap), TrawlError> {
    let object = match raw {
        Value::Null => return Ok((Vec::new(), ErrorMap::new())),
        Value::Object(object) => object,
        _ => return Err(RuleError::InvalidSelectors.into()),
    };

    let mut selectors = Vec::with_capacity(object.len());
    let mut errs = ErrorMap::new();

    for (name, value) in object {
        if name.is_empty() || value.is_null() {
            continue;
        }

        match new_selector(&name, value, conv) {
            Ok(Some(selector)) => selectors.push(selector),
            Ok(None) => {}
            Err(err) => errs.add(name, err),
        }
    }

    Ok((selectors, errs))
}
