//! Rule sets and selectors
//!
//! A [`RuleSet`] is one resolved request configuration together with the tree
//! of [`Selector`]s to evaluate against the fetched content. Both can be built
//! from loosely-typed JSON input, where recognized keys are converted into typed
//! fields and every other key is kept in a free-form field bag.
//!
//! Instances come from a reuse pool (see [`acquire_rules`] / [`release_rules`])
//! so that wide selector trees and many followed links do not allocate a fresh
//! rule set per branch.

mod convert;
mod pool;
mod rule_set;
mod selector;

pub use convert::{
    default_conv_func, parse_duration, to_bool, to_duration, to_header, to_url, ConvFunc,
};
pub use pool::{Pool, Reusable};
pub use rule_set::{acquire_rules, release_rules, RuleSet};
pub use selector::{acquire_selector, release_selector, ExprType, Selector};

use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const KEY_DELAY: &str = "Delay";
pub const KEY_HEADER: &str = "Header";
pub const KEY_IGNORE_ROBOTS_TXT: &str = "IgnoreRobotsTxt";
pub const KEY_METHOD: &str = "Method";
pub const KEY_PROXY: &str = "Proxy";
pub const KEY_SELECTORS: &str = "Selectors";
pub const KEY_TIMEOUT: &str = "Timeout";
pub const KEY_USE_COOKIES: &str = "UseCookies";
pub const KEY_URL: &str = "URL";

pub const KEY_ALL: &str = "All";
pub const KEY_EXPR: &str = "Expr";
pub const KEY_FOLLOW: &str = "Follow";
pub const KEY_NAME: &str = "Name";
pub const KEY_TYPE: &str = "Type";

/// A converted configuration value
///
/// Recognized keys are converted into their typed form by the conversion
/// function; anything else stays [`FieldValue::Raw`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Raw(Value),
    Bool(bool),
    Duration(Duration),
    Url(Url),
    Header(HeaderMap),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Raw(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// Free-form field bag for keys without a dedicated field
pub type Fields = BTreeMap<String, FieldValue>;
