use super::convert::{default_conv_func, process_raw, ConvFunc, Schema, Setter};
use super::pool::{Pool, Reusable};
use super::selector::release_selector;
use super::{
    FieldValue, Fields, Selector, KEY_DELAY, KEY_HEADER, KEY_IGNORE_ROBOTS_TXT, KEY_METHOD,
    KEY_PROXY, KEY_TIMEOUT, KEY_URL, KEY_USE_COOKIES,
};
use crate::error_map::ErrorMap;
use crate::{RuleError, TrawlError};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

const RULES_POOL_CAPACITY: usize = 256;

static RULES_POOL: Pool<RuleSet> = Pool::new(RULES_POOL_CAPACITY);

/// One resolved request configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    /// HTTP method (empty means GET)
    pub method: String,

    /// Requested URL
    pub url: Option<Url>,

    /// Proxy URL
    pub proxy: Option<Url>,

    /// Request header
    pub header: HeaderMap,

    /// Time limit for the request (zero means the transport default)
    pub timeout: Duration,

    /// Whether cookies are sent and stored
    pub use_cookies: bool,

    /// Whether robots.txt is ignored
    pub ignore_robots_txt: bool,

    /// Delay between requests to the same host
    pub delay: Duration,

    /// Selectors evaluated against the response content
    pub selectors: Vec<Selector>,

    /// Unrecognized configuration keys
    pub fields: Fields,
}

/// Takes a cleared rule set from the pool
pub fn acquire_rules() -> RuleSet {
    RULES_POOL.acquire()
}

/// Clears the rule set and returns it to the pool
///
/// Nested selectors are released as well.
pub fn release_rules(rules: RuleSet) {
    RULES_POOL.release(rules);
}

impl RuleSet {
    /// Builds a rule set from raw input with [`default_conv_func`]
    ///
    /// Recognized keys (`Method`, `URL`, `Proxy`, `Header`, `Timeout`,
    /// `UseCookies`, `IgnoreRobotsTxt`, `Delay`, `Selectors`) are converted
    /// into their fields; every other key lands in [`RuleSet::fields`].
    ///
    /// # Arguments
    ///
    /// * `raw` - The decoded JSON object
    ///
    /// # Returns
    ///
    /// * `Ok(RuleSet)` - If every key converted
    /// * `Err(TrawlError::Aggregate)` - The errors of every failing key, nested
    ///   under `Selectors` for selector errors
    pub fn from_raw(raw: Map<String, Value>) -> Result<Self, TrawlError> {
        Self::from_raw_with(raw, default_conv_func)
    }

    /// Builds a rule set from raw input with a custom conversion function
    pub fn from_raw_with(raw: Map<String, Value>, conv: ConvFunc) -> Result<Self, TrawlError> {
        let (rules, errs) = Self::build(raw, conv);
        if errs.is_empty() {
            return Ok(rules);
        }

        release_rules(rules);
        Err(errs.into())
    }

    /// Builds as much of the rule set as possible
    ///
    /// Returns the partially populated rule set together with the errors of
    /// the keys that failed.
    pub fn build(raw: Map<String, Value>, conv: ConvFunc) -> (Self, ErrorMap) {
        let mut rules = acquire_rules();
        let errs = process_raw(raw, &mut rules, conv);
        (rules, errs)
    }

    /// Returns the User-Agent header value, if any
    pub fn user_agent(&self) -> Option<&str> {
        self.header
            .get(reqwest::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the requested URL as a string, empty when unset
    pub fn url_str(&self) -> &str {
        self.url.as_ref().map_or("", Url::as_str)
    }

    /// Clears the rule set and returns it to the pool
    pub fn release(self) {
        release_rules(self);
    }
}

impl Reusable for RuleSet {
    fn clear(&mut self) {
        self.method.clear();
        self.url = None;
        self.proxy = None;
        self.header.clear();
        self.timeout = Duration::ZERO;

        self.use_cookies = false;
        self.ignore_robots_txt = false;
        self.delay = Duration::ZERO;

        for selector in self.selectors.drain(..) {
            release_selector(selector);
        }

        self.fields.clear();
    }
}

impl Schema for RuleSet {
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

const SCHEMA: &[(&str, Setter<RuleSet>)] = &[
    (KEY_METHOD, set_method),
    (KEY_URL, set_url),
    (KEY_PROXY, set_proxy),
    (KEY_HEADER, set_header),
    (KEY_TIMEOUT, set_timeout),
    (KEY_USE_COOKIES, set_use_cookies),
    (KEY_IGNORE_ROBOTS_TXT, set_ignore_robots_txt),
    (KEY_DELAY, set_delay),
];

fn set_method(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    match value {
        FieldValue::Raw(Value::String(method)) => {
            rules.method = method;
            Ok(())
        }
        _ => Err(RuleError::NotAssignable),
    }
}

fn set_url(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    match value {
        FieldValue::Url(url) => {
            rules.url = Some(url);
            Ok(())
        }
        _ => Err(RuleError::NotAssignable),
    }
}

fn set_proxy(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    match value {
        FieldValue::Url(url) => {
            rules.proxy = Some(url);
            Ok(())
        }
        _ => Err(RuleError::NotAssignable),
    }
}

fn set_header(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    match value {
        FieldValue::Header(header) => {
            rules.header = header;
            Ok(())
        }
        _ => Err(RuleError::NotAssignable),
    }
}

fn set_timeout(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    rules.timeout = value.as_duration().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

fn set_use_cookies(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    rules.use_cookies = value.as_bool().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

fn set_ignore_robots_txt(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    rules.ignore_robots_txt = value.as_bool().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

fn set_delay(rules: &mut RuleSet, value: FieldValue) -> Result<(), RuleError> {
    rules.delay = value.as_duration().ok_or(RuleError::NotAssignable)?;
    Ok(())
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        RuleSet::from_raw(raw).map_err(serde::de::Error::custom)
    }
}
