//! Conversion of loosely-typed input into rule set and selector fields
//!
//! Raw input is a JSON object. Each key is passed through a [`ConvFunc`] and
//! then routed through a schema table of setters; keys without a setter end up
//! in the field bag untouched.

use super::selector::new_selectors;
use super::{
    FieldValue, Fields, Selector, KEY_ALL, KEY_DELAY, KEY_FOLLOW, KEY_HEADER,
    KEY_IGNORE_ROBOTS_TXT, KEY_PROXY, KEY_SELECTORS, KEY_TIMEOUT, KEY_URL, KEY_USE_COOKIES,
};
use crate::error_map::ErrorMap;
use crate::RuleError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Converts the raw value of `key` into a [`FieldValue`]
pub type ConvFunc = fn(key: &str, raw: Value) -> Result<FieldValue, RuleError>;

/// Setter of one schema entry
pub(crate) type Setter<T> = fn(&mut T, FieldValue) -> Result<(), RuleError>;

/// Types whose fields can be populated from raw input
pub(crate) trait Schema {
    /// Returns the setter registered for `key`
    fn setter(key: &str) -> Option<Setter<Self>>;

    /// Stores the nested selectors
    fn set_selectors(&mut self, selectors: Vec<Selector>);

    /// Field bag receiving unrecognized keys
    fn fields_mut(&mut self) -> &mut Fields;
}

/// Conversion used by default when building rule sets and selectors
///
/// | Key | Result |
/// |-----|--------|
/// | `URL`, `Proxy` | [`FieldValue::Url`] |
/// | `IgnoreRobotsTxt`, `UseCookies`, `All`, `Follow` | [`FieldValue::Bool`] |
/// | `Delay`, `Timeout` | [`FieldValue::Duration`] |
/// | `Header` | [`FieldValue::Header`] |
/// | anything else | [`FieldValue::Raw`] |
pub fn default_conv_func(key: &str, raw: Value) -> Result<FieldValue, RuleError> {
    match key {
        KEY_URL | KEY_PROXY => to_url(&raw).map(FieldValue::Url),
        KEY_IGNORE_ROBOTS_TXT | KEY_FOLLOW | KEY_USE_COOKIES | KEY_ALL => {
            to_bool(&raw).map(FieldValue::Bool)
        }
        KEY_DELAY | KEY_TIMEOUT => to_duration(&raw).map(FieldValue::Duration),
        KEY_HEADER => to_header(&raw).map(FieldValue::Header),
        _ => Ok(FieldValue::Raw(raw)),
    }
}

/// Converts a string value into an absolute URL
pub fn to_url(value: &Value) -> Result<Url, RuleError> {
    match value {
        Value::String(raw) => Ok(Url::parse(raw)?),
        _ => Err(RuleError::MustBeString),
    }
}

/// Converts a bool, number or bool-like string into a bool
///
/// Null is false and any non-zero number is true.
pub fn to_bool(value: &Value) -> Result<bool, RuleError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map_or(false, |f| f != 0.0)),
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(RuleError::InvalidBool(s.clone())),
        },
        _ => Err(RuleError::MustBeBool),
    }
}

/// Converts a number of milliseconds or a duration string into a duration
pub fn to_duration(value: &Value) -> Result<Duration, RuleError> {
    match value {
        Value::Null => Ok(Duration::ZERO),
        Value::String(s) => parse_duration(s),
        Value::Number(n) => {
            if let Some(ms) = n.as_u64() {
                return Ok(Duration::from_millis(ms));
            }

            match n.as_f64() {
                Some(ms) if ms.is_finite() && ms >= 0.0 => {
                    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
                }
                _ => Err(RuleError::InvalidDuration(n.to_string())),
            }
        }
        _ => Err(RuleError::MustBeDuration),
    }
}

/// Parses a duration such as `"300ms"`, `"1.5h"` or `"2h45m"`
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `"0"`
/// is accepted without a unit.
pub fn parse_duration(input: &str) -> Result<Duration, RuleError> {
    let invalid = || RuleError::InvalidDuration(input.to_string());

    let mut rest = input.trim();
    if let Some(unsigned) = rest.strip_prefix('+') {
        rest = unsigned;
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };

        nanos += value * scale;
        rest = tail;
    }

    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Converts an object of strings or string lists into a header map
pub fn to_header(value: &Value) -> Result<HeaderMap, RuleError> {
    let object = match value {
        Value::Null => return Ok(HeaderMap::new()),
        Value::Object(object) => object,
        _ => return Err(RuleError::InvalidHeader),
    };

    let mut header = HeaderMap::new();
    for (key, value) in object {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| RuleError::InvalidHeader)?;
        match value {
            Value::String(s) => {
                header.insert(name, header_value(s)?);
            }
            Value::Array(items) => {
                for item in items {
                    let s = item.as_str().ok_or(RuleError::InvalidHeader)?;
                    header.append(name.clone(), header_value(s)?);
                }
            }
            _ => return Err(RuleError::InvalidHeader),
        }
    }
    Ok(header)
}

fn header_value(s: &str) -> Result<HeaderValue, RuleError> {
    HeaderValue::from_str(s).map_err(|_| RuleError::InvalidHeader)
}

/// Populates `output` from `raw`, collecting one error per failing key
pub(crate) fn process_raw<T: Schema>(
    raw: Map<String, Value>,
    output: &mut T,
    conv: ConvFunc,
) -> ErrorMap {
    let mut errs = ErrorMap::new();

    for (key, value) in raw {
        if key == KEY_SELECTORS {
            match new_selectors(value, conv) {
                Ok((selectors, selector_errs)) => {
                    output.set_selectors(selectors);
                    errs.add(key, selector_errs);
                }
                Err(err) => errs.add(key, err),
            }
            continue;
        }

        let value = match conv(&key, value) {
            Ok(value) => value,
            Err(err) => {
                errs.add(key, err);
                continue;
            }
        };

        match T::setter(&key) {
            Some(set) => {
                if let Err(err) = set(output, value) {
                    errs.add(key, err);
                }
            }
            None => {
                output.fields_mut().insert(key, value);
            }
        }
    }

    errs
}
