//! Recursive extraction engine
//!
//! The engine evaluates a tree of [`Selector`]s against a decoded document.
//! Each selector is evaluated independently: a failing selector is recorded
//! under its name in an [`ErrorMap`] and left out of the output, while its
//! siblings keep their values.
//!
//! Selectors marked `follow` turn their matched values into URLs and extract
//! each of them through the [`Response`] handle, which re-enters the
//! coordinator. Followed pages are fetched concurrently.

use crate::crawler::Response;
use crate::error_map::ErrorMap;
use crate::rules::{release_rules, ExprType, RuleSet, Selector};
use crate::url::resolve;
use crate::{Result, TrawlError};
use futures::future::{join_all, LocalBoxFuture};
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

/// A queryable node of decoded content
///
/// Every content format exposes its nodes through this trait, so the engine
/// never needs to know which format it walks.
pub trait Element {
    /// Returns the first node matching `expr`, or `None`
    fn find(&self, expr: &str, expr_type: &ExprType) -> Result<Option<Box<dyn Element>>>;

    /// Returns every node matching `expr`, in document order
    fn find_all(&self, expr: &str, expr_type: &ExprType) -> Result<Vec<Box<dyn Element>>>;

    /// Scalar value of the node
    fn value(&self) -> Value;
}

/// Output of one selector list evaluation
#[derive(Debug, Default)]
pub struct Extracted {
    /// Values of the selectors that succeeded, keyed by selector name
    pub output: Map<String, Value>,

    /// Errors of the selectors that failed, keyed by selector name
    pub errors: ErrorMap,
}

impl Extracted {
    /// Converts into the output, failing with the aggregate if any selector failed
    pub fn into_result(self) -> Result<Map<String, Value>> {
        self.errors.into_result(self.output)
    }
}

/// Evaluates `selectors` against `parent`
///
/// # Arguments
///
/// * `src` - The rule set that produced `response`; followed selectors inherit
///   from it
/// * `response` - The response `parent` was decoded from, used to resolve and
///   fetch followed URLs
/// * `selectors` - The sibling selectors to evaluate
/// * `parent` - The node the selectors are evaluated against
///
/// # Returns
///
/// The values of the selectors that succeeded and the errors of those that
/// failed, both keyed by selector name.
pub fn find_selectors<'a>(
    src: &'a RuleSet,
    response: &'a dyn Response,
    selectors: &'a [Selector],
    parent: &'a dyn Element,
) -> LocalBoxFuture<'a, Extracted> {
    async move {
        let mut extracted = Extracted::default();

        for selector in selectors {
            if selector.name.is_empty() {
                continue;
            }

            match find_selector(src, response, selector, parent).await {
                Ok(value) => {
                    extracted.output.insert(selector.name.clone(), value);
                }
                Err(err) => {
                    debug!(selector = %selector.name, error = %err, "Selector failed");
                    extracted.errors.add(selector.name.clone(), err);
                }
            }
        }

        extracted
    }
    .boxed_local()
}

/// Evaluates one selector against `parent`
pub async fn find_selector(
    src: &RuleSet,
    response: &dyn Response,
    selector: &Selector,
    parent: &dyn Element,
) -> Result<Value> {
    if selector.all {
        return find_all_selector(src, response, selector, parent).await;
    }

    let child = match parent.find(&selector.expr, &selector.expr_type)? {
        Some(child) => child,
        None => return Ok(Value::Null),
    };

    if selector.follow {
        let found = follow_selector(src, response, selector, vec![child.value()]).await?;
        return Ok(Value::Object(found));
    }

    if !selector.selectors.is_empty() {
        let nested = find_selectors(src, response, &selector.selectors, child.as_ref()).await;
        return Ok(Value::Object(nested.into_result()?));
    }

    Ok(child.value())
}

async fn find_all_selector(
    src: &RuleSet,
    response: &dyn Response,
    selector: &Selector,
    parent: &dyn Element,
) -> Result<Value> {
    let children = parent.find_all(&selector.expr, &selector.expr_type)?;

    if selector.follow {
        let values = children.iter().map(|child| child.value()).collect();
        let found = follow_selector(src, response, selector, values).await?;
        return Ok(Value::Object(found));
    }

    if selector.selectors.is_empty() {
        return Ok(Value::Array(
            children.iter().map(|child| child.value()).collect(),
        ));
    }

    let mut items = Vec::with_capacity(children.len());
    let mut errs = ErrorMap::new();
    for (i, child) in children.iter().enumerate() {
        let nested = find_selectors(src, response, &selector.selectors, child.as_ref()).await;
        if let Some(output) = errs.add_result(format!("{}#{}", selector.name, i), nested.into_result())
        {
            items.push(Value::Object(output));
        }
    }

    errs.into_result(Value::Array(items))
}

/// Fetches and extracts every URL in `raw_urls`
///
/// Relative values are resolved against the URL of `response`. Values that
/// are not URLs are recorded as errors but do not stop the others. The output
/// maps each absolute URL to the extraction output of that page.
pub async fn follow_selector(
    src: &RuleSet,
    response: &dyn Response,
    selector: &Selector,
    raw_urls: Vec<Value>,
) -> Result<Map<String, Value>> {
    let mut errs = ErrorMap::new();
    let mut urls = Vec::with_capacity(raw_urls.len());

    for raw in raw_urls {
        match follow_url(response.url(), &raw) {
            Ok(url) => urls.push(url),
            Err(err) => errs.add(raw_key(&raw), err),
        }
    }

    let rules = selector.rules(src);
    let pending = urls.into_iter().map(|url| {
        let mut rules = rules.clone();
        rules.url = Some(url.clone());

        async move {
            debug!(selector = %selector.name, %url, "Following");
            let result = response.extract(&mut rules).await;
            release_rules(rules);
            (url, result)
        }
    });
    let results = join_all(pending).await;
    release_rules(rules);

    let mut found = Map::new();
    for (url, result) in results {
        let output = result.and_then(|extraction| {
            let (_, output) = extraction.into_result()?;
            Ok(output.map_or(Value::Null, Value::Object))
        });

        if let Some(output) = errs.add_result(url.to_string(), output) {
            found.insert(url.to_string(), output);
        }
    }

    errs.into_result(found)
}

fn follow_url(base: &Url, raw: &Value) -> Result<Url> {
    match raw {
        Value::String(s) => Ok(resolve(base, s)?),
        other => Err(TrawlError::InvalidInput(format!(
            "followed value {} is not a URL",
            other
        ))),
    }
}

fn raw_key(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
