//! Request coordinator
//!
//! The coordinator sequences one request through validation, the robots gate,
//! the pacing gate and the transport, and for extractions dispatches the
//! response to the decoder registry. Followed links re-enter the coordinator
//! through the [`Response`] handle, so a single extraction may fan out into
//! many nested requests.

use super::{ContentDecoderRegistry, Pacing, Response, RobotsGate, Transport};
use crate::error_map::ErrorMap;
use crate::rules::RuleSet;
use crate::state::{Lifecycle, RequestState};
use crate::{Result, TrawlError};
use futures::FutureExt;
use reqwest::header::{HeaderValue, USER_AGENT};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// User-Agent sent when neither the rule set nor the coordinator set one
pub const DEFAULT_USER_AGENT: &str = "trawl/0.1";

/// Result of an extraction
pub struct Extraction {
    /// The response the selectors were evaluated against
    pub response: Box<dyn Response>,

    /// Extracted values keyed by selector name, `None` when the rule set has
    /// no selectors
    pub output: Option<Map<String, Value>>,

    /// Errors of the selectors that failed
    pub errors: Option<ErrorMap>,
}

impl Extraction {
    /// Output as a JSON value, `null` when nothing was extracted
    pub fn output_value(&self) -> Value {
        self.output.clone().map_or(Value::Null, Value::Object)
    }

    /// Converts partial failures into an error
    pub fn into_result(self) -> Result<(Box<dyn Response>, Option<Map<String, Value>>)> {
        match self.errors {
            Some(errs) => Err(errs.into()),
            None => Ok((self.response, self.output)),
        }
    }
}

impl fmt::Debug for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extraction")
            .field("url", &self.response.url().as_str())
            .field("output", &self.output)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Sequences requests through their collaborators
///
/// Every collaborator is optional except the transport (for requests) and the
/// decoder registry (for extractions). Cloning is cheap; clones share the
/// collaborators.
#[derive(Clone, Default)]
pub struct Coordinator {
    transport: Option<Arc<dyn Transport>>,
    pacing: Option<Arc<dyn Pacing>>,
    robots: Option<Arc<dyn RobotsGate>>,
    decoders: Option<Arc<dyn ContentDecoderRegistry>>,
    user_agent: String,
}

impl Coordinator {
    /// Creates a coordinator without collaborators
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the transport used for every request
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Installs the pacing gate consulted for rule sets with a delay
    pub fn with_pacing(mut self, pacing: impl Pacing + 'static) -> Self {
        self.pacing = Some(Arc::new(pacing));
        self
    }

    /// Installs the robots gate
    pub fn with_robots(mut self, robots: impl RobotsGate + 'static) -> Self {
        self.robots = Some(Arc::new(robots));
        self
    }

    /// Installs the decoder registry required by [`Coordinator::extract`]
    pub fn with_decoders(mut self, decoders: impl ContentDecoderRegistry + 'static) -> Self {
        self.decoders = Some(Arc::new(decoders));
        self
    }

    /// Sets the User-Agent used when a rule set has none
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn has_pacing(&self) -> bool {
        self.pacing.is_some()
    }

    pub fn has_robots(&self) -> bool {
        self.robots.is_some()
    }

    pub fn has_decoders(&self) -> bool {
        self.decoders.is_some()
    }

    /// User-Agent used when a rule set has none
    pub fn user_agent(&self) -> &str {
        if self.user_agent.trim().is_empty() {
            DEFAULT_USER_AGENT
        } else {
            &self.user_agent
        }
    }

    /// Performs the request described by `rules`
    ///
    /// The request passes the robots gate and the pacing gate (when installed
    /// and not disabled by the rule set) before reaching the transport. A
    /// missing or blank User-Agent header is filled in on `rules`.
    ///
    /// # Arguments
    ///
    /// * `rules` - The rule set to request; its URL is required
    ///
    /// # Returns
    ///
    /// * `Ok(response)` - The fetched response, whatever its status code
    /// * `Err(TrawlError)` - A missing collaborator or URL, a robots denial,
    ///   a transport error, or a panic raised along the way
    #[instrument(skip_all, fields(url = %rules.url_str()))]
    pub async fn do_request(&self, rules: &mut RuleSet) -> Result<Box<dyn Response>> {
        let mut lifecycle = Lifecycle::new(rules.url_str());

        let result = contain(self.fetch(rules, &mut lifecycle)).await;
        let result = result.and_then(|response| {
            lifecycle.advance(RequestState::Done)?;
            Ok(response)
        });

        if let Err(err) = &result {
            debug!(state = %lifecycle.state(), error = %err, "Request failed");
            lifecycle.fail(err);
        }
        result
    }

    /// Performs the request described by `rules` and evaluates its selectors
    /// against the response
    ///
    /// Selector failures do not fail the extraction; they are reported in
    /// [`Extraction::errors`] next to the values that could be extracted.
    ///
    /// # Arguments
    ///
    /// * `rules` - The rule set to request, carrying the selectors to evaluate
    ///
    /// # Returns
    ///
    /// * `Ok(extraction)` - The response with the extracted output and the
    ///   errors of the selectors that failed
    /// * `Err(TrawlError)` - Everything [`Coordinator::do_request`] fails on,
    ///   plus a missing decoder registry or an unmatched Content-Type
    #[instrument(skip_all, fields(url = %rules.url_str()))]
    pub async fn extract(&self, rules: &mut RuleSet) -> Result<Extraction> {
        let mut lifecycle = Lifecycle::new(rules.url_str());

        let result = contain(self.fetch_and_extract(rules, &mut lifecycle)).await;
        if let Err(err) = &result {
            debug!(state = %lifecycle.state(), error = %err, "Extraction failed");
            lifecycle.fail(err);
        }
        result
    }

    /// Resets every collaborator
    pub fn reset(&self) {
        if let Some(transport) = &self.transport {
            transport.reset();
        }
        if let Some(pacing) = &self.pacing {
            pacing.reset();
        }
        if let Some(robots) = &self.robots {
            robots.reset();
        }
        if let Some(decoders) = &self.decoders {
            decoders.reset();
        }
    }

    async fn fetch_and_extract(
        &self,
        rules: &mut RuleSet,
        lifecycle: &mut Lifecycle,
    ) -> Result<Extraction> {
        let decoders = self
            .decoders
            .as_ref()
            .ok_or(TrawlError::MissingDependency("decoder registry"))?;

        let response = self.fetch(rules, lifecycle).await?;

        if rules.selectors.is_empty() {
            lifecycle.advance(RequestState::Done)?;
            return Ok(Extraction {
                response,
                output: None,
                errors: None,
            });
        }

        let content_type = response.content_type();
        if !decoders.matches(content_type) {
            return Err(TrawlError::NotMatch {
                content_type: content_type.to_string(),
            });
        }
        lifecycle.advance(RequestState::ContentDispatched)?;

        let extracted = decoders.decode(rules, response.as_ref()).await?;
        lifecycle.advance(RequestState::Extracted)?;

        if !extracted.errors.is_empty() {
            warn!(
                url = %response.url(),
                failed = extracted.errors.len(),
                "Some selectors failed"
            );
        }

        lifecycle.advance(RequestState::Done)?;
        Ok(Extraction {
            response,
            output: Some(extracted.output),
            errors: extracted.errors.into_option(),
        })
    }

    async fn fetch(
        &self,
        rules: &mut RuleSet,
        lifecycle: &mut Lifecycle,
    ) -> Result<Box<dyn Response>> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(TrawlError::MissingDependency("transport"))?;

        let url = rules
            .url
            .clone()
            .ok_or_else(|| TrawlError::InvalidInput("rule set has no URL".to_string()))?;

        if rules.user_agent().map_or(true, |ua| ua.trim().is_empty()) {
            let user_agent = HeaderValue::from_str(self.user_agent())
                .map_err(|_| TrawlError::InvalidInput("invalid User-Agent".to_string()))?;
            rules.header.insert(USER_AGENT, user_agent);
        }
        lifecycle.advance(RequestState::Validated)?;

        if let Some(robots) = &self.robots {
            if !rules.ignore_robots_txt {
                robots.is_allowed(self, rules).await?;
            }
        }
        lifecycle.advance(RequestState::RobotsChecked)?;

        let _guard = match &self.pacing {
            Some(pacing) if !rules.delay.is_zero() => {
                pacing.wait(&url, rules.delay).await;
                Some(PaceGuard {
                    pacing: pacing.as_ref(),
                    url: &url,
                })
            }
            _ => None,
        };
        lifecycle.advance(RequestState::Paced)?;

        let response = transport.do_request(self, rules).await?;

        if let Some(pacing) = &self.pacing {
            pacing.stamp(response.url());
        }
        lifecycle.advance(RequestState::Fetched)?;

        debug!(
            status = response.status_code(),
            final_url = %response.url(),
            "Fetched"
        );
        Ok(response)
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("transport", &self.has_transport())
            .field("pacing", &self.has_pacing())
            .field("robots", &self.has_robots())
            .field("decoders", &self.has_decoders())
            .field("user_agent", &self.user_agent())
            .finish()
    }
}

/// Returns the pacing token when the request leaves the pacing gate's scope
struct PaceGuard<'a> {
    pacing: &'a dyn Pacing,
    url: &'a Url,
}

impl Drop for PaceGuard<'_> {
    fn drop(&mut self) {
        self.pacing.done(self.url);
    }
}

/// Converts a panic raised while polling `future` into [`TrawlError::Panic`]
async fn contain<T>(future: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(%message, "Recovered from panic");
            Err(TrawlError::Panic(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
