//! Request orchestration
//!
//! This module contains the [`Coordinator`] that sequences one request through
//! its gates, and the collaborator contracts it drives:
//! - [`Transport`]: performs the network request
//! - [`Pacing`]: politeness delay between requests to the same host
//! - [`RobotsGate`]: robots.txt permission check
//! - [`ContentDecoderRegistry`]: content-type dispatch into the extraction engine
//!
//! Futures in this module are not `Send`: decoded documents are single-threaded
//! trees, and followed requests re-enter the coordinator from inside an
//! extraction. Collaborators themselves are `Send + Sync` so they can be shared
//! between independently spawned local tasks.

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{Coordinator, Extraction, DEFAULT_USER_AGENT};
pub use fetcher::{HttpResponse, HttpTransport, DEFAULT_TIMEOUT};
pub use scheduler::Pacer;

use crate::config::Config;
use crate::decoders::Decoders;
use crate::engine::Extracted;
use crate::robots::RobotsCache;
use crate::rules::RuleSet;
use crate::{Result, TrawlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::time::Duration;
use url::Url;

/// Performs network requests
#[async_trait(?Send)]
pub trait Transport: Send + Sync {
    /// Sends the request described by `rules`
    ///
    /// The returned response re-enters `coordinator` for follow-up requests.
    async fn do_request(&self, coordinator: &Coordinator, rules: &RuleSet)
        -> Result<Box<dyn Response>>;

    /// Drops any state kept between requests
    fn reset(&self);
}

/// Delays repeated requests to the same host
#[async_trait(?Send)]
pub trait Pacing: Send + Sync {
    /// Takes the pacing token of the host of `url`, then waits until `delay`
    /// has elapsed since the last stamped request to that host
    async fn wait(&self, url: &Url, delay: Duration);

    /// Returns the pacing token taken by [`Pacing::wait`]
    fn done(&self, url: &Url);

    /// Records that a request to the host of `url` happened now
    fn stamp(&self, url: &Url);

    /// Forgets every host
    fn reset(&self);
}

/// Robots.txt permission check
#[async_trait(?Send)]
pub trait RobotsGate: Send + Sync {
    /// Fails with [`crate::TrawlError::RobotsDenied`] if the request is not
    /// allowed for its User-Agent
    async fn is_allowed(&self, coordinator: &Coordinator, rules: &RuleSet) -> Result<()>;

    /// Drops every cached policy
    fn reset(&self);
}

/// Decodes response content and runs the selectors against it
#[async_trait(?Send)]
pub trait ContentDecoderRegistry: Send + Sync {
    /// Returns true if a decoder is registered for `content_type`
    fn matches(&self, content_type: &str) -> bool;

    /// Decodes `response` and evaluates the selectors of `rules` on it
    async fn decode(&self, rules: &RuleSet, response: &dyn Response) -> Result<Extracted>;

    /// Unregisters every decoder
    fn reset(&self);
}

/// A fetched resource
#[async_trait(?Send)]
pub trait Response {
    /// Final URL of the response, after redirects
    fn url(&self) -> &Url;

    fn status_code(&self) -> u16;

    fn header(&self) -> &HeaderMap;

    fn body(&self) -> &[u8];

    /// Content-Type header value, empty when absent
    fn content_type(&self) -> &str {
        self.header()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    /// Performs a new request through the coordinator that produced this response
    async fn do_request(&self, rules: &mut RuleSet) -> Result<Box<dyn Response>>;

    /// Performs a new extraction through the coordinator that produced this response
    async fn extract(&self, rules: &mut RuleSet) -> Result<Extraction>;
}

/// Builds a coordinator with the default collaborators
///
/// The transport and decoder registry are always installed; the robots gate
/// and the pacing table follow the `[politeness]` settings.
///
/// # Arguments
///
/// * `config` - Validated configuration
///
/// # Returns
///
/// * `Ok(Coordinator)` - A coordinator ready for `do_request`/`extract`
/// * `Err(TrawlError::InvalidInput)` - If the robots TTL cannot be represented
pub fn build_coordinator(config: &Config) -> Result<Coordinator> {
    let transport = HttpTransport::new(Duration::from_millis(config.client.timeout_ms));
    let decoders = Decoders::new()?;

    let mut coordinator = Coordinator::new()
        .with_user_agent(config.client.user_agent.clone())
        .with_transport(transport)
        .with_decoders(decoders);

    if config.politeness.respect_robots_txt {
        let ttl = i64::try_from(config.politeness.robots_ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                TrawlError::InvalidInput(format!(
                    "robots TTL of {} hours is out of range",
                    config.politeness.robots_ttl_hours
                ))
            })?;
        coordinator = coordinator.with_robots(RobotsCache::new(ttl));
    }

    if config.politeness.pacing {
        coordinator = coordinator.with_pacing(Pacer::new());
    }

    Ok(coordinator)
}
