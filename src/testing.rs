//! Test doubles for the coordinator collaborators

use crate::crawler::{Coordinator, Extraction, Pacing, Response, RobotsGate, Transport};
use crate::rules::RuleSet;
use crate::{Result, TrawlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Rule set requesting `url` with every other field at its default
pub fn rules_for(url: &str) -> RuleSet {
    let mut rules = RuleSet::default();
    rules.url = Some(Url::parse(url).unwrap());
    rules
}

/// Canned response served by [`StubTransport`]
pub struct StubResponse {
    url: Url,
    status_code: u16,
    header: HeaderMap,
    body: Vec<u8>,
    coordinator: Coordinator,
}

impl StubResponse {
    /// A 200 response that is not attached to any collaborator
    pub fn new(url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let mut header = HeaderMap::new();
        header.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        Self {
            url: Url::parse(url).unwrap(),
            status_code: 200,
            header,
            body: body.into(),
            coordinator: Coordinator::default(),
        }
    }
}

#[async_trait(?Send)]
impl Response for StubResponse {
    fn url(&self) -> &Url {
        &self.url
    }

    fn status_code(&self) -> u16 {
        self.status_code
    }

    fn header(&self) -> &HeaderMap {
        &self.header
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn do_request(&self, rules: &mut RuleSet) -> Result<Box<dyn Response>> {
        self.coordinator.do_request(rules).await
    }

    async fn extract(&self, rules: &mut RuleSet) -> Result<Extraction> {
        self.coordinator.extract(rules).await
    }
}

#[derive(Clone)]
struct Page {
    status_code: u16,
    content_type: String,
    body: Vec<u8>,
}

/// One request seen by [`StubTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub method: String,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

/// Shared view of the requests a [`StubTransport`] received
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<RecordedRequest>>>);

impl Calls {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }
}

/// Transport serving canned pages by URL
///
/// Unknown URLs fail like a connection error would.
#[derive(Default)]
pub struct StubTransport {
    pages: HashMap<String, Page>,
    redirects: HashMap<String, String>,
    calls: Calls,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                status_code: 200,
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
        self
    }

    /// Serves an empty body with `status_code`
    pub fn status(mut self, url: &str, status_code: u16) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                status_code,
                content_type: "text/plain".to_string(),
                body: Vec::new(),
            },
        );
        self
    }

    /// Answers `from` with the page at `to`
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }
}

#[async_trait(?Send)]
impl Transport for StubTransport {
    async fn do_request(
        &self,
        coordinator: &Coordinator,
        rules: &RuleSet,
    ) -> Result<Box<dyn Response>> {
        let requested = rules.url_str().to_string();
        self.calls.0.lock().unwrap().push(RecordedRequest {
            url: requested.clone(),
            method: if rules.method.is_empty() {
                "GET".to_string()
            } else {
                rules.method.clone()
            },
            user_agent: rules.user_agent().map(str::to_string),
            timeout: rules.timeout,
        });

        let final_url = self.redirects.get(&requested).unwrap_or(&requested);
        let page = self
            .pages
            .get(final_url)
            .ok_or_else(|| TrawlError::InvalidInput(format!("connection refused: {}", requested)))?;

        let mut response = StubResponse::new(final_url, &page.content_type, page.body.clone());
        response.status_code = page.status_code;
        response.coordinator = coordinator.clone();
        Ok(Box::new(response))
    }

    fn reset(&self) {}
}

/// Event log shared with a [`StubPacing`]
#[derive(Clone, Default)]
pub struct PacingLog(Arc<Mutex<Vec<String>>>);

impl PacingLog {
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

/// Pacing gate that records calls instead of waiting
#[derive(Default)]
pub struct StubPacing {
    log: PacingLog,
}

impl StubPacing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> PacingLog {
        self.log.clone()
    }
}

#[async_trait(?Send)]
impl Pacing for StubPacing {
    async fn wait(&self, url: &Url, delay: Duration) {
        self.log.push(format!("wait {} {:?}", url, delay));
    }

    fn done(&self, url: &Url) {
        self.log.push(format!("done {}", url));
    }

    fn stamp(&self, url: &Url) {
        self.log.push(format!("stamp {}", url));
    }

    fn reset(&self) {
        self.log.clear();
    }
}

/// Robots gate denying every path under a prefix
pub struct StubRobots {
    prefix: String,
}

impl StubRobots {
    pub fn deny(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl RobotsGate for StubRobots {
    async fn is_allowed(&self, _coordinator: &Coordinator, rules: &RuleSet) -> Result<()> {
        match &rules.url {
            Some(url) if url.path().starts_with(&self.prefix) => Err(TrawlError::RobotsDenied {
                url: url.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn reset(&self) {}
}
