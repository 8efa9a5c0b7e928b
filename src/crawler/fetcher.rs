//! HTTP transport implementation
//!
//! This module sends requests with `reqwest`:
//! - One client per (proxy, cookies) combination, built on first use
//! - Per-request timeout, falling back to the transport default
//! - A cookie jar shared by every request that enables cookies
//! - Redirects followed, the response reporting the final URL

use super::{Coordinator, Extraction, Response, Transport};
use crate::rules::RuleSet;
use crate::{Result, TrawlError};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, Method, Proxy};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Timeout applied when neither the rule set nor the transport set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_REDIRECTS: usize = 10;

/// Clients are cached per proxy URL and cookie usage
type ClientKey = (Option<String>, bool);

/// Default [`Transport`] implementation
#[derive(Debug)]
pub struct HttpTransport {
    clients: RwLock<HashMap<ClientKey, Client>>,
    jar: RwLock<Arc<Jar>>,
    default_timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpTransport {
    /// Creates a transport using `default_timeout` for rule sets without one
    pub fn new(default_timeout: Duration) -> Self {
        let default_timeout = if default_timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            default_timeout
        };

        Self {
            clients: RwLock::new(HashMap::new()),
            jar: RwLock::new(Arc::new(Jar::default())),
            default_timeout,
        }
    }

    /// Timeout used for `rules`
    pub fn timeout_for(&self, rules: &RuleSet) -> Duration {
        if rules.timeout.is_zero() {
            self.default_timeout
        } else {
            rules.timeout
        }
    }

    /// Returns the cookie jar shared by requests with cookies enabled
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of cached clients
    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn client(&self, proxy: Option<&Url>, use_cookies: bool) -> Result<Client> {
        let key: ClientKey = (proxy.map(|p| p.to_string()), use_cookies);

        if let Some(client) = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }

        if use_cookies {
            builder = builder.cookie_provider(self.jar());
        }

        let client = builder.build()?;
        debug!(proxy = ?key.0, cookies = use_cookies, "Built HTTP client");

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        Ok(clients.entry(key).or_insert(client).clone())
    }
}

/// Parses the method of `rules`, empty meaning GET
pub fn request_method(rules: &RuleSet) -> Result<Method> {
    if rules.method.is_empty() {
        return Ok(Method::GET);
    }

    Method::from_bytes(rules.method.as_bytes())
        .map_err(|_| TrawlError::InvalidInput(format!("invalid method {:?}", rules.method)))
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn do_request(
        &self,
        coordinator: &Coordinator,
        rules: &RuleSet,
    ) -> Result<Box<dyn Response>> {
        let url = rules
            .url
            .clone()
            .ok_or_else(|| TrawlError::InvalidInput("rule set has no URL".to_string()))?;

        let client = self.client(rules.proxy.as_ref(), rules.use_cookies)?;
        let response = client
            .request(request_method(rules)?, url)
            .headers(rules.header.clone())
            .timeout(self.timeout_for(rules))
            .send()
            .await?;

        let url = response.url().clone();
        let status_code = response.status().as_u16();
        let header = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Box::new(HttpResponse {
            url,
            status_code,
            header,
            body,
            coordinator: coordinator.clone(),
        }))
    }

    fn reset(&self) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Jar::default());
    }
}

/// A response read by [`HttpTransport`]
pub struct HttpResponse {
    url: Url,
    status_code: u16,
    header: HeaderMap,
    body: Vec<u8>,
    coordinator: Coordinator,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("url", &self.url.as_str())
            .field("status_code", &self.status_code)
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[async_trait(?Send)]
impl Response for HttpResponse {
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
