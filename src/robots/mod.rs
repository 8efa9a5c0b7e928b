//! Robots.txt handling module
//!
//! [`RobotsCache`] is the robots gate installed by default. Policies are
//! fetched through the coordinator itself, so the robots.txt request goes
//! through the same transport, proxy and pacing as the page it guards.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use crate::crawler::{Coordinator, RobotsGate};
use crate::rules::{RuleSet, Selector};
use crate::url::{host_key, is_robots_url, robots_url};
use crate::{Result, TrawlError};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use url::Url;

/// Default lifetime of a cached policy
pub const DEFAULT_ROBOTS_TTL_HOURS: i64 = 24;

/// Per-host robots.txt cache
pub struct RobotsCache {
    ttl: Duration,
    hosts: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// Creates an empty cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.hosts.read().map(|hosts| hosts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fresh cached policy for `key`, if any
    fn cached(&self, key: &str) -> Option<ParsedRobots> {
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        hosts
            .get(key)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| entry.content.clone())
    }

    fn store(&self, key: String, robots: ParsedRobots) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        hosts.insert(key, CachedRobots::new(robots));
    }

    /// Fetches the policy for the origin of `url`
    async fn fetch(
        &self,
        coordinator: &Coordinator,
        rules: &RuleSet,
        url: &Url,
    ) -> Result<ParsedRobots> {
        let mut robots_rules = Selector::default().rules(rules);
        robots_rules.method = "GET".to_string();
        robots_rules.url = Some(robots_url(url));
        robots_rules.ignore_robots_txt = true;
        robots_rules.selectors.clear();

        let result = coordinator.do_request(&mut robots_rules).await;
        robots_rules.release();

        let response = result?;
        let robots = ParsedRobots::from_status(response.status_code(), response.body());
        debug!(
            url = %response.url(),
            status = response.status_code(),
            "Fetched robots.txt"
        );
        Ok(robots)
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_ROBOTS_TTL_HOURS))
    }
}

#[async_trait(?Send)]
impl RobotsGate for RobotsCache {
    async fn is_allowed(&self, coordinator: &Coordinator, rules: &RuleSet) -> Result<()> {
        let url = rules
            .url
            .as_ref()
            .ok_or_else(|| TrawlError::InvalidInput("rule set has no URL".to_string()))?;

        if is_robots_url(url) {
            return Ok(());
        }

        let key = host_key(url)?;
        let robots = match self.cached(&key) {
            Some(robots) => robots,
            None => {
                let robots = self.fetch(coordinator, rules, url).await?;
                self.store(key, robots.clone());
                robots
            }
        };

        let user_agent = rules.user_agent().unwrap_or_else(|| coordinator.user_agent());
        if robots.is_allowed(url.as_str(), user_agent) {
            Ok(())
        } else {
            Err(TrawlError::RobotsDenied {
                url: url.to_string(),
            })
        }
    }

    fn reset(&self) {
        self.hosts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
