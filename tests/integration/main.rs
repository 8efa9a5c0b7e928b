//! Integration tests for Trawl
//!
//! These tests use wiremock to create mock HTTP servers and run whole
//! extractions through the default coordinator stack.

mod config_tests;
mod extract_tests;
mod politeness_tests;

use serde_json::Value;
use trawl::config::Config;
use trawl::{build_coordinator, Coordinator, RuleSet};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a rule set from a JSON literal
pub fn rules(raw: Value) -> RuleSet {
    RuleSet::from_raw(raw.as_object().expect("rule set must be an object").clone())
        .expect("rule set should be valid")
}

/// Coordinator with the default stack and the default configuration
pub fn default_coordinator() -> Coordinator {
    build_coordinator(&Config::default()).expect("default stack should build")
}

/// Mounts an HTML page at `route`
pub async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mounts a permissive robots.txt
pub async fn mount_open_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(server)
        .await;
}
