use crate::{default_coordinator, mount_html, rules};
use serde_json::json;
use std::time::{Duration, Instant};
use trawl::TrawlError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_robots_denial_skips_the_page() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut rules = rules(json!({"URL": format!("{}/private", server.uri())}));
    let err = default_coordinator().do_request(&mut rules).await.err().expect("expected an error");
    assert!(matches!(err, TrawlError::RobotsDenied { .. }));
}

#[tokio::test]
async fn test_robots_group_for_product_token() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: trawl\nDisallow: /\n\nUser-agent: *\nAllow: /").await;
    mount_html(&server, "/", "<html></html>").await;

    let coordinator = default_coordinator();

    let mut denied = rules(json!({"URL": format!("{}/", server.uri())}));
    assert!(matches!(
        coordinator.do_request(&mut denied).await,
        Err(TrawlError::RobotsDenied { .. })
    ));

    let mut allowed = rules(json!({
        "URL": format!("{}/", server.uri()),
        "Header": {"User-Agent": "otherbot/3.1"},
    }));
    coordinator.do_request(&mut allowed).await.unwrap();
}

#[tokio::test]
async fn test_ignore_robots_txt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    mount_html(&server, "/", "<html><body><p>open</p></body></html>").await;

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "IgnoreRobotsTxt": "true",
        "Selectors": {"p": "//p"},
    }));
    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(extraction.output_value(), json!({"p": "open"}));
}

#[tokio::test]
async fn test_delay_paces_requests_to_the_same_host() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", "<html></html>").await;

    let coordinator = default_coordinator();
    let started = Instant::now();
    for _ in 0..3 {
        let mut rules = rules(json!({
            "URL": format!("{}/", server.uri()),
            "Delay": "100ms",
        }));
        coordinator.do_request(&mut rules).await.unwrap();
    }

    // The robots.txt fetch and the first page are paced as well.
    assert!(started.elapsed() >= Duration::from_millis(300));
}
