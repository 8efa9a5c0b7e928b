use crate::{default_coordinator, mount_html, mount_open_robots, rules};
use serde_json::json;
use std::time::Duration;
use trawl::TrawlError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_extract_title() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    mount_html(
        &server,
        "/",
        "<html><head><title>Example Domain</title></head><body></body></html>",
    )
    .await;

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "Selectors": {"title": "//head/title"},
    }));

    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(extraction.output_value(), json!({"title": "Example Domain"}));
    assert!(extraction.errors.is_none());
}

#[tokio::test]
async fn test_follow_all_links() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    mount_html(
        &server,
        "/",
        r#"<html><body><ul>
            <li><a href="/a">A</a></li>
            <li><a href="b">B</a></li>
        </ul></body></html>"#,
    )
    .await;
    mount_html(&server, "/a", "<html><head><title>Page A</title></head></html>").await;
    mount_html(&server, "/b", "<html><head><title>Page B</title></head></html>").await;

    let mut rules = rules_with_href_follow(&server.uri());
    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(
        extraction.output_value(),
        json!({"pages": {
            format!("{}/a", server.uri()): {"title": "Page A"},
            format!("{}/b", server.uri()): {"title": "Page B"},
        }})
    );
}

fn rules_with_href_follow(base: &str) -> trawl::RuleSet {
    rules(json!({
        "URL": format!("{}/", base),
        "Selectors": {
            "pages": {
                "Expr": "//ul//a/@href",
                "All": "true",
                "Follow": 1,
                "Selectors": {"title": "//title"},
            },
        },
    }))
}

#[tokio::test]
async fn test_json_and_text_content() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"items": [{"id": 1}, {"id": 2}]}"#, "application/json"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("build 1234 passed", "text/plain"),
        )
        .mount(&server)
        .await;

    let coordinator = default_coordinator();

    let mut api = rules(json!({
        "URL": format!("{}/api", server.uri()),
        "Selectors": {"ids": {"Expr": "//items/*/id", "All": true}},
    }));
    let extraction = coordinator.extract(&mut api).await.unwrap();
    assert_eq!(extraction.output_value(), json!({"ids": [1, 2]}));

    let mut notes = rules(json!({
        "URL": format!("{}/notes.txt", server.uri()),
        "Selectors": {
            "build": {"Expr": "[0-9]+", "Type": "regular"},
            "missing": {"Expr": "failed", "Type": "regular"},
        },
    }));
    let extraction = coordinator.extract(&mut notes).await.unwrap();
    assert_eq!(
        extraction.output_value(),
        json!({"build": "1234", "missing": null})
    );
}

#[tokio::test]
async fn test_default_user_agent_is_sent() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "trawl/0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body><p>hi</p></body></html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "Selectors": {"p": "//p"},
    }));
    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(extraction.output_value(), json!({"p": "hi"}));
}

#[tokio::test]
async fn test_cookies_carry_over_to_followed_pages() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<html><body><a href="/account">me</a></body></html>"#, "text/html")
                .insert_header("set-cookie", "session=abc; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("cookie", "session=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body><h1>Welcome back</h1></body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "UseCookies": true,
        "Selectors": {
            "account": {
                "Expr": "//a/@href",
                "Follow": true,
                "Selectors": {"greeting": "//h1"},
            },
        },
    }));

    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(
        extraction.output_value(),
        json!({"account": {
            format!("{}/account", server.uri()): {"greeting": "Welcome back"},
        }})
    );
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut rules = rules(json!({
        "URL": format!("{}/slow", server.uri()),
        "Timeout": 50,
    }));

    let err = default_coordinator().do_request(&mut rules).await.err().expect("expected an error");
    assert!(matches!(err, TrawlError::Transport(e) if e.is_timeout()));
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let server = MockServer::start().await;
    mount_open_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_html(&server, "/new", "<html><head><title>New</title></head></html>").await;

    let mut rules = rules(json!({
        "URL": format!("{}/old", server.uri()),
        "Selectors": {"title": "//title"},
    }));

    let extraction = default_coordinator().extract(&mut rules).await.unwrap();
    assert_eq!(
        extraction.response.url().as_str(),
        format!("{}/new", server.uri())
    );
    assert_eq!(extraction.output_value(), json!({"title": "New"}));
}
