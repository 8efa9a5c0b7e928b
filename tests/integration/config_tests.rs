use crate::rules;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use trawl::build_coordinator;
use trawl::config::load_config;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_temp_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_config_file_drives_the_stack() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "itest/2.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><head><title>Configured</title></head></html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = create_temp_config(
        r#"
[client]
user-agent = "itest/2.0"
timeout-ms = 2000

[politeness]
respect-robots-txt = false
"#,
    );
    let config = load_config(file.path()).unwrap();
    let coordinator = build_coordinator(&config).unwrap();
    assert!(!coordinator.has_robots());
    assert!(coordinator.has_pacing());

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "Selectors": {"title": "//title"},
    }));
    let extraction = coordinator.extract(&mut rules).await.unwrap();
    assert_eq!(extraction.output_value(), json!({"title": "Configured"}));
}

#[tokio::test]
async fn test_rule_set_user_agent_wins_over_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .and(header("user-agent", "rulebot/1.0"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "rulebot/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let file = create_temp_config("[client]\nuser-agent = \"itest/2.0\"\n");
    let coordinator = build_coordinator(&load_config(file.path()).unwrap()).unwrap();

    let mut rules = rules(json!({
        "URL": format!("{}/", server.uri()),
        "Header": {"User-Agent": "rulebot/1.0"},
    }));
    let response = coordinator.do_request(&mut rules).await.unwrap();
    assert_eq!(response.status_code(), 204);
    assert_eq!(rules.user_agent(), Some("rulebot/1.0"));
}
