// ABOUTME: Integration tests for the ogpeek CLI binary.
// ABOUTME: Tests HTML file resolution, URL batches against a mock server and argument validation.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn ogpeek_cmd() -> Command {
    Command::cargo_bin("ogpeek").unwrap()
}

#[test]
fn resolve_html_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("test.html");

    let html_content = r#"<!DOCTYPE html>
<html>
<head>
<title>Test Page</title>
<meta name="description" content="A page for testing">
<meta property="og:image" content="https://example.com/cover.png">
</head>
<body></body>
</html>"#;

    fs::write(&html_path, html_content).unwrap();

    ogpeek_cmd()
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://www.example.com/post")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\":\"Test Page\""))
        .stdout(predicate::str::contains("\"domain\":\"example.com\""))
        .stdout(predicate::str::contains("\"image\":\"https://example.com/cover.png\""));
}

#[test]
fn batch_preserves_order_and_reports_failures() {
    let server = MockServer::start();

    let mock1 = server.mock(|when, then| {
        when.method(GET).path("/page1");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body("<html><head><title>Page One</title></head></html>");
    });

    let mock2 = server.mock(|when, then| {
        when.method(GET).path("/page2");
        then.status(404).body("missing");
    });

    let url1 = server.url("/page1");
    let url2 = server.url("/page2");

    let output = ogpeek_cmd()
        .arg("--allow-private-networks")
        .arg(&url2)
        .arg("")
        .arg(&url1)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    mock1.assert();
    mock2.assert();

    let records: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["url"], url2.as_str());
    assert_eq!(records[0]["status"], "fetchFailed");
    assert!(records[0].get("title").is_none());

    assert_eq!(records[1]["url"], "");
    assert_eq!(records[1]["status"], "invalidUrl");

    assert_eq!(records[2]["url"], url1.as_str());
    assert_eq!(records[2]["status"], "ok");
    assert_eq!(records[2]["title"], "Page One");
}

#[test]
fn catalog_patterns_file_adds_product_info() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/item/X42");
        then.status(200)
            .header("content-type", "text/html")
            .body(r#"<title>Widget</title><b class="a-price-whole">4,500</b>"#);
    });

    let temp_dir = TempDir::new().unwrap();
    let patterns_path = temp_dir.path().join("patterns.json");
    fs::write(
        &patterns_path,
        r#"[{"name":"local","host":"127.0.0.1","path_prefix":"/item/","price_class":"a-price-whole"}]"#,
    )
    .unwrap();

    ogpeek_cmd()
        .arg("--allow-private-networks")
        .arg("--catalog-patterns")
        .arg(&patterns_path)
        .arg(server.url("/item/X42"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""productInfo":{"id":"X42","price":"4,500"}"#,
        ));
}

#[test]
fn private_networks_blocked_by_default() {
    let server = MockServer::start();

    ogpeek_cmd()
        .arg(server.url("/"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"fetchFailed\""))
        .stdout(predicate::str::contains("SSRF"));
}

#[test]
fn output_to_file_pretty() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("test.html");
    let output_path = temp_dir.path().join("output.json");

    fs::write(&html_path, "<html><head><title>Saved</title></head></html>").unwrap();

    ogpeek_cmd()
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://example.com")
        .arg("--pretty")
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success();

    let output_content = fs::read_to_string(&output_path).unwrap();
    assert!(
        output_content.contains("\"title\": \"Saved\""),
        "output file should contain pretty JSON with the title"
    );
}

#[test]
fn timing_flag_prints_elapsed() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("test.html");
    fs::write(&html_path, "<title>t</title>").unwrap();

    ogpeek_cmd()
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://example.com")
        .arg("--timing")
        .assert()
        .success()
        .stderr(predicate::str::contains("elapsed:"))
        .stderr(predicate::str::contains("ms"));
}

#[test]
fn missing_patterns_file_fails() {
    ogpeek_cmd()
        .arg("--catalog-patterns")
        .arg("/nonexistent/patterns.json")
        .arg("https://example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("catalog patterns"));
}

#[test]
fn missing_url_with_html_fails() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("test.html");
    fs::write(&html_path, "<title>t</title>").unwrap();

    ogpeek_cmd()
        .arg("--html")
        .arg(&html_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url is required"));
}

#[test]
fn no_args_fails() {
    ogpeek_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one URL is required"));
}

#[test]
fn misspelled_strategy_is_rejected() {
    ogpeek_cmd()
        .arg("--strategy")
        .arg("renderd")
        .arg("https://example.com")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'renderd'"));
}

#[test]
fn strategy_alias_is_accepted() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("test.html");
    fs::write(&html_path, "<title>Alias</title>").unwrap();

    ogpeek_cmd()
        .arg("--strategy")
        .arg("chromium")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://example.com")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\":\"Alias\""));
}
