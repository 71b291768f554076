#![allow(missing_docs)]
use predicates::prelude::*;
use serde_json::Value;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OEMBED_JSON: &str = r#"{"version":"1.0","type":"rich","html":"<div></div>"}"#;

async fn mount_site(server: &MockServer) {
    let page = format!(
        "<html><head><link rel=\"alternate\" type=\"text/xml+oembed\" href=\"/oembed.xml\">\
         <link rel=\"alternate\" type=\"application/json+oembed\" href=\"{}/oembed.json\"></head>\
         <body></body></html>",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/post/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oembed.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/json")
                .set_body_string(OEMBED_JSON),
        )
        .mount(server)
        .await;
}

fn oembed(config: &NamedTempFile) -> anyhow::Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("oembed")?;
    cmd.env_remove("OEMBED_CONFIG").arg("--config").arg(config.path());
    Ok(cmd)
}

#[tokio::test]
async fn links_prints_discovered_links_as_json() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let config = NamedTempFile::new()?;

    let out = oembed(&config)?
        .args(["links", &format!("{}/post/1", server.uri()), "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let links: Value = serde_json::from_slice(&out)?;
    let links = links.as_array().cloned().unwrap_or_default();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["type"], "text/xml+oembed");
    assert_eq!(links[1]["href"], format!("{}/oembed.json", server.uri()));
    Ok(())
}

#[tokio::test]
async fn get_selects_format_and_prints_body() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let config = NamedTempFile::new()?;

    oembed(&config)?
        .args(["get", &format!("{}/post/1", server.uri()), "--format", "json"])
        .assert()
        .success()
        .stdout(OEMBED_JSON);
    Ok(())
}

#[tokio::test]
async fn fetch_forwards_options_and_includes_headers() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("maxwidth", "500"))
        .and(query_param("maxheight", "300"))
        .and(header("Accept-Language", "de"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Provider", "mock")
                .set_body_string(OEMBED_JSON),
        )
        .mount(&server)
        .await;
    let config = NamedTempFile::new()?;

    oembed(&config)?
        .args([
            "fetch",
            &format!("{}/oembed?url=x", server.uri()),
            "--maxwidth",
            "500",
            "--maxheight",
            "300",
            "-H",
            "Accept-Language: de",
            "--include",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("200 OK\n"))
        .stdout(predicate::str::contains("x-provider: mock\n"))
        .stdout(predicate::str::ends_with(OEMBED_JSON));
    Ok(())
}

#[tokio::test]
async fn not_modified_fails_with_message() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    let config = NamedTempFile::new()?;

    oembed(&config)?
        .args(["fetch", &format!("{}/oembed", server.uri())])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not modified"));
    Ok(())
}

#[tokio::test]
async fn provider_file_override_skips_network() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let config = NamedTempFile::new()?;
    let providers = NamedTempFile::new()?;
    std::fs::write(
        providers.path(),
        r#"[{"templates": ["^clips\\.test/(\\d+)"],
             "links": [{"href": "https://clips.test/oembed?id={part1}", "type": "application/json+oembed"}]}]"#,
    )?;

    oembed(&config)?
        .arg("--providers")
        .arg(providers.path())
        .args(["links", "https://clips.test/77"])
        .assert()
        .success()
        .stdout("application/json+oembed\thttps://clips.test/oembed?id=77\n");
    Ok(())
}

#[test]
fn invalid_config_is_reported() -> anyhow::Result<()> {
    let config = NamedTempFile::new()?;
    std::fs::write(config.path(), "[cache]\noembed_ttl_secs = \"forever\"\n")?;

    oembed(&config)?
        .args(["links", "https://example.com/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
    Ok(())
}
