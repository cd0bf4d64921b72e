mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seed_two(client: &reqwest::Client, base_url: &str) -> Result<()> {
    common::create_property(
        client,
        base_url,
        json!({"title": "First flat", "address": "A st. 1", "price": 100000, "rooms": 2}),
    )
    .await?;
    common::create_property(
        client,
        base_url,
        json!({"title": "Second house", "address": "B st. 2", "price": 300000.5, "rooms": 4, "type": "house"}),
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn csv_report_has_header_and_one_row_per_property() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();
    seed_two(&client, &server.base_url).await?;

    let resp = client
        .get(format!(
            "{}/api/properties/report?format=csv",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"].to_str()?.starts_with("text/csv"));
    assert!(resp.headers()["content-disposition"]
        .to_str()?
        .contains("properties_report.csv"));

    let body = resp.text().await?;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3, "header plus two rows: {body}");
    assert_eq!(lines[0], "ID,Title,Address,Price,Type,Status");
    // prices carry two decimals
    assert!(lines.iter().any(|l| l.contains("100000.00")));
    assert!(lines.iter().any(|l| l.contains("300000.50")));
    assert!(lines.iter().any(|l| l.contains("\"Second house\"")));

    Ok(())
}

#[tokio::test]
async fn json_report_embeds_statistics_and_properties() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();
    seed_two(&client, &server.base_url).await?;

    let resp = client
        .get(format!(
            "{}/api/properties/report?format=json",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()?
        .starts_with("application/json"));

    let body = resp.text().await?;
    // pretty encoding spans lines
    assert!(body.lines().count() > 1);
    let report: Value = serde_json::from_str(&body)?;
    assert_eq!(report["total_properties"], 2);
    assert_eq!(report["properties"].as_array().unwrap().len(), 2);
    assert_eq!(report["statistics"]["total"], 2);
    assert!(report["generated_at"].is_string());

    Ok(())
}

#[tokio::test]
async fn unsupported_report_format_is_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();

    let resp = client
        .get(format!(
            "{}/api/properties/report?format=xml",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.json::<Value>().await?;
    assert_eq!(body["error"], "Unsupported format");

    Ok(())
}

#[tokio::test]
async fn statistics_surface_base_and_derived_figures() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();
    seed_two(&client, &server.base_url).await?;

    let body = client
        .get(format!("{}/api/properties/statistics", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["success"], Value::Bool(true));
    let stats = &body["data"];
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["available"], 2);
    assert_eq!(stats["rented"], 0);
    assert_eq!(stats["min_price"], 100000.0);
    assert_eq!(stats["max_price"], 300000.5);
    assert_eq!(stats["by_type"]["apartment"], 1);
    assert_eq!(stats["by_type"]["house"], 1);
    assert_eq!(stats["recent_count"], 2);

    Ok(())
}

#[tokio::test]
async fn statistics_on_empty_store() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();

    let body = client
        .get(format!("{}/api/properties/statistics", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let stats = &body["data"];
    assert_eq!(stats["total"], 0);
    assert_eq!(stats["avg_price"], Value::Null);

    Ok(())
}
