use std::net::SocketAddr;

use anyhow::Result;

use realty_api::config::AppConfig;
use realty_api::routes::app;
use realty_api::state::AppState;

pub struct TestServer {
    pub base_url: String,
}

/// Spin up an in-process server on an OS-assigned port with a fresh
/// embedded store. One pooled connection keeps every statement on the same
/// in-memory database instance.
pub async fn spawn_server() -> Result<TestServer> {
    let mut config = AppConfig::from_env();
    config.database.url = "sqlite::memory:".to_string();
    config.database.max_connections = 1;

    let state = AppState::build(&config).await?;
    let router = app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server");
    });

    Ok(TestServer {
        base_url: format!("http://{addr}"),
    })
}

/// Client with a cookie jar (sessions) and redirects disabled so tests can
/// assert on statuses and Location headers directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

/// Register an account through the form flow, leaving the session signed in.
pub async fn register(client: &reqwest::Client, base_url: &str, email: &str) -> Result<()> {
    let resp = client
        .post(format!("{base_url}/register"))
        .form(&[
            ("email", email),
            ("password", "passw0rd1"),
            ("confirm_password", "passw0rd1"),
            ("name", "Test User"),
        ])
        .send()
        .await?;
    anyhow::ensure!(
        resp.status() == reqwest::StatusCode::SEE_OTHER,
        "registration did not redirect: {}",
        resp.status()
    );
    Ok(())
}

/// Create a listing through the JSON API and return its envelope data.
pub async fn create_property(
    client: &reqwest::Client,
    base_url: &str,
    payload: serde_json::Value,
) -> Result<serde_json::Value> {
    let resp = client
        .post(format!("{base_url}/api/properties"))
        .json(&payload)
        .send()
        .await?;
    anyhow::ensure!(
        resp.status() == reqwest::StatusCode::CREATED,
        "create failed: {}",
        resp.status()
    );
    let body = resp.json::<serde_json::Value>().await?;
    anyhow::ensure!(body["success"].as_bool() == Some(true), "success=false: {body}");
    Ok(body["data"].clone())
}
