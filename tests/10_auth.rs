mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn register_login_logout_flow() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();

    common::register(&client, &server.base_url, "user@example.com").await?;

    // Registration signs the session in
    let check = client
        .get(format!("{}/auth?action=check", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(check["authenticated"], Value::Bool(true));
    assert_eq!(check["user"]["email"], "user@example.com");
    assert!(check["user"].get("password").is_none());

    // Logout terminates the session with a redirect
    let logout = client
        .get(format!("{}/auth?action=logout", server.base_url))
        .send()
        .await?;
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);

    let check = client
        .get(format!("{}/auth?action=check", server.base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(check["authenticated"], Value::Bool(false));
    assert_eq!(check["user"], Value::Null);

    // Fresh login works against the stored hash
    let login = client
        .post(format!("{}/login", server.base_url))
        .form(&[("email", "user@example.com"), ("password", "passw0rd1")])
        .send()
        .await?;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(login.headers()["location"], "/properties");

    Ok(())
}

#[tokio::test]
async fn failed_logins_are_indistinguishable() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();
    common::register(&client, &server.base_url, "user@example.com").await?;

    let other = common::client();
    let wrong_password = other
        .post(format!("{}/login", server.base_url))
        .form(&[("email", "user@example.com"), ("password", "wrong1234")])
        .send()
        .await?;
    let unknown_email = other
        .post(format!("{}/login", server.base_url))
        .form(&[("email", "ghost@example.com"), ("password", "passw0rd1")])
        .send()
        .await?;

    assert_eq!(wrong_password.status(), StatusCode::SEE_OTHER);
    assert_eq!(unknown_email.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        wrong_password.headers()["location"],
        unknown_email.headers()["location"]
    );

    Ok(())
}

#[tokio::test]
async fn duplicate_email_bounces_back_with_flash() -> Result<()> {
    let server = common::spawn_server().await?;
    let first = common::client();
    common::register(&first, &server.base_url, "user@example.com").await?;

    let second = common::client();
    let resp = second
        .post(format!("{}/register", server.base_url))
        .form(&[
            ("email", "user@example.com"),
            ("password", "passw0rd1"),
            ("confirm_password", "passw0rd1"),
            ("name", "Copycat"),
        ])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/register");

    // Flash survives exactly one page load
    let page = second
        .get(format!("{}/register", server.base_url))
        .send()
        .await?
        .text()
        .await?;
    assert!(page.contains("already exists"), "flash missing: {page}");

    let page = second
        .get(format!("{}/register", server.base_url))
        .send()
        .await?
        .text()
        .await?;
    assert!(!page.contains("already exists"), "flash should be read-once");

    Ok(())
}

#[tokio::test]
async fn register_validation_collects_complaints() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();

    let resp = client
        .post(format!("{}/register", server.base_url))
        .form(&[
            ("email", "not-an-email"),
            ("password", "short"),
            ("confirm_password", "short"),
            ("name", ""),
        ])
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/register");

    let page = client
        .get(format!("{}/register", server.base_url))
        .send()
        .await?
        .text()
        .await?;
    assert!(page.contains("Invalid email format"));
    assert!(page.contains("Password must be at least 8 characters"));
    assert!(page.contains("Name is required"));

    Ok(())
}

#[tokio::test]
async fn auth_without_action_redirects_to_login() -> Result<()> {
    let server = common::spawn_server().await?;
    let client = common::client();

    let resp = client.get(format!("{}/auth", server.base_url)).send().await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/login");

    Ok(())
}
