use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::database::models::SessionUser;
use crate::middleware::session::SessionHandle;
use crate::security::sanitizer::escape_html;
use crate::security::validate_email;
use crate::services::ServiceError;
use crate::state::AppState;
use crate::view::Page;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub action: Option<String>,
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Response {
    let errors = session.take_flash("login_errors").unwrap_or(json!([]));
    let old_input = session.take_flash("old_input").unwrap_or(json!({}));
    state.views.render(
        Page::new("login")
            .with("title", "Sign in")
            .with("errors", errors)
            .with("old_input", old_input),
    )
}

/// POST /login
pub async fn login_submit(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_string();

    let mut errors: Vec<String> = Vec::new();
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !validate_email(&email) {
        errors.push("Invalid email format".to_string());
    }
    if form.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
        session.set_flash("login_errors", json!(errors));
        session.set_flash("old_input", json!({ "email": escape_html(&email) }));
        return Redirect::to("/login").into_response();
    }

    match state.accounts.authenticate(&email, &form.password).await {
        Ok(Some(user)) => {
            info!(user_id = user.id, "user signed in");
            session.sign_in(user);
            Redirect::to("/properties").into_response()
        }
        Ok(None) => {
            session.set_flash("login_errors", json!(["Invalid email or password"]));
            session.set_flash("old_input", json!({ "email": escape_html(&email) }));
            Redirect::to("/login").into_response()
        }
        Err(err) => {
            error!(error = %err, "login failed");
            session.set_flash("login_errors", json!(["Login failed, please try again"]));
            Redirect::to("/login").into_response()
        }
    }
}

/// GET /register
pub async fn register_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Response {
    let errors = session.take_flash("register_errors").unwrap_or(json!([]));
    let old_input = session.take_flash("old_input").unwrap_or(json!({}));
    state.views.render(
        Page::new("register")
            .with("title", "Register")
            .with("errors", errors)
            .with("old_input", old_input),
    )
}

/// POST /register
pub async fn register_submit(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let old_input = json!({
        "email": escape_html(form.email.trim()),
        "name": escape_html(form.name.trim()),
    });

    if form.password != form.confirm_password {
        session.set_flash("register_errors", json!(["Passwords do not match"]));
        session.set_flash("old_input", old_input);
        return Redirect::to("/register").into_response();
    }

    let accounts = match connect_info {
        Some(ConnectInfo(addr)) => state.accounts.for_origin(addr.to_string()),
        None => state.accounts.clone(),
    };

    match accounts.register(&form.email, &form.password, &form.name).await {
        Ok(user_id) => {
            // Sign the fresh account in with the stored identity
            match accounts.authenticate(&form.email, &form.password).await {
                Ok(Some(user)) => session.sign_in(user),
                _ => session.sign_in(SessionUser {
                    id: user_id,
                    email: form.email.trim().to_string(),
                    name: form.name.trim().to_string(),
                }),
            }
            Redirect::to("/properties").into_response()
        }
        Err(ServiceError::Validation(errors)) => {
            session.set_flash("register_errors", json!(errors));
            session.set_flash("old_input", old_input);
            Redirect::to("/register").into_response()
        }
        Err(ServiceError::Conflict(message)) => {
            session.set_flash("register_errors", json!([message]));
            session.set_flash("old_input", old_input);
            Redirect::to("/register").into_response()
        }
        Err(err) => {
            error!(error = %err, "registration failed");
            session.set_flash("register_errors", json!(["Registration failed, please try again"]));
            session.set_flash("old_input", old_input);
            Redirect::to("/register").into_response()
        }
    }
}

/// GET /auth?action=check|logout - session introspection and termination
pub async fn auth_action(
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<AuthQuery>,
) -> Response {
    match query.action.as_deref() {
        Some("check") => {
            let user = session.user();
            Json(json!({
                "authenticated": user.is_some(),
                "user": user,
            }))
            .into_response()
        }
        Some("logout") => {
            info!("user logout");
            session.destroy();
            Redirect::to("/properties").into_response()
        }
        _ => Redirect::to("/login").into_response(),
    }
}
