use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::database::models::SessionUser;
use crate::session::SessionStore;
use crate::state::AppState;

/// Handle on the current request's session, injected as an extension.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    store: Arc<SessionStore>,
}

impl SessionHandle {
    pub fn user(&self) -> Option<SessionUser> {
        self.store.current_user(&self.id)
    }

    pub fn sign_in(&self, user: SessionUser) {
        self.store.sign_in(&self.id, user);
    }

    pub fn destroy(&self) {
        self.store.destroy(&self.id);
    }

    pub fn set_flash(&self, key: &str, value: Value) {
        self.store.set_flash(&self.id, key, value);
    }

    pub fn take_flash(&self, key: &str) -> Option<Value> {
        self.store.take_flash(&self.id, key)
    }
}

/// Resolve the session for the request: reuse a live session named by the
/// cookie, otherwise create one and set the cookie on the way out.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = crate::config::config().security.session_cookie.as_str();

    let existing = request
        .headers()
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| cookie_value(raw, cookie_name))
        .filter(|id| state.sessions.exists(id));

    let (id, is_new) = match existing {
        Some(id) => (id, false),
        None => (state.sessions.create(), true),
    };

    request.extensions_mut().insert(SessionHandle {
        id: id.clone(),
        store: state.sessions.clone(),
    });

    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!("{cookie_name}={id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn cookie_value(raw: &str, name: &str) -> Option<String> {
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
