use axum::{
    extract::State,
    http::{StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::middleware::session::session_middleware;
use crate::state::AppState;

/// Assemble the route table. Routes are declared explicitly and matched with
/// static segments before captures, so dispatch order is deterministic and
/// inspectable; everything unmatched lands in the fallback.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(page_routes())
        .merge(api_routes())
        .fallback(fallback)
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page_routes() -> Router<AppState> {
    use crate::handlers::pages::{auth, properties};

    Router::new()
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/register", get(auth::register_form).post(auth::register_submit))
        .route("/auth", get(auth::auth_action))
        .route("/properties", get(properties::index).post(properties::store))
        .route("/properties/create", get(properties::create_form))
        .route("/properties/my", get(properties::my_properties))
        .route("/properties/search", get(properties::search))
        .route("/properties/:id", get(properties::show).post(properties::update))
        .route(
            "/properties/:id/edit",
            get(properties::edit_form).post(properties::update),
        )
        .route(
            "/properties/:id/delete",
            get(properties::delete).post(properties::delete),
        )
}

fn api_routes() -> Router<AppState> {
    use axum::routing::post;

    use crate::handlers::api::properties;

    Router::new()
        .route("/api/properties", get(properties::index).post(properties::store))
        .route("/api/properties/search", get(properties::search))
        .route("/api/properties/statistics", get(properties::statistics))
        .route("/api/properties/report", get(properties::report))
        .route("/api/properties/recommended", get(properties::recommended))
        .route(
            "/api/properties/:id",
            get(properties::show)
                .put(properties::update)
                .delete(properties::destroy),
        )
        .route("/api/properties/:id/rent", post(properties::rent))
        .route("/api/properties/:id/release", post(properties::release))
}

/// Liveness plus a database ping.
async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        )
            .into_response(),
    }
}

/// Unmatched paths are not-found; anything under the reserved `admin` prefix
/// is forbidden instead.
async fn fallback(uri: Uri) -> Response {
    let path = uri.path().trim_matches('/');
    if path == "admin" || path.starts_with("admin/") {
        ApiError::forbidden("Forbidden").into_response()
    } else {
        ApiError::not_found("Not found").into_response()
    }
}
