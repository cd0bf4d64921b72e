use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::config::config;
use crate::database::filter::{FilterParams, PropertyFilters};
use crate::database::models::{PropertyStatus, PropertyType};
use crate::middleware::session::SessionHandle;
use crate::security::sanitizer::escape_html;
use crate::security::Sanitizer;
use crate::services::property::ListingDraft;
use crate::services::ServiceError;
use crate::state::AppState;
use crate::view::Page;

/// Listing form fields. Everything arrives as text; absent and empty fields
/// are distinguished because absence falls back to the form defaults.
#[derive(Debug, Deserialize)]
pub struct PropertyForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub price: Option<String>,
    pub rooms: Option<String>,
    pub area: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(flatten)]
    pub filters: FilterParams,
}

struct ParsedForm {
    title: String,
    description: String,
    address: String,
    price: f64,
    rooms: i64,
    area: f64,
    property_type: PropertyType,
    status: PropertyStatus,
}

impl ParsedForm {
    fn from(form: &PropertyForm, sanitizer: &Sanitizer) -> Self {
        Self {
            title: sanitizer.sanitize(form.title.as_deref().unwrap_or(""), "title"),
            description: sanitizer.sanitize(form.description.as_deref().unwrap_or(""), "description"),
            address: sanitizer.sanitize(form.address.as_deref().unwrap_or(""), "address"),
            price: form
                .price
                .as_deref()
                .map(|s| s.trim().parse::<f64>().unwrap_or(0.0))
                .unwrap_or(0.0),
            rooms: form
                .rooms
                .as_deref()
                .map(|s| s.trim().parse::<i64>().unwrap_or(0))
                .unwrap_or(1),
            area: form
                .area
                .as_deref()
                .map(|s| s.trim().parse::<f64>().unwrap_or(0.0))
                .unwrap_or(0.0),
            property_type: sanitizer
                .sanitize(form.property_type.as_deref().unwrap_or(""), "type")
                .parse()
                .unwrap_or(PropertyType::Apartment),
            status: sanitizer
                .sanitize(form.status.as_deref().unwrap_or(""), "status")
                .parse()
                .unwrap_or(PropertyStatus::Available),
        }
    }

    fn old_input(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "description": self.description,
            "address": self.address,
            "price": self.price,
            "rooms": self.rooms,
            "area": self.area,
            "type": self.property_type,
            "status": self.status,
        })
    }

    fn into_draft(self) -> ListingDraft {
        ListingDraft {
            title: self.title,
            description: self.description,
            address: self.address,
            price: self.price,
            rooms: self.rooms,
            area: self.area,
            property_type: self.property_type,
            status: self.status,
        }
    }
}

fn filters_context(params: &FilterParams) -> serde_json::Value {
    json!({
        "type": params.property_type.as_deref().unwrap_or(""),
        "status": params.status.as_deref().unwrap_or(""),
        "min_price": params.min_price.as_deref().unwrap_or(""),
        "max_price": params.max_price.as_deref().unwrap_or(""),
        "rooms": params.rooms.as_deref().unwrap_or(""),
    })
}

fn scoped_sanitizer(state: &AppState, connect_info: &Option<ConnectInfo<SocketAddr>>) -> Sanitizer {
    match connect_info {
        Some(ConnectInfo(addr)) => state.sanitizer.for_origin(addr.to_string()),
        None => state.sanitizer.clone(),
    }
}

/// GET /properties - filtered listing
pub async fn index(State(state): State<AppState>, Query(params): Query<FilterParams>) -> Response {
    let filters = PropertyFilters::from_params(&params);
    match state
        .properties
        .list(&filters, config().http.max_page_size, 0)
        .await
    {
        Ok(properties) => state.views.render(
            Page::new("properties/index")
                .with("title", "Properties")
                .with("properties", &properties)
                .with("filters", filters_context(&params)),
        ),
        Err(err) => {
            error!(error = %err, "failed to load properties");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load properties")
        }
    }
}

/// GET /properties/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return state.views.error_page(StatusCode::NOT_FOUND, "Property not found");
    };
    match state.properties.get(id).await {
        Ok(Some(property)) => state.views.render(
            Page::new("properties/show")
                .with("title", escape_html(&property.title))
                .with("property", &property),
        ),
        Ok(None) => state.views.error_page(StatusCode::NOT_FOUND, "Property not found"),
        Err(err) => {
            error!(property_id = id, error = %err, "failed to load property");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load property")
        }
    }
}

/// GET /properties/create
pub async fn create_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Response {
    if session.user().is_none() {
        return Redirect::to("/login").into_response();
    }
    let errors = session.take_flash("property_errors").unwrap_or(json!([]));
    let old_input = session.take_flash("property_input").unwrap_or(json!({}));
    state.views.render(
        Page::new("properties/create")
            .with("title", "Add property")
            .with("errors", errors)
            .with("old_input", old_input),
    )
}

/// POST /properties - create from the HTML form.
///
/// Form rules: title and address required, price positive, at least one
/// room. The service-level payload validation used by the JSON API is
/// stricter about titles and laxer about rooms; both rule sets are kept
/// where they were observed.
pub async fn store(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<PropertyForm>,
) -> Response {
    let Some(user) = session.user() else {
        return Redirect::to("/login").into_response();
    };

    let sanitizer = scoped_sanitizer(&state, &connect_info);
    let parsed = ParsedForm::from(&form, &sanitizer);

    let mut errors: Vec<String> = Vec::new();
    if parsed.title.is_empty() {
        errors.push("Title is required".to_string());
    }
    if parsed.address.is_empty() {
        errors.push("Address is required".to_string());
    }
    if parsed.price <= 0.0 {
        errors.push("Price must be greater than 0".to_string());
    }
    if parsed.rooms < 1 {
        errors.push("Rooms must be at least 1".to_string());
    }
    if !errors.is_empty() {
        session.set_flash("property_errors", json!(errors));
        session.set_flash("property_input", parsed.old_input());
        return Redirect::to("/properties/create").into_response();
    }

    match state.properties.store_listing(parsed.into_draft(), user.id).await {
        Ok(property) => {
            let id = property.id.unwrap_or_default();
            Redirect::to(&format!("/properties/{id}")).into_response()
        }
        Err(err) => {
            error!(error = %err, "property creation failed");
            session.set_flash("property_errors", json!(["Failed to create property"]));
            Redirect::to("/properties/create").into_response()
        }
    }
}

/// GET /properties/{id}/edit
pub async fn edit_form(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Response {
    let Some(user) = session.user() else {
        return Redirect::to("/login").into_response();
    };
    let Ok(id) = id.parse::<i64>() else {
        return state.views.error_page(StatusCode::NOT_FOUND, "Property not found");
    };

    match state.properties.get(id).await {
        Ok(Some(property)) => {
            if !property.is_owned_by(user.id) {
                return state
                    .views
                    .error_page(StatusCode::FORBIDDEN, "You do not have access to this listing");
            }
            let errors = session.take_flash("property_errors").unwrap_or(json!([]));
            let old_input = session.take_flash("property_input").unwrap_or(json!({}));
            state.views.render(
                Page::new("properties/edit")
                    .with("title", "Edit property")
                    .with("property", &property)
                    .with("errors", errors)
                    .with("old_input", old_input),
            )
        }
        Ok(None) => state.views.error_page(StatusCode::NOT_FOUND, "Property not found"),
        Err(err) => {
            error!(property_id = id, error = %err, "failed to load property for editing");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load property")
        }
    }
}

/// POST /properties/{id} and POST /properties/{id}/edit - update from the
/// HTML form. The form rules here never constrain rooms.
pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<PropertyForm>,
) -> Response {
    let Some(user) = session.user() else {
        return Redirect::to("/login").into_response();
    };
    let Ok(id) = id.parse::<i64>() else {
        return state.views.error_page(StatusCode::NOT_FOUND, "Property not found");
    };

    let sanitizer = scoped_sanitizer(&state, &connect_info);
    let parsed = ParsedForm::from(&form, &sanitizer);

    let mut errors: Vec<String> = Vec::new();
    if parsed.title.is_empty() {
        errors.push("Title is required".to_string());
    }
    if parsed.address.is_empty() {
        errors.push("Address is required".to_string());
    }
    if parsed.price <= 0.0 {
        errors.push("Price must be greater than 0".to_string());
    }
    if !errors.is_empty() {
        session.set_flash("property_errors", json!(errors));
        session.set_flash("property_input", parsed.old_input());
        return Redirect::to(&format!("/properties/{id}/edit")).into_response();
    }

    match state
        .properties
        .update_listing(id, parsed.into_draft(), user.id)
        .await
    {
        Ok(_) => Redirect::to(&format!("/properties/{id}")).into_response(),
        Err(ServiceError::NotFound(_)) => {
            state.views.error_page(StatusCode::NOT_FOUND, "Property not found")
        }
        Err(ServiceError::Forbidden(_)) => state
            .views
            .error_page(StatusCode::FORBIDDEN, "You do not have access to this listing"),
        Err(err) => {
            error!(property_id = id, error = %err, "property update failed");
            session.set_flash("property_errors", json!(["Failed to update property"]));
            Redirect::to(&format!("/properties/{id}/edit")).into_response()
        }
    }
}

/// GET/POST /properties/{id}/delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Response {
    let Some(user) = session.user() else {
        return Redirect::to("/login").into_response();
    };
    let Ok(id) = id.parse::<i64>() else {
        return state.views.error_page(StatusCode::NOT_FOUND, "Property not found");
    };

    match state.properties.delete(id, Some(user.id)).await {
        Ok(_) => Redirect::to("/properties").into_response(),
        Err(ServiceError::NotFound(_)) => {
            state.views.error_page(StatusCode::NOT_FOUND, "Property not found")
        }
        Err(ServiceError::Forbidden(_)) => state
            .views
            .error_page(StatusCode::FORBIDDEN, "You do not have access to this listing"),
        Err(err) => {
            error!(property_id = id, error = %err, "property deletion failed");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete property")
        }
    }
}

/// GET /properties/search?q=
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = state
        .sanitizer
        .sanitize(params.q.as_deref().unwrap_or(""), "search_query");
    if query.is_empty() {
        return Redirect::to("/properties").into_response();
    }

    let filters = PropertyFilters::from_params(&params.filters);
    match state.properties.search(&query, &filters).await {
        Ok(properties) => state.views.render(
            Page::new("properties/search")
                .with("title", "Search results")
                .with("properties", &properties)
                .with("query", &query)
                .with("filters", filters_context(&params.filters)),
        ),
        Err(err) => {
            error!(query = %query, error = %err, "property search failed");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Search failed")
        }
    }
}

/// GET /properties/my - the signed-in user's own listings
pub async fn my_properties(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Response {
    let Some(user) = session.user() else {
        return Redirect::to("/login").into_response();
    };

    match state.properties.list_by_owner(user.id).await {
        Ok(properties) => state.views.render(
            Page::new("properties/my")
                .with("title", "My listings")
                .with("properties", &properties),
        ),
        Err(err) => {
            error!(user_id = user.id, error = %err, "failed to load user properties");
            state
                .views
                .error_page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load listings")
        }
    }
}
