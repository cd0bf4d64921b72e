use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::config;
use crate::database::filter::{FilterParams, PropertyFilters};
use crate::database::models::Property;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::session::SessionHandle;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::property::ReportOutput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub filters: FilterParams,
    // kept as text: flattened query strings deserialize every field as a string
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(flatten)]
    pub filters: FilterParams,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub user_id: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/properties - filtered listing with statistics and pagination
pub async fn index(State(state): State<AppState>, Query(query): Query<ListQuery>) -> ApiResult<Value> {
    let http = &config().http;
    let limit = query
        .limit
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(http.default_page_size)
        .clamp(1, http.max_page_size);
    let offset = query
        .offset
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    let filters = PropertyFilters::from_params(&query.filters);
    let properties = state.properties.list(&filters, limit, offset).await?;
    let statistics = state.properties.statistics().await?;
    let total = statistics.base.total;

    Ok(ApiResponse::success(json!({
        "properties": properties,
        "statistics": statistics,
        "pagination": {
            "limit": limit,
            "offset": offset,
            "total": total,
        },
    })))
}

/// GET /api/properties/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Property> {
    let id = parse_id(&id)?;
    let property = state
        .properties
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    Ok(ApiResponse::success(property))
}

/// POST /api/properties
pub async fn store(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Option<Json<Value>>,
) -> ApiResult<Property> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::bad_request("Invalid JSON data"));
    };
    let Some(map) = payload.as_object() else {
        return Err(ApiError::bad_request("Invalid JSON data"));
    };

    let owner = map.get("user_id").and_then(Value::as_i64);
    let service = match connect_info {
        Some(ConnectInfo(addr)) => state.properties.for_origin(addr.to_string()),
        None => state.properties.clone(),
    };

    let property = service.create(map, owner).await?;
    Ok(ApiResponse::created(property).with_message("Property created successfully"))
}

/// PUT /api/properties/{id} - partial update
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<Value>>,
) -> ApiResult<Property> {
    let id = parse_id(&id)?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::bad_request("Invalid JSON data"));
    };
    let Some(map) = payload.as_object() else {
        return Err(ApiError::bad_request("Invalid JSON data"));
    };

    let property = state.properties.update(id, map, None).await?;
    Ok(ApiResponse::success(property).with_message("Property updated successfully"))
}

/// DELETE /api/properties/{id}
pub async fn destroy(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    if state.properties.delete(id, None).await? {
        Ok(ApiResponse::success(Value::Null).with_message("Property deleted successfully"))
    } else {
        Err(ApiError::internal("Failed to delete property"))
    }
}

/// GET /api/properties/search?q=
pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Value> {
    let raw = query.q.unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }
    let needle = state.sanitizer.sanitize(&raw, "search_query");

    let filters = PropertyFilters::from_params(&query.filters);
    let results = state.properties.search(&needle, &filters).await?;
    let count = results.len();

    Ok(ApiResponse::success(json!({
        "query": needle,
        "results": results,
        "count": count,
    })))
}

/// GET /api/properties/statistics
pub async fn statistics(State(state): State<AppState>) -> ApiResult<crate::services::property::Statistics> {
    Ok(ApiResponse::success(state.properties.statistics().await?))
}

/// GET /api/properties/report?format=json|csv
pub async fn report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let format = query.format.unwrap_or_else(|| "json".to_string());
    if format != "json" && format != "csv" {
        return Err(ApiError::bad_request("Unsupported format"));
    }

    match state.properties.generate_report(&format).await? {
        ReportOutput::Json(body) => {
            Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
        }
        ReportOutput::Csv(body) => Ok((
            [
                (CONTENT_TYPE, "text/csv"),
                (
                    CONTENT_DISPOSITION,
                    "attachment; filename=\"properties_report.csv\"",
                ),
            ],
            body,
        )
            .into_response()),
        ReportOutput::Structured(_) => Err(ApiError::bad_request("Unsupported format")),
    }
}

/// GET /api/properties/recommended - newest available listings from other
/// owners; degrades to an empty list on persistence trouble.
pub async fn recommended(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<RecommendQuery>,
) -> ApiResult<Value> {
    let user_id = session
        .user()
        .map(|user| user.id)
        .or_else(|| query.user_id.as_deref().and_then(|s| s.parse().ok()))
        .unwrap_or(0);
    let limit = query
        .limit
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(5)
        .clamp(1, 50);

    let recommendations = state.properties.recommend(user_id, limit).await;
    let count = recommendations.len();
    Ok(ApiResponse::success(json!({
        "recommendations": recommendations,
        "count": count,
    })))
}

/// POST /api/properties/{id}/rent
pub async fn rent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Property> {
    let id = parse_id(&id)?;
    let property = state.properties.mark_rented(id).await?;
    Ok(ApiResponse::success(property).with_message("Property marked as rented"))
}

/// POST /api/properties/{id}/release
pub async fn release(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Property> {
    let id = parse_id(&id)?;
    let property = state.properties.mark_available(id).await?;
    Ok(ApiResponse::success(property).with_message("Property marked as available"))
}
