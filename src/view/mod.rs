use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::security::sanitizer::escape_html;

/// Render instruction: a template name plus the key-value context the
/// external template layer consumes.
#[derive(Debug, Clone)]
pub struct Page {
    pub template: String,
    pub context: Map<String, Value>,
}

impl Page {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            context: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.context.insert(key.to_string(), value);
        self
    }
}

/// Boundary to the template collaborator. The built-in engine emits a bare
/// HTML shell carrying the template name and the context payload; a real
/// template stack plugs in here without touching the handlers.
#[derive(Debug, Default)]
pub struct ViewEngine;

impl ViewEngine {
    pub fn render(&self, page: Page) -> Response {
        let title = page
            .context
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Realty");
        let payload = serde_json::to_string(&Value::Object(page.context.clone()))
            .unwrap_or_else(|_| "{}".to_string());

        Html(format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
             <body data-template=\"{}\">\n\
             <script type=\"application/json\" id=\"page-context\">{}</script>\n\
             </body>\n</html>",
            escape_html(title),
            escape_html(&page.template),
            payload
        ))
        .into_response()
    }

    pub fn error_page(&self, status: StatusCode, message: &str) -> Response {
        let mut response = self.render(
            Page::new("error")
                .with("title", "Error")
                .with("message", message),
        );
        *response.status_mut() = status;
        response
    }
}
