use serde_json::json;
use tiny_http::Method;
use tracing::{debug, warn};

use crate::editor::ConfigEditor;
use crate::engine::FieldUpdate;
use crate::error::{EditorError, EditorResult};

const PAGE_TEMPLATE: &str = include_str!("page.html");

pub const INDEX_PATH: &str = "/";
pub const FETCH_PATH: &str = "/api/get_parsed_config";
pub const SAVE_PATH: &str = "/api/save_parsed_config";
pub const SAVE_AND_PUSH_PATH: &str = "/api/save_and_push_config";

/// Response produced by the router, independent of the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl ApiResponse {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string(),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    pub fn from_error(err: &EditorError) -> Self {
        if err.status_code() >= 500 {
            warn!("Request failed: {}", err);
        } else {
            debug!("Request rejected: {}", err);
        }
        Self::json(err.status_code(), err.to_json())
    }
}

/// Maps API requests onto the config editor
#[derive(Clone)]
pub struct Router {
    editor: ConfigEditor,
}

impl Router {
    pub fn new(editor: ConfigEditor) -> Self {
        Self { editor }
    }

    pub async fn handle(&self, method: &Method, url: &str, body: &[u8]) -> ApiResponse {
        let path = url.split('?').next().unwrap_or(url);

        match (method, path) {
            (Method::Get, INDEX_PATH) => ApiResponse::html(render_page(self.editor.can_publish())),
            (Method::Get, FETCH_PATH) => match self.editor.fetch().await {
                Ok(fields) => ApiResponse::json(200, json!(fields)),
                Err(e) => ApiResponse::from_error(&e),
            },
            (Method::Post, SAVE_PATH) => {
                let result = match parse_update(body) {
                    Ok(update) => self.editor.save(&update).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(_) => ApiResponse::json(200, json!({"status": "success"})),
                    Err(e) => ApiResponse::from_error(&e),
                }
            }
            (Method::Post, SAVE_AND_PUSH_PATH) => {
                let result = match parse_update(body) {
                    Ok(update) => self.editor.save_and_publish(&update).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(_) => ApiResponse::json(
                        200,
                        json!({"status": "Configuration saved and pushed to Git successfully!"}),
                    ),
                    Err(e) => ApiResponse::from_error(&e),
                }
            }
            (_, INDEX_PATH | FETCH_PATH | SAVE_PATH | SAVE_AND_PUSH_PATH) => ApiResponse::json(
                405,
                json!({"error": format!("Method {} not allowed", method), "error_type": "method_not_allowed"}),
            ),
            _ => ApiResponse::json(
                404,
                json!({"error": "Not found", "error_type": "not_found"}),
            ),
        }
    }
}

/// Decode a JSON save request; field values must be strings
fn parse_update(body: &[u8]) -> EditorResult<FieldUpdate> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(EditorError::invalid_argument("Invalid request: empty body"));
    }
    Ok(serde_json::from_slice(body)?)
}

fn render_page(publish_enabled: bool) -> String {
    PAGE_TEMPLATE.replace(
        "{{PUBLISH_ENABLED}}",
        if publish_enabled { "true" } else { "false" },
    )
}
