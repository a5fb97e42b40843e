//! HTTP handlers
//!
//! Every response is a JSON object with `success` plus either `message` or
//! `error`, merged with endpoint-specific keys.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::{error, info};

use super::SharedState;
use crate::executor::list_apps;
use crate::lint;
use crate::schema::SchemaDocument;
use crate::script::ScriptBuilder;
use crate::validate::validate;

pub type ApiResponse = (StatusCode, Json<Value>);

fn success(message: &str, data: Value) -> ApiResponse {
    let mut body = json!({ "success": true, "message": message });
    merge(&mut body, data);
    (StatusCode::OK, Json(body))
}

fn failure(status: StatusCode, error: &str, data: Value) -> ApiResponse {
    let mut body = json!({ "success": false, "error": error });
    merge(&mut body, data);
    (status, Json(body))
}

fn merge(body: &mut Value, data: Value) {
    if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), data) {
        target.extend(extra);
    }
}

/// Parse a request body into a document, or the 400 to send back
fn parse_document(body: &Bytes) -> Result<SchemaDocument, ApiResponse> {
    if body.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "Request body is empty", json!({})));
    }

    serde_json::from_slice(body).map_err(|e| {
        failure(
            StatusCode::BAD_REQUEST,
            "Invalid JSON",
            json!({ "message": e.to_string() }),
        )
    })
}

/// GET /health
pub async fn health() -> ApiResponse {
    success("RailYard server is running", json!({}))
}

/// POST /generate
pub async fn generate(State(state): State<SharedState>, body: Bytes) -> ApiResponse {
    let document = match parse_document(&body) {
        Ok(document) => document,
        Err(response) => return response,
    };

    let errors = validate(&document);
    if !errors.is_empty() {
        info!("Rejected schema for '{}' with {} error(s)", document.app_name, errors.len());
        return failure(
            StatusCode::BAD_REQUEST,
            "Schema validation failed",
            json!({ "errors": errors }),
        );
    }

    let script = ScriptBuilder::new(&document, state.config.generator.clone()).build();
    let report = state.runner.run(&script, &document.app_name).await;

    if report.success {
        return success(
            "Rails app generated successfully!",
            json!({ "output_path": report.path, "log": report.log }),
        );
    }

    let message = report.error.as_deref().unwrap_or("Execution failed");
    let status = if report.is_conflict() {
        StatusCode::CONFLICT
    } else {
        error!("Generation of '{}' failed: {}", document.app_name, message);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    failure(status, message, json!({ "log": report.log }))
}

/// POST /lint
pub async fn lint_schema(body: Bytes) -> ApiResponse {
    let document = match parse_document(&body) {
        Ok(document) => document,
        Err(response) => return response,
    };

    let result = lint::lint(&document);
    success("Lint complete", json!({ "warnings": result.warnings }))
}

/// GET /apps
pub async fn apps(State(state): State<SharedState>) -> ApiResponse {
    let apps = list_apps(&state.config.executor.output_path());
    success("Apps retrieved", json!({ "apps": apps }))
}
