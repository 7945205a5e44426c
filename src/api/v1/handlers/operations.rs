/*
 * Responsibility
 * - POST /operations/{operation}
 * - 認可 → body (任意の JSON variables) の parse → OperationRegistry に dispatch
 * - 認可失敗 (401/403) は body の不正 (400) より優先する
 */
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};

use crate::{
    api::v1::{dto::operations::OperationResponse, extractors::request_ctx::CurrentContext},
    error::AppError,
    services::operations::OperationRegistry,
    state::AppState,
};

pub async fn run_operation(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(operation): Path<String>,
    body: Bytes,
) -> Result<Json<OperationResponse>, AppError> {
    OperationRegistry::authorize(&state.auth, &ctx, &operation)?;
    let variables = parse_variables(&body)?;

    let data = state
        .operations
        .dispatch(&state.auth, &ctx, &operation, &variables)
        .await?;

    Ok(Json(OperationResponse { data }))
}

/// Empty body means "no variables".
fn parse_variables(body: &[u8]) -> Result<serde_json::Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request("INVALID_JSON", format!("invalid request body: {e}")))
}
