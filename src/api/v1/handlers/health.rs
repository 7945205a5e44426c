/*
 * Responsibility
 * - GET /health, GET /api/v1/health (疎通用)
 * - 認証・JWKS の状態には依存しない
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
