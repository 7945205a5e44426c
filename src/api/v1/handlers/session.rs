/*
 * Responsibility
 * - GET /session
 * - middleware が作った RequestContext をそのまま返す (anonymous でも 200)
 */
use axum::Json;

use crate::api::v1::{dto::session::SessionResponse, extractors::request_ctx::CurrentContext};

pub async fn session(CurrentContext(ctx): CurrentContext) -> Json<SessionResponse> {
    Json(SessionResponse::from_context(&ctx))
}
