/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health, /session, /operations/{operation}
 * - RequestContext middleware は /health 以外に適用 (拒否はせず anonymous で通す)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth::context;
use crate::state::AppState;

use crate::api::v1::handlers::{health::health, operations::run_operation, session::session};

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/session", get(session))
        .route("/operations/{operation}", post(run_operation));

    Router::new()
        .route("/health", get(health))
        .merge(context::apply(protected, state))
}
