//! `Authorization` ヘッダ → RequestContext を extensions に入れる
//!
//! - ヘッダなし / 検証失敗はどちらも anonymous として先に進める (401 にはしない)
//! - 認可 (operation ごとの allow/deny) は dispatch 側で判断する

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::state::AppState;

/// Attach a `RequestContext` to every request under `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, request_context_middleware))
}

async fn request_context_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Non-UTF-8 header values cannot hold a JWT; treat them like an absent header.
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let ctx = state.auth.build_context(authorization.as_deref()).await;

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(ctx);

    next.run(req).await
}
