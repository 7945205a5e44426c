use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::services::auth::RequestContext;
use crate::state::AppState;

/// Handler で RequestContext を受け取るための extractor
/// middleware が extensions に insert 済みである前提
/// 見つからない場合 (middleware 未適用) は anonymous として扱う
pub struct CurrentContext(pub RequestContext);

impl FromRequestParts<AppState> for CurrentContext
where
    AppState: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();

        Ok(CurrentContext(ctx))
    }
}
