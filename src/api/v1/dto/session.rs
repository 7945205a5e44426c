/*
 * Responsibility
 * - GET /session の response DTO
 * - token 本体や claim 全体は返さない (user_id / role / scopes / 有効期限のみ)
 */
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::auth::{RequestContext, principal::Role};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionResponse {
    pub fn from_context(ctx: &RequestContext) -> Self {
        match ctx.principal() {
            Some(principal) => Self {
                authenticated: true,
                user_id: Some(principal.user_id().to_string()),
                role: Some(principal.role()),
                scopes: principal.scopes().iter().map(str::to_string).collect(),
                expires_at: Some(principal.claims().expiry()),
            },
            None => Self {
                authenticated: false,
                user_id: None,
                role: None,
                scopes: Vec::new(),
                expires_at: None,
            },
        }
    }
}
