use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::services::auth::{
    context::RequestContext,
    permissions::{Decision, PermissionTable},
    principal::Principal,
    verifier::{TokenVerifier, token_fingerprint},
};

/// Builds request contexts from `Authorization` headers and answers
/// per-operation authorization questions.
///
/// Constructed once at startup and shared through `AppState`.
#[derive(Debug)]
pub struct AuthService {
    verifier: TokenVerifier,
    claim_namespace: String,
    permissions: PermissionTable,
}

impl AuthService {
    pub fn new(
        verifier: TokenVerifier,
        claim_namespace: impl Into<String>,
        permissions: PermissionTable,
    ) -> Self {
        Self {
            verifier,
            claim_namespace: claim_namespace.into(),
            permissions,
        }
    }

    pub async fn build_context(&self, authorization: Option<&str>) -> RequestContext {
        self.build_context_at(authorization, Utc::now()).await
    }

    /// Absent header -> anonymous. Any verification or claim failure also
    /// degrades to anonymous; it is logged, never returned.
    pub async fn build_context_at(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> RequestContext {
        let Some(header) = authorization else {
            return RequestContext::anonymous();
        };

        let token = match TokenVerifier::strip_bearer(header) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "ignoring authorization header");
                return RequestContext::anonymous();
            }
        };

        let claims = match self.verifier.verify(token, now).await {
            Ok(claims) => claims,
            Err(err) => {
                warn!(
                    error = %err,
                    token = %token_fingerprint(token),
                    "access token verification failed"
                );
                return RequestContext::anonymous();
            }
        };

        match Principal::from_claims(claims, &self.claim_namespace) {
            Ok(principal) => {
                debug!(user_id = principal.user_id(), role = %principal.role(), "request authenticated");
                RequestContext::authenticated(principal)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    token = %token_fingerprint(token),
                    "verified token lacks principal claims"
                );
                RequestContext::anonymous()
            }
        }
    }

    pub fn authorize(&self, ctx: &RequestContext, operation: &str) -> Decision {
        let decision = self.permissions.authorize(ctx.principal(), operation);
        if let Decision::Deny(reason) = &decision {
            debug!(
                operation,
                reason = reason.as_str(),
                authenticated = ctx.is_authenticated(),
                "operation denied"
            );
        }
        decision
    }
}
