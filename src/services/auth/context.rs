//! Per-request authorization context.

use std::sync::Arc;

use crate::services::auth::principal::Principal;

/// Either a fully verified principal or nothing (anonymous).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    principal: Option<Arc<Principal>>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(Arc::new(principal)),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}
