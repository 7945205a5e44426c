//! Operation dispatch: authorize first, then hand off to the resolver.
//!
//! Operation names are opaque keys shared with the permission table. The
//! registry knows nothing about how a client spelled the request.

pub mod dashboard;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::services::auth::{
    AuthService, RequestContext,
    permissions::{Decision, DenyReason},
    principal::Principal,
};

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("resolver failed: {0}")]
    Internal(String),
}

/// One query or mutation.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        principal: Option<&Principal>,
        variables: &serde_json::Value,
    ) -> Result<serde_json::Value, ResolverError>;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("operation '{operation}' denied: {}", .reason.as_str())]
    Denied {
        operation: String,
        reason: DenyReason,
        authenticated: bool,
    },
    #[error("operation '{0}' has no resolver")]
    NoResolver(String),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

#[derive(Clone, Default)]
pub struct OperationRegistry {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.resolvers.keys().collect();
        names.sort();
        f.debug_struct("OperationRegistry")
            .field("operations", &names)
            .finish()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolvers that need no backing store.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(dashboard::OPERATION, Arc::new(dashboard::DashboardResolver));
        registry
    }

    pub fn register(&mut self, operation: impl Into<String>, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(operation.into(), resolver);
    }

    /// Permission check alone, for callers that must reject before doing
    /// any other work on the request.
    pub fn authorize(
        auth: &AuthService,
        ctx: &RequestContext,
        operation: &str,
    ) -> Result<(), DispatchError> {
        match auth.authorize(ctx, operation) {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(DispatchError::Denied {
                operation: operation.to_string(),
                reason,
                authenticated: ctx.is_authenticated(),
            }),
        }
    }

    /// Authorization runs before the resolver is looked up, so unknown
    /// operations are reported as denied, not as missing.
    #[tracing::instrument(skip_all, fields(operation = %operation))]
    pub async fn dispatch(
        &self,
        auth: &AuthService,
        ctx: &RequestContext,
        operation: &str,
        variables: &serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        Self::authorize(auth, ctx, operation)?;

        let resolver = self
            .resolvers
            .get(operation)
            .ok_or_else(|| DispatchError::NoResolver(operation.to_string()))?;

        let data = resolver.resolve(ctx.principal(), variables).await?;
        Ok(data)
    }
}
