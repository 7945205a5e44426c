//! Resource-server side of the dashboard: bearer-token verification against
//! the identity provider's published key set, a request context, and a
//! fail-closed per-operation permission table in front of the resolvers.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
