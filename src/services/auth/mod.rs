pub mod claims;
pub mod context;
pub mod factory;
pub mod jwks;
pub mod permissions;
pub mod principal;
pub mod service;
pub mod verifier;

pub use context::RequestContext;
pub use factory::build_auth_service;
pub use service::AuthService;
