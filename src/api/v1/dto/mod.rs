pub mod operations;
pub mod session;
