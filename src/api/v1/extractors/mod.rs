pub mod request_ctx;
