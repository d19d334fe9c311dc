//! Gateway wiring: the webhook router over the handler registry and the
//! outbound send worker pool. The binary entrypoint lives in `main.rs`.
pub mod config;
pub mod http;
pub mod worker;
