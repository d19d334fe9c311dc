//! Mercury core contracts and value types.
//!
//! This crate exposes the canonical message, status, and channel types shared
//! by every channel handler, plus the backend and HTTP client contracts the
//! pipelines are written against.
pub mod backend;
pub mod channel;
pub mod error;
pub mod http;
pub mod ids;
pub mod log;
pub mod msg;
pub mod prelude;
pub mod status;
pub mod urn;

pub use backend::*;
pub use channel::*;
pub use error::*;
pub use http::*;
pub use ids::*;
pub use log::*;
pub use msg::*;
pub use status::*;
pub use urn::*;
