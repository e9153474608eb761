//! HTTP surface: a single action endpoint plus status probes

pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::{ApiError, ApiResult};
pub use server::{create_router, ApiServer, AppState};
