//! HTTP API for the browser front-end.
//!
//! Routes are nested under `/api/`. Handlers are thin: extraction,
//! translation and store calls are blocking and run on the blocking pool
//! through `ApiContext::run_blocking`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer};
pub use types::ApiContext;
