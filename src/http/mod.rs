//! HTTP surface
//!
//! Device callbacks, administration endpoints, artifact uploads and the live
//! session feed, all on one axum router.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::{create_router, serve};
pub use state::AppState;
