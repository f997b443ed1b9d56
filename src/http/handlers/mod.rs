//! Route handlers
//!
//! Store operations read and rewrite whole JSON files under a lock, so
//! handlers run them through [`run_blocking`] instead of on a runtime worker.

pub mod artifacts;
pub mod health;
pub mod projects;
pub mod results;
pub mod script;

use crate::http::error::ApiError;

/// Run a synchronous store operation on the blocking pool
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}
