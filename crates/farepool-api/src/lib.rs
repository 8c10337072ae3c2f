pub mod auth;
pub mod bills;
pub mod chat;
pub mod error;
pub mod groups;
pub mod locations;
pub mod members;
pub mod middleware;
pub mod posts;
pub mod recommend;
pub mod reports;
pub mod users;

use farepool_db::DbError;
use tracing::error;

pub use error::ApiError;

/// Runs blocking DB work off the async runtime, the same way every handler
/// needs it.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
