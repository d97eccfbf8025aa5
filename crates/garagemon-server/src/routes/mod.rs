pub mod activate;
pub mod front;

use crate::error::AppError;

/// Anything not routed explicitly.
pub async fn not_found() -> AppError {
    AppError::not_found("404 page not found")
}
