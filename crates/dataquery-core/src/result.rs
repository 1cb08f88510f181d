//! Convenience result type alias for DataQuery.

use crate::error::AppError;

/// A specialized `Result` type for DataQuery operations.
pub type AppResult<T> = Result<T, AppError>;
