//! Engine error abstractions.

pub use syncline_core::AppError;

/// A result type used at the backend API boundary.
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Map any unstructured error into the transport variant of the taxonomy.
pub fn transport_err(err: impl std::fmt::Display) -> AppError {
    AppError::Transport(err.to_string())
}
