pub mod connector;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod status;
pub mod validate;

pub use error::AppError;
