pub mod callbacks;
pub mod error;
pub mod service_registry;

pub use error::AppError;
