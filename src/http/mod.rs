pub mod cors;
pub mod error;
pub mod fields;
mod handlers;
mod router;
pub mod types;

pub use error::ApiError;
pub use handlers::tasks::LEGACY_ASSIGNEES;
pub use router::router;
pub use types::AppState;
