//! Database repository implementations

pub mod feedback_repository;
pub mod session_repository;
pub mod user_repository;

pub use feedback_repository::*;
pub use session_repository::*;
pub use user_repository::*;
