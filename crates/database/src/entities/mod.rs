//! Row types for the database layer

pub mod feedback;
pub mod session;
pub mod user;

pub use feedback::{Feedback, FeedbackChanges, NewFeedback};
pub use session::{NewSession, SessionRecord};
pub use user::{NewUser, User};
