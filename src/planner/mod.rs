//! Planner domain: subjects, assignments, and attendance tracking.
//!
//! Kept in its own SQLite database so the planner works with no network at
//! all. The worker only ever touches the shell cache, never this data.

mod store;
mod types;

pub use store::PlannerStore;
pub use types::{AttendanceAction, Subject, UpcomingAssignment};
