pub mod conflict;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod weekday;

// Re-export the scheduling types and services for external use
pub use models::*;
pub use services::*;

pub use conflict::{check_conflicts, parse_minute_of_day, weekdays_in_use, SlotCandidate};
pub use weekday::{canonical_weekday, is_known_weekday};
