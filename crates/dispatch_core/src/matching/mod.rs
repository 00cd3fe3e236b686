//! Driver matching (C7): nearest-eligible-driver search plus the
//! transactional claim that binds a driver to a new trip.

pub mod engine;
pub mod types;

pub use engine::{claim_driver_for_trip, find_candidates, MatchOutcome};
pub use types::MatchCandidate;
