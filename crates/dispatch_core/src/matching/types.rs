//! Shared matching types.

use crate::ids::DriverId;

/// A driver within search radius, scored by pickup distance.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub driver_id: DriverId,
    pub pickup_distance_km: f64,
}
