//! Document types: drivers, trip requests, trips, driver offers, payments,
//! ratings, and the system config singleton.
//!
//! These are the `Store`'s documents, not ECS components — there is no
//! world to query; every read goes through `Store::get_*`/`query_*`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::ids::{DriverId, PassengerId, TripId, TripRequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelledBy {
    Passenger,
    Driver,
    System,
}

/// Driver document, keyed by driver identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub is_online: bool,
    /// Strictly implies `is_online`; false while claimed by a trip.
    pub is_available: bool,
    pub last_location: Option<GeoPoint>,
    /// Non-null iff `is_available = false` due to a trip.
    pub current_trip_id: Option<TripId>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// A driver document as it looks the first time a driver toggles online.
    pub fn new_offline(now: DateTime<Utc>) -> Self {
        Self {
            is_online: false,
            is_available: false,
            last_location: None,
            current_trip_id: None,
            updated_at: now,
        }
    }

    /// Eligible to be matched against: online, available, within pilot scope.
    pub fn is_eligible_for_matching(&self) -> bool {
        self.is_online && self.is_available
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripRequestStatus {
    Open,
    Matched,
    Expired,
    Cancelled,
}

/// Passenger admission record; lives only until matched/expired/cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub passenger_id: PassengerId,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: f64,
    /// Server-recomputed; never the client's submitted value.
    pub estimated_price_ils: i64,
    pub status: TripRequestStatus,
    pub matched_driver_id: Option<DriverId>,
    pub matched_trip_id: Option<TripId>,
    pub matched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
    Pending,
    Accepted,
    DriverArrived,
    InProgress,
    Completed,
    CancelledByPassenger,
    CancelledByDriver,
    CancelledBySystem,
    NoDriverAvailable,
}

impl TripStatus {
    /// Active statuses couple to driver availability: invariants 1 and 2.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Accepted | Self::DriverArrived | Self::InProgress
        )
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::DriverArrived => "driver_arrived",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::CancelledByPassenger => "cancelled_by_passenger",
            Self::CancelledByDriver => "cancelled_by_driver",
            Self::CancelledBySystem => "cancelled_by_system",
            Self::NoDriverAvailable => "no_driver_available",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Authoritative trip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub passenger_id: PassengerId,
    pub driver_id: DriverId,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_distance_km: f64,
    pub estimated_duration_min: f64,
    /// Server-recomputed at creation; equals `fare_amount`.
    pub estimated_price_ils: i64,
    pub status: TripStatus,
    pub fare_amount: i64,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
}

impl Trip {
    pub fn final_price_ils(&self) -> i64 {
        // No post-trip recompute in v1: the final price is the fare agreed at creation.
        self.fare_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverOfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl DriverOfferStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The offer presented to exactly one driver for a given trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverOffer {
    pub trip_id: TripId,
    pub driver_id: DriverId,
    pub status: DriverOfferStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mirrors the passenger-facing payment record, keyed `payment_<tripId>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub trip_id: TripId,
    pub passenger_id: PassengerId,
    pub driver_id: DriverId,
    pub amount: i64,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Ils,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
}

/// A passenger's post-trip rating, keyed `rating_<tripId>` (supplemented:
/// `spec.md` names `submitRating` but does not model its storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub trip_id: TripId,
    pub passenger_id: PassengerId,
    /// Clamped to `1..=5` by the admission layer before this is constructed.
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Feature flags and pilot-phase limits, singleton at `system/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub trips_enabled: bool,
    pub roadblocks_enabled: bool,
    pub payments_enabled: bool,
    pub driver_response_timeout_secs: i64,
    pub search_timeout_secs: i64,
    pub driver_arrival_timeout_secs: i64,
    pub max_active_trips_per_driver: u32,
    pub max_active_trips_per_passenger: u32,
    pub max_search_radius_km: f64,
    pub min_fare_ils: i64,
    pub rate_per_km: f64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<UserIdentity>,
}

pub type UserIdentity = String;

impl SystemConfig {
    /// Defaults applied when `system/config` does not exist yet.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            trips_enabled: true,
            roadblocks_enabled: true,
            payments_enabled: false,
            driver_response_timeout_secs: 20,
            search_timeout_secs: 120,
            driver_arrival_timeout_secs: 300,
            max_active_trips_per_driver: 1,
            max_active_trips_per_passenger: 1,
            max_search_radius_km: crate::geo::MAX_SEARCH_RADIUS_KM,
            min_fare_ils: crate::pricing::MIN_FARE_ILS,
            rate_per_km: crate::pricing::RATE_PER_KM,
            updated_at: now,
            updated_by: None,
        }
    }

    pub fn pricing_config(&self) -> crate::pricing::PricingConfig {
        crate::pricing::PricingConfig {
            min_fare_ils: self.min_fare_ils,
            rate_per_km: self.rate_per_km,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Passenger,
    Driver,
    Manager,
    Admin,
}

impl Role {
    pub fn is_manager_or_admin(self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}

/// `TripRequest` status moves forward only. Used by the sweeper/state
/// machine to assert invariant 6 style guarantees in tests.
#[cfg(test)]
pub fn assert_terminal_once_set(status: TripRequestStatus) {
    assert_ne!(status, TripRequestStatus::Open, "status already advanced");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_statuses_match_spec_list() {
        assert!(TripStatus::Pending.is_active());
        assert!(TripStatus::Accepted.is_active());
        assert!(TripStatus::DriverArrived.is_active());
        assert!(TripStatus::InProgress.is_active());
        assert!(!TripStatus::Completed.is_active());
        assert!(!TripStatus::NoDriverAvailable.is_active());
    }

    #[test]
    fn terminal_is_the_complement_of_active() {
        for status in [
            TripStatus::Pending,
            TripStatus::Accepted,
            TripStatus::DriverArrived,
            TripStatus::InProgress,
            TripStatus::Completed,
            TripStatus::CancelledByPassenger,
            TripStatus::CancelledByDriver,
            TripStatus::CancelledBySystem,
            TripStatus::NoDriverAvailable,
        ] {
            assert_eq!(status.is_active(), !status.is_terminal());
        }
    }

    #[test]
    fn driver_eligible_requires_online_and_available() {
        let now = Utc::now();
        let mut driver = Driver::new_offline(now);
        assert!(!driver.is_eligible_for_matching());
        driver.is_online = true;
        assert!(!driver.is_eligible_for_matching());
        driver.is_available = true;
        assert!(driver.is_eligible_for_matching());
    }
}
