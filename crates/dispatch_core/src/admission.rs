//! Admission / Callable API (C10): the single entry point per operation.
//!
//! Every method performs, in order: (1) caller identity is already extracted
//! by construction — every method takes the caller id as its first
//! parameter, mirroring an authenticated RPC context; (2) payload
//! validation; (3) kill-switch check for work-creating operations; (4) role
//! resolution where relevant; (5) dispatch to C7/C8; (6) return the typed
//! result or propagate a tagged [`CoreError`].

use std::sync::Arc;

use chrono::Duration;

use crate::auth::RoleRegistry;
use crate::clock::Clock;
use crate::config::ConfigReader;
use crate::error::{CoreError, CoreResult};
use crate::geo::GeoPoint;
use crate::ids::{DriverId, PassengerId, TripId, TripRequestId, UserId};
use crate::matching;
use crate::model::{Driver, Role, SystemConfig, Trip, TripRequest, TripRequestStatus};
use crate::rating;
use crate::state_machine;
use crate::store::Store;

/// Caller-submitted pickup/dropoff/estimate for `requestTrip`. The estimate
/// is logged but never trusted: price is always recomputed server-side.
#[derive(Debug, Clone)]
pub struct TripEstimate {
    pub distance_km: f64,
    pub duration_min: f64,
    pub price_ils: i64,
}

#[derive(Debug, Clone)]
pub struct RequestTripResult {
    pub request_id: TripRequestId,
    pub trip_id: Option<TripId>,
    pub driver_id: Option<DriverId>,
    pub status: TripRequestStatus,
}

/// Wires C2 (clock), C3 (config), C6 (auth), C7 (matching), and C8 (state
/// machine) into the operation surface named in `spec.md` §4.1.
pub struct AdmissionService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: ConfigReader<S>,
    roles: Arc<RoleRegistry>,
}

impl<S: Store> AdmissionService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, roles: Arc<RoleRegistry>) -> Self {
        let config = ConfigReader::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            config,
            roles,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ConfigReader<S> {
        &self.config
    }

    /// `requestTrip(pickup, dropoff, estimate)` — passenger-initiated.
    pub async fn request_trip(
        &self,
        caller: &PassengerId,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        estimate: TripEstimate,
    ) -> CoreResult<RequestTripResult> {
        validate_point(pickup)?;
        validate_point(dropoff)?;
        if estimate.distance_km < 0.0 {
            return Err(CoreError::invalid_argument("distance estimate must be non-negative"));
        }

        let config = self.config.get().await?;
        if !config.trips_enabled {
            return Err(CoreError::service_disabled("trip creation is currently disabled"));
        }

        let active_trip_cap = config.max_active_trips_per_passenger;
        if active_trip_cap == 0 {
            return Err(CoreError::forbidden(
                "trip creation is disabled for this passenger (max_active_trips_per_passenger = 0)",
            ));
        }
        // `query_active_trip_for_passenger` can only report "no active trip"
        // vs. "one active trip", so a configured cap above 1 is honored as
        // "at least one slot" — the only multiplicity this query can tell
        // apart from zero.
        if active_trip_cap <= 1
            && self
                .store
                .query_active_trip_for_passenger(caller)
                .await?
                .is_some()
        {
            return Err(CoreError::forbidden(format!(
                "passenger already has an active trip (max_active_trips_per_passenger = {active_trip_cap})"
            )));
        }

        let now = self.clock.now();
        let server_price = crate::pricing::price(estimate.distance_km, config.pricing_config());
        if server_price != estimate.price_ils {
            tracing::info!(
                client_price = estimate.price_ils,
                server_price,
                "requestTrip: overriding client-submitted price estimate"
            );
        }

        let request_id = TripRequestId::new();
        let request = TripRequest {
            passenger_id: caller.clone(),
            pickup,
            dropoff,
            estimated_distance_km: estimate.distance_km,
            estimated_duration_min: estimate.duration_min,
            estimated_price_ils: server_price,
            status: TripRequestStatus::Open,
            matched_driver_id: None,
            matched_trip_id: None,
            matched_at: None,
            created_at: now,
        };
        self.store.put_trip_request(&request_id, request.clone()).await?;

        let candidates = matching::find_candidates(
            self.store.as_ref(),
            pickup,
            config.max_search_radius_km,
        )
        .await?;

        let outcome = matching::claim_driver_for_trip(
            self.store.as_ref(),
            self.clock.as_ref(),
            &request_id,
            &request,
            &candidates,
            config.pricing_config(),
            Duration::seconds(config.driver_response_timeout_secs),
        )
        .await?;

        Ok(match outcome {
            matching::MatchOutcome::Matched { trip_id, driver_id } => RequestTripResult {
                request_id,
                trip_id: Some(trip_id),
                driver_id: Some(driver_id),
                status: TripRequestStatus::Matched,
            },
            matching::MatchOutcome::Searching => RequestTripResult {
                request_id,
                trip_id: None,
                driver_id: None,
                status: TripRequestStatus::Open,
            },
        })
    }

    pub async fn accept_offer(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::accept_offer(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn reject_offer(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::reject_offer(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn driver_arrived(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::driver_arrived(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn start_trip(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::start_trip(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn complete_trip(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::complete_trip(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn confirm_cash_payment(&self, caller: &DriverId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::confirm_cash_payment(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn cancel_by_passenger(&self, caller: &PassengerId, trip_id: &TripId) -> CoreResult<Trip> {
        state_machine::cancel_by_passenger(self.store.as_ref(), self.clock.as_ref(), trip_id, caller).await
    }

    pub async fn cancel_by_driver(
        &self,
        caller: &DriverId,
        trip_id: &TripId,
        reason: Option<String>,
    ) -> CoreResult<Trip> {
        state_machine::cancel_by_driver(self.store.as_ref(), self.clock.as_ref(), trip_id, caller, reason).await
    }

    /// `submitRating(tripId, rating, comment?)` — passenger-only, after `completed`.
    pub async fn submit_rating(
        &self,
        caller: &PassengerId,
        trip_id: &TripId,
        rating: u8,
        comment: Option<String>,
    ) -> CoreResult<crate::model::Rating> {
        rating::submit_rating(self.store.as_ref(), self.clock.as_ref(), trip_id, caller, rating, comment).await
    }

    /// Driver online/offline toggle. Never touches `isAvailable`/`currentTripId`
    /// (C4 invariant: only matching claim and state-machine release may).
    pub async fn set_driver_online(&self, caller: &DriverId, online: bool) -> CoreResult<Driver> {
        let now = self.clock.now();
        let mut driver = self
            .store
            .get_driver(caller)
            .await?
            .unwrap_or_else(|| Driver::new_offline(now));
        driver.is_online = online;
        driver.updated_at = now;
        self.store.put_driver(caller, driver.clone()).await?;
        Ok(driver)
    }

    pub async fn update_driver_location(&self, caller: &DriverId, location: GeoPoint) -> CoreResult<Driver> {
        validate_point(location)?;
        let now = self.clock.now();
        let mut driver = self
            .store
            .get_driver(caller)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("driver {caller} not found")))?;
        driver.last_location = Some(location);
        driver.updated_at = now;
        self.store.put_driver(caller, driver.clone()).await?;
        Ok(driver)
    }

    /// `managerForceCancel(tripId, reason?)` — manager/admin only.
    pub async fn manager_force_cancel(
        &self,
        caller: &UserId,
        trip_id: &TripId,
        reason: Option<String>,
    ) -> CoreResult<Trip> {
        self.require_manager(caller).await?;
        state_machine::manager_force_cancel(self.store.as_ref(), self.clock.as_ref(), trip_id, reason).await
    }

    /// `managerToggleTrips(enabled)` — manager/admin only.
    pub async fn manager_toggle_trips(&self, caller: &UserId, enabled: bool) -> CoreResult<SystemConfig> {
        self.require_manager(caller).await?;
        let mut config = self.config.get().await?;
        config.trips_enabled = enabled;
        config.updated_at = self.clock.now();
        config.updated_by = Some(caller.to_string());
        self.store.put_config(config.clone()).await?;
        self.config.invalidate().await;
        Ok(config)
    }

    /// `managerToggleFeatureFlag(flag, enabled)` — manager/admin only.
    pub async fn manager_toggle_feature_flag(
        &self,
        caller: &UserId,
        flag: &str,
        enabled: bool,
    ) -> CoreResult<SystemConfig> {
        self.require_manager(caller).await?;
        let mut config = self.config.get().await?;
        match flag {
            "roadblocksEnabled" => config.roadblocks_enabled = enabled,
            "paymentsEnabled" => config.payments_enabled = enabled,
            "tripsEnabled" => config.trips_enabled = enabled,
            other => {
                return Err(CoreError::invalid_argument(format!("unknown feature flag: {other}")));
            }
        }
        config.updated_at = self.clock.now();
        config.updated_by = Some(caller.to_string());
        self.store.put_config(config.clone()).await?;
        self.config.invalidate().await;
        Ok(config)
    }

    /// `getSystemConfig()` — manager/admin only.
    pub async fn get_system_config(&self, caller: &UserId) -> CoreResult<SystemConfig> {
        self.require_manager(caller).await?;
        self.config.get().await
    }

    async fn require_manager(&self, caller: &UserId) -> CoreResult<()> {
        if self.roles.is_manager_or_admin(caller).await {
            Ok(())
        } else {
            Err(CoreError::forbidden("caller is not a manager or admin"))
        }
    }
}

fn validate_point(point: GeoPoint) -> CoreResult<()> {
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
        return Err(CoreError::invalid_argument("coordinate out of range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    fn service(store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> AdmissionService<MemoryStore> {
        AdmissionService::new(store, clock, RoleRegistry::new())
    }

    async fn mark_driver_online(store: &MemoryStore, driver_id: &DriverId, location: GeoPoint, now: chrono::DateTime<Utc>) {
        let mut driver = Driver::new_offline(now);
        driver.is_online = true;
        driver.is_available = true;
        driver.last_location = Some(location);
        store.put_driver(driver_id, driver).await.unwrap();
    }

    #[tokio::test]
    async fn scenario_a_happy_path() {
        let store = Arc::new(MemoryStore::new());
        let clock = MockClock::new(Utc::now());
        let driver_id = DriverId::from("d1");
        mark_driver_online(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

        let svc = service(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);
        let passenger_id = PassengerId::from("p1");

        let result = svc
            .request_trip(
                &passenger_id,
                GeoPoint::new(32.2211, 35.2544),
                GeoPoint::new(31.9038, 35.2034),
                TripEstimate {
                    distance_km: 37.6,
                    duration_min: 40.0,
                    price_ils: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.status, TripRequestStatus::Matched);
        let trip_id = result.trip_id.unwrap();
        assert_eq!(result.driver_id.unwrap(), driver_id);

        svc.accept_offer(&driver_id, &trip_id).await.unwrap();
        svc.driver_arrived(&driver_id, &trip_id).await.unwrap();
        svc.start_trip(&driver_id, &trip_id).await.unwrap();
        let completed = svc.complete_trip(&driver_id, &trip_id).await.unwrap();
        assert_eq!(completed.fare_amount, 19);
        let paid = svc.confirm_cash_payment(&driver_id, &trip_id).await.unwrap();
        assert_eq!(paid.payment_status, crate::model::PaymentStatus::Paid);

        let driver = store.get_driver(&driver_id).await.unwrap().unwrap();
        assert!(driver.is_available);
    }

    #[tokio::test]
    async fn scenario_b_no_drivers_returns_searching() {
        let store = Arc::new(MemoryStore::new());
        let clock = MockClock::new(Utc::now());
        let svc = service(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);

        let result = svc
            .request_trip(
                &PassengerId::from("p1"),
                GeoPoint::new(32.0, 34.0),
                GeoPoint::new(32.1, 34.1),
                TripEstimate {
                    distance_km: 5.0,
                    duration_min: 10.0,
                    price_ils: 5,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.status, TripRequestStatus::Open);
        assert!(result.trip_id.is_none());
    }

    #[tokio::test]
    async fn scenario_d_kill_switch_blocks_new_requests() {
        let store = Arc::new(MemoryStore::new());
        let clock = MockClock::new(Utc::now());
        let svc = service(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);

        let manager_id = UserId::from("manager1");
        svc.roles.set_role(manager_id.clone(), Role::Manager).await;
        svc.manager_toggle_trips(&manager_id, false).await.unwrap();

        let result = svc
            .request_trip(
                &PassengerId::from("p1"),
                GeoPoint::new(32.0, 34.0),
                GeoPoint::new(32.1, 34.1),
                TripEstimate {
                    distance_km: 5.0,
                    duration_min: 10.0,
                    price_ils: 5,
                },
            )
            .await;

        assert!(result.unwrap_err().is_kind(crate::error::ErrorKind::ServiceDisabled));
    }

    #[tokio::test]
    async fn non_manager_cannot_toggle_kill_switch() {
        let store = Arc::new(MemoryStore::new());
        let clock = MockClock::new(Utc::now());
        let svc = service(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);

        let result = svc.manager_toggle_trips(&UserId::from("not_a_manager"), false).await;
        assert!(result.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn passenger_with_active_trip_cannot_request_another() {
        let store = Arc::new(MemoryStore::new());
        let clock = MockClock::new(Utc::now());
        let driver_id = DriverId::from("d1");
        mark_driver_online(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;
        let svc = service(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);
        let passenger_id = PassengerId::from("p1");

        let estimate = TripEstimate {
            distance_km: 5.0,
            duration_min: 10.0,
            price_ils: 5,
        };
        svc.request_trip(&passenger_id, GeoPoint::new(32.2211, 35.2544), GeoPoint::new(31.9, 35.2), estimate.clone())
            .await
            .unwrap();

        let second = svc
            .request_trip(&passenger_id, GeoPoint::new(32.2211, 35.2544), GeoPoint::new(31.9, 35.2), estimate)
            .await;
        assert!(second.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
    }
}
