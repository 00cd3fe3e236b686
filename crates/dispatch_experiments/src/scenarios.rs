//! The concrete scenarios from `spec.md` §8, expressed as runnable checks
//! rather than prose. Each scenario builds its own `MemoryStore`/`MockClock`
//! and drives the public `AdmissionService` surface directly — no shared
//! state between scenarios, so they are safe to run concurrently.

use std::sync::Arc;

use chrono::Duration;
use dispatch_core::admission::{AdmissionService, TripEstimate};
use dispatch_core::auth::RoleRegistry;
use dispatch_core::clock::{Clock, MockClock};
use dispatch_core::config::ConfigReader;
use dispatch_core::error::ErrorKind;
use dispatch_core::geo::GeoPoint;
use dispatch_core::ids::{DriverId, PassengerId, UserId};
use dispatch_core::model::{Driver, Role, TripStatus};
use dispatch_core::store::memory::MemoryStore;
use dispatch_core::store::Store;
use dispatch_core::sweeper::run_sweep_once;

/// Identifies a single scenario for the harness to run and report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    HappyPath,
    NoDriversSearching,
    DoubleAcceptRace,
    KillSwitchBlocksRequests,
    DriverNoShowSwept,
    PassengerCancelTooLate,
    SearchRadiusBoundaryWithin,
    SearchRadiusBoundaryBeyond,
    OfferExpiryBoundaryWithin,
    OfferExpiryBoundaryBeyond,
}

impl ScenarioId {
    pub fn name(self) -> &'static str {
        match self {
            Self::HappyPath => "scenario_a_happy_path",
            Self::NoDriversSearching => "scenario_b_no_drivers_returns_searching",
            Self::DoubleAcceptRace => "scenario_c_double_accept_race_has_one_winner",
            Self::KillSwitchBlocksRequests => "scenario_d_kill_switch_blocks_new_requests",
            Self::DriverNoShowSwept => "scenario_e_driver_no_show_is_swept",
            Self::PassengerCancelTooLate => "scenario_f_passenger_cancel_too_late",
            Self::SearchRadiusBoundaryWithin => "boundary_search_radius_within_cap",
            Self::SearchRadiusBoundaryBeyond => "boundary_search_radius_beyond_cap",
            Self::OfferExpiryBoundaryWithin => "boundary_offer_expiry_within_timeout",
            Self::OfferExpiryBoundaryBeyond => "boundary_offer_expiry_beyond_timeout",
        }
    }

    pub fn all() -> Vec<ScenarioId> {
        vec![
            Self::HappyPath,
            Self::NoDriversSearching,
            Self::DoubleAcceptRace,
            Self::KillSwitchBlocksRequests,
            Self::DriverNoShowSwept,
            Self::PassengerCancelTooLate,
            Self::SearchRadiusBoundaryWithin,
            Self::SearchRadiusBoundaryBeyond,
            Self::OfferExpiryBoundaryWithin,
            Self::OfferExpiryBoundaryBeyond,
        ]
    }
}

/// Outcome of a single scenario run, serializable for CSV/JSON export.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub passed: bool,
    pub detail: String,
    pub elapsed_ms: f64,
}

async fn online_driver(store: &MemoryStore, driver_id: &DriverId, location: GeoPoint, now: chrono::DateTime<chrono::Utc>) {
    let mut driver = Driver::new_offline(now);
    driver.is_online = true;
    driver.is_available = true;
    driver.last_location = Some(location);
    store.put_driver(driver_id, driver).await.unwrap();
}

fn ok(detail: impl Into<String>) -> Result<String, String> {
    Ok(detail.into())
}

async fn run_happy_path() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let driver_id = DriverId::from("d1");
    online_driver(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());
    let result = svc
        .request_trip(
            &PassengerId::from("p1"),
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 37.6, duration_min: 40.0, price_ils: 19 },
        )
        .await
        .map_err(|e| e.to_string())?;

    let trip_id = result.trip_id.ok_or("expected an immediate match")?;
    svc.accept_offer(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    svc.driver_arrived(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    svc.start_trip(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    let trip = svc.complete_trip(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    if trip.status != TripStatus::Completed {
        return Err(format!("expected completed, got {:?}", trip.status));
    }
    ok("matched, accepted, and completed end to end")
}

async fn run_no_drivers_searching() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());

    let result = svc
        .request_trip(
            &PassengerId::from("p1"),
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 37.6, duration_min: 40.0, price_ils: 19 },
        )
        .await
        .map_err(|e| e.to_string())?;

    if result.trip_id.is_some() {
        return Err("expected no match with an empty fleet".into());
    }
    ok("empty fleet leaves the request open/searching")
}

async fn run_double_accept_race() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let driver_id = DriverId::from("d1");
    let other_driver_id = DriverId::from("d2");
    online_driver(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());
    let result = svc
        .request_trip(
            &PassengerId::from("p1"),
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 37.6, duration_min: 40.0, price_ils: 19 },
        )
        .await
        .map_err(|e| e.to_string())?;
    let trip_id = result.trip_id.ok_or("expected an immediate match")?;

    let first = svc.accept_offer(&driver_id, &trip_id).await;
    let second = svc.accept_offer(&other_driver_id, &trip_id).await;

    if first.is_err() {
        return Err("the legitimate winner's accept should have succeeded".into());
    }
    match second {
        Err(err) if err.kind == ErrorKind::Forbidden => ok("exactly one accept wins the race"),
        Err(err) => Err(format!("expected forbidden, got {:?}", err.kind)),
        Ok(_) => Err("both accepts succeeded, race was not exclusive".into()),
    }
}

async fn run_kill_switch_blocks_requests() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let roles = RoleRegistry::new();
    let manager_id = UserId::from("manager1");
    roles.set_role(manager_id.clone(), Role::Manager).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, Arc::clone(&roles));
    svc.manager_toggle_trips(&manager_id, false).await.map_err(|e| e.to_string())?;

    let result = svc
        .request_trip(
            &PassengerId::from("p1"),
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 10.0, duration_min: 15.0, price_ils: 5 },
        )
        .await;

    match result {
        Err(err) if err.kind == ErrorKind::ServiceDisabled => ok("kill switch rejects new requests"),
        Err(err) => Err(format!("expected service_disabled, got {:?}", err.kind)),
        Ok(_) => Err("request_trip should have been blocked".into()),
    }
}

async fn run_driver_no_show_swept() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let driver_id = DriverId::from("d1");
    online_driver(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());
    let result = svc
        .request_trip(
            &PassengerId::from("p1"),
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 10.0, duration_min: 15.0, price_ils: 5 },
        )
        .await
        .map_err(|e| e.to_string())?;
    let trip_id = result.trip_id.ok_or("expected an immediate match")?;
    svc.accept_offer(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;

    clock.advance(Duration::seconds(301));
    let config = ConfigReader::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);
    let report = run_sweep_once(store.as_ref(), clock.as_ref(), &config).await.map_err(|e| e.to_string())?;
    if report.no_show_trips != 1 {
        return Err(format!("expected 1 no-show cancellation, got {}", report.no_show_trips));
    }

    let err = svc.driver_arrived(&driver_id, &trip_id).await.unwrap_err();
    if err.kind != ErrorKind::Forbidden {
        return Err(format!("expected forbidden after sweep, got {:?}", err.kind));
    }
    ok("no-show is swept and blocks later transitions")
}

async fn run_passenger_cancel_too_late() -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let driver_id = DriverId::from("d1");
    online_driver(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());
    let passenger_id = PassengerId::from("p1");
    let result = svc
        .request_trip(
            &passenger_id,
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 10.0, duration_min: 15.0, price_ils: 5 },
        )
        .await
        .map_err(|e| e.to_string())?;
    let trip_id = result.trip_id.ok_or("expected an immediate match")?;

    svc.accept_offer(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    svc.driver_arrived(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
    svc.start_trip(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;

    let cancel = svc.cancel_by_passenger(&passenger_id, &trip_id).await;
    if cancel.is_ok() {
        return Err("cancel should have been rejected once in_progress".into());
    }

    let trip = store.get_trip(&trip_id).await.map_err(|e| e.to_string())?.ok_or("trip vanished")?;
    if trip.status != TripStatus::InProgress {
        return Err(format!("trip should be unchanged, got {:?}", trip.status));
    }
    ok("in-progress trips reject passenger cancellation and stay unchanged")
}

async fn run_search_radius_boundary(within: bool) -> Result<String, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let pickup = GeoPoint::new(32.2211, 35.2544);

    let location = if within {
        GeoPoint::new(32.356, 35.2544) // ~14.9km, within the 15km cap
    } else {
        GeoPoint::new(31.7683, 35.2137) // ~55km, well beyond the cap
    };
    online_driver(&store, &DriverId::from("d1"), location, clock.now()).await;

    let candidates = dispatch_core::matching::find_candidates(store.as_ref(), pickup, 15.0)
        .await
        .map_err(|e| e.to_string())?;

    if within && candidates.len() != 1 {
        return Err(format!("expected 1 candidate within the cap, got {}", candidates.len()));
    }
    if !within && !candidates.is_empty() {
        return Err(format!("expected 0 candidates beyond the cap, got {}", candidates.len()));
    }
    ok(format!("radius boundary ({within}) respected"))
}

async fn run_offer_expiry_boundary(within: bool) -> Result<String, String> {
    use dispatch_core::model::{DriverOffer, DriverOfferStatus, Trip, TripStatus as Status};

    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(chrono::Utc::now());
    let driver_id = DriverId::from("d1");
    let passenger_id = PassengerId::from("p1");
    online_driver(&store, &driver_id, GeoPoint::new(32.2200, 35.2540), clock.now()).await;

    let svc = AdmissionService::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>, RoleRegistry::new());
    let result = svc
        .request_trip(
            &passenger_id,
            GeoPoint::new(32.2211, 35.2544),
            GeoPoint::new(31.9038, 35.2034),
            TripEstimate { distance_km: 10.0, duration_min: 15.0, price_ils: 5 },
        )
        .await
        .map_err(|e| e.to_string())?;
    let trip_id = result.trip_id.ok_or("expected an immediate match")?;

    // SystemConfig::defaults() sets driverResponseTimeout = 20s; advance just
    // inside/outside that boundary before the driver ever responds.
    let offset = if within { 19 } else { 21 };
    clock.advance(Duration::seconds(offset));

    let config = ConfigReader::new(Arc::clone(&store), clock.clone() as Arc<dyn Clock>);
    let report = run_sweep_once(store.as_ref(), clock.as_ref(), &config).await.map_err(|e| e.to_string())?;

    let trip: Trip = store.get_trip(&trip_id).await.map_err(|e| e.to_string())?.ok_or("trip vanished")?;
    let offer: DriverOffer = store
        .get_driver_offer(&driver_id, &trip_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("offer vanished")?;

    if within {
        if report.expired_offers != 0 {
            return Err(format!("expected no expiry within the timeout, got {}", report.expired_offers));
        }
        if trip.status != Status::Pending || offer.status != DriverOfferStatus::Pending {
            return Err(format!("expected trip/offer to stay pending, got {:?}/{:?}", trip.status, offer.status));
        }
        svc.accept_offer(&driver_id, &trip_id).await.map_err(|e| e.to_string())?;
        return ok("offer survives a sweep inside the response timeout");
    }

    if report.expired_offers != 1 {
        return Err(format!("expected 1 expired offer beyond the timeout, got {}", report.expired_offers));
    }
    if trip.status != Status::NoDriverAvailable || offer.status != DriverOfferStatus::Expired {
        return Err(format!(
            "expected no_driver_available/expired, got {:?}/{:?}",
            trip.status, offer.status
        ));
    }
    let accept_after_expiry = svc.accept_offer(&driver_id, &trip_id).await;
    if accept_after_expiry.is_ok() {
        return Err("accepting an expired offer should be forbidden".into());
    }
    ok("offer is swept and rejected past the response timeout")
}

/// Runs a single scenario to completion, spinning up its own single-threaded
/// Tokio runtime — this lets `dispatch_experiments::runner` fan scenarios out
/// across `rayon` worker threads without sharing an executor between them.
pub fn run_scenario(id: ScenarioId) -> ScenarioOutcome {
    let start = std::time::Instant::now();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build a scenario-local Tokio runtime");

    let outcome = runtime.block_on(async move {
        match id {
            ScenarioId::HappyPath => run_happy_path().await,
            ScenarioId::NoDriversSearching => run_no_drivers_searching().await,
            ScenarioId::DoubleAcceptRace => run_double_accept_race().await,
            ScenarioId::KillSwitchBlocksRequests => run_kill_switch_blocks_requests().await,
            ScenarioId::DriverNoShowSwept => run_driver_no_show_swept().await,
            ScenarioId::PassengerCancelTooLate => run_passenger_cancel_too_late().await,
            ScenarioId::SearchRadiusBoundaryWithin => run_search_radius_boundary(true).await,
            ScenarioId::SearchRadiusBoundaryBeyond => run_search_radius_boundary(false).await,
            ScenarioId::OfferExpiryBoundaryWithin => run_offer_expiry_boundary(true).await,
            ScenarioId::OfferExpiryBoundaryBeyond => run_offer_expiry_boundary(false).await,
        }
    });

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(detail) => ScenarioOutcome { scenario: id.name().to_string(), passed: true, detail, elapsed_ms },
        Err(detail) => ScenarioOutcome { scenario: id.name().to_string(), passed: false, detail, elapsed_ms },
    }
}
