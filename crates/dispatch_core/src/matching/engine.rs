//! Nearest-eligible-driver search and the transactional claim (C7).

use chrono::Duration;

use crate::clock::Clock;
use crate::error::CoreResult;
use crate::geo::{haversine_km, GeoPoint};
use crate::ids::{DriverId, TripId, TripRequestId};
use crate::model::{
    Driver, DriverOffer, DriverOfferStatus, Trip, TripRequest, TripRequestStatus, TripStatus,
};
use crate::pricing::PricingConfig;
use crate::store::Store;

use super::types::MatchCandidate;

/// The result of attempting to match a freshly-created `TripRequest`.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Claim succeeded; `TripRequest`, `Trip`, driver, and `DriverOffer` were
    /// all updated atomically.
    Matched { trip_id: TripId, driver_id: DriverId },
    /// No eligible candidate committed; the `TripRequest` is left `open`.
    Searching,
}

/// Ranks every online+available driver with a known location by pickup
/// distance, keeping only those within `max_radius_km`. Ties keep the
/// store's iteration order (documented, not relied upon) per §4.2.
pub async fn find_candidates(
    store: &dyn Store,
    pickup: GeoPoint,
    max_radius_km: f64,
) -> CoreResult<Vec<MatchCandidate>> {
    let eligible = store.query_eligible_drivers().await?;

    let mut candidates: Vec<MatchCandidate> = eligible
        .into_iter()
        .filter_map(|(driver_id, driver)| {
            let location = driver.last_location?;
            let pickup_distance_km = haversine_km(pickup, location);
            (pickup_distance_km <= max_radius_km).then_some(MatchCandidate {
                driver_id,
                pickup_distance_km,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.pickup_distance_km
            .partial_cmp(&b.pickup_distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(candidates)
}

/// Attempts the claim transaction against each candidate in order (nearest
/// first), falling through to the next candidate for as long as the driver
/// re-check keeps losing the race — not a single retry, an exhaustive walk
/// of the candidate list (an implementation choice the spec explicitly
/// allows — see Design Notes §9). Returns `Searching` once every candidate
/// has been tried and lost.
pub async fn claim_driver_for_trip(
    store: &dyn Store,
    clock: &dyn Clock,
    request_id: &TripRequestId,
    request: &TripRequest,
    candidates: &[MatchCandidate],
    pricing_config: PricingConfig,
    driver_response_timeout: Duration,
) -> CoreResult<MatchOutcome> {
    for candidate in candidates {
        if let Some(outcome) = try_claim_candidate(
            store,
            clock,
            request_id,
            request,
            candidate,
            pricing_config,
            driver_response_timeout,
        )
        .await?
        {
            return Ok(outcome);
        }
    }
    Ok(MatchOutcome::Searching)
}

/// One claim attempt against a single candidate. Returns `None` (rather
/// than `Searching`) when the driver lost eligibility since the search read
/// — the caller tries the next candidate instead of giving up.
async fn try_claim_candidate(
    store: &dyn Store,
    clock: &dyn Clock,
    request_id: &TripRequestId,
    request: &TripRequest,
    candidate: &MatchCandidate,
    pricing_config: PricingConfig,
    driver_response_timeout: Duration,
) -> CoreResult<Option<MatchOutcome>> {
    let mut tx = store.begin_transaction().await?;

    let driver = tx.get_driver(&candidate.driver_id).await?;
    let driver: Driver = match driver {
        Some(driver) if driver.is_eligible_for_matching() => driver,
        _ => return Ok(None),
    };

    let now = clock.now();
    let trip_id = TripId::new();
    let fare = crate::pricing::price(request.estimated_distance_km, pricing_config);

    let trip = Trip {
        passenger_id: request.passenger_id.clone(),
        driver_id: candidate.driver_id.clone(),
        pickup: request.pickup,
        dropoff: request.dropoff,
        estimated_distance_km: request.estimated_distance_km,
        estimated_duration_min: request.estimated_duration_min,
        estimated_price_ils: fare,
        status: TripStatus::Pending,
        fare_amount: fare,
        payment_status: crate::model::PaymentStatus::Pending,
        paid_at: None,
        created_at: now,
        accepted_at: None,
        arrived_at: None,
        started_at: None,
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        cancelled_by: None,
    };
    tx.put_trip(&trip_id, trip).await;

    let mut claimed_driver = driver;
    claimed_driver.is_available = false;
    claimed_driver.current_trip_id = Some(trip_id.clone());
    claimed_driver.updated_at = now;
    tx.put_driver(&candidate.driver_id, claimed_driver).await;

    let offer = DriverOffer {
        trip_id: trip_id.clone(),
        driver_id: candidate.driver_id.clone(),
        status: DriverOfferStatus::Pending,
        created_at: now,
        expires_at: now + driver_response_timeout,
    };
    tx.put_driver_offer(&candidate.driver_id, &trip_id, offer).await;

    let mut matched_request = request.clone();
    matched_request.status = TripRequestStatus::Matched;
    matched_request.matched_driver_id = Some(candidate.driver_id.clone());
    matched_request.matched_trip_id = Some(trip_id.clone());
    matched_request.matched_at = Some(now);
    tx.put_trip_request(request_id, matched_request).await;

    tx.commit().await?;

    Ok(Some(MatchOutcome::Matched {
        trip_id,
        driver_id: candidate.driver_id.clone(),
    }))
}
