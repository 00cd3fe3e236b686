//! Trip State Machine (C8): every legal transition, one transaction per
//! call. Each function reads the trip, checks actor and pre-state, applies
//! the transition, and — when the new state is terminal — releases the
//! driver and cancels any still-pending offer in the same transaction.
//!
//! Grounded on the per-event system decomposition in the teacher's
//! `systems/match_accepted.rs` / `match_rejected.rs` / `rider_cancel.rs` /
//! `trip_started.rs` / `trip_completed.rs`, one function per transition
//! instead of one system per scheduled event.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ids::{payment_id_for_trip, DriverId, PassengerId, TripId};
use crate::model::{CancelledBy, DriverOffer, DriverOfferStatus, Payment, PaymentStatus, Trip, TripStatus};
use crate::store::{Store, Transaction};

/// Read the trip inside the transaction; `not_found` if it never existed.
async fn load_trip(tx: &mut dyn Transaction, trip_id: &TripId) -> CoreResult<Trip> {
    tx.get_trip(trip_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("trip {trip_id} not found")))
}

fn require_pre_state(trip: &Trip, allowed: &[TripStatus]) -> CoreResult<()> {
    if allowed.contains(&trip.status) {
        Ok(())
    } else {
        Err(CoreError::forbidden_in_state(
            "trip is not in a state that allows this transition",
            trip.status,
        ))
    }
}

fn require_driver_actor(trip: &Trip, caller: &DriverId) -> CoreResult<()> {
    if &trip.driver_id == caller {
        Ok(())
    } else {
        Err(CoreError::forbidden("caller is not the driver of this trip"))
    }
}

fn require_passenger_actor(trip: &Trip, caller: &PassengerId) -> CoreResult<()> {
    if &trip.passenger_id == caller {
        Ok(())
    } else {
        Err(CoreError::forbidden("caller is not the passenger of this trip"))
    }
}

/// Releases the driver (invariant 1/2: only matching claim and this release
/// path may ever flip `isAvailable`/`currentTripId`).
async fn release_driver(tx: &mut dyn Transaction, driver_id: &DriverId, now: DateTime<Utc>) -> CoreResult<()> {
    if let Some(mut driver) = tx.get_driver(driver_id).await? {
        driver.is_available = true;
        driver.current_trip_id = None;
        driver.updated_at = now;
        tx.put_driver(driver_id, driver).await;
    }
    Ok(())
}

/// Cancels the trip's `DriverOffer` if it is still `pending`. A no-op if the
/// offer already resolved (accepted/rejected/expired) or never existed.
async fn cancel_pending_offer(
    tx: &mut dyn Transaction,
    driver_id: &DriverId,
    trip_id: &TripId,
) -> CoreResult<()> {
    if let Some(mut offer) = tx.get_driver_offer(driver_id, trip_id).await? {
        if offer.status == DriverOfferStatus::Pending {
            offer.status = DriverOfferStatus::Cancelled;
            tx.put_driver_offer(driver_id, trip_id, offer).await;
        }
    }
    Ok(())
}

/// `acceptOffer`: driver-initiated, `pending -> accepted`.
pub async fn accept_offer(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::Pending])?;

    let offer = tx.get_driver_offer(caller, trip_id).await?;
    match offer {
        Some(offer) if offer.status == DriverOfferStatus::Pending => {
            let now = clock.now();
            let mut updated_offer = offer;
            updated_offer.status = DriverOfferStatus::Accepted;
            tx.put_driver_offer(caller, trip_id, updated_offer).await;

            trip.status = TripStatus::Accepted;
            trip.accepted_at = Some(now);
            tx.put_trip(trip_id, trip.clone()).await;
        }
        _ => {
            return Err(CoreError::forbidden(
                "driver offer is not pending; the trip may already be claimed elsewhere",
            ));
        }
    }

    tx.commit().await?;
    Ok(trip)
}

/// `rejectOffer`: driver-initiated. Idempotent on an already-terminal offer
/// (returns the trip unchanged). Otherwise `pending -> no_driver_available`
/// and the driver is released; the core does not auto-redispatch.
pub async fn reject_offer(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;

    let offer = tx.get_driver_offer(caller, trip_id).await?;
    let offer_is_pending = offer
        .as_ref()
        .map(|o| o.status == DriverOfferStatus::Pending)
        .unwrap_or(false);

    if !offer_is_pending {
        // Already terminal: idempotent success, no mutation.
        tx.commit().await?;
        return Ok(trip);
    }

    require_pre_state(&trip, &[TripStatus::Pending])?;

    let now = clock.now();
    let mut rejected_offer = offer.expect("checked pending above");
    rejected_offer.status = DriverOfferStatus::Rejected;
    tx.put_driver_offer(caller, trip_id, rejected_offer).await;

    trip.status = TripStatus::NoDriverAvailable;
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), caller, now).await?;

    tx.commit().await?;
    Ok(trip)
}

/// `driverArrived`: `accepted -> driver_arrived`.
pub async fn driver_arrived(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::Accepted])?;

    trip.status = TripStatus::DriverArrived;
    trip.arrived_at = Some(clock.now());
    tx.put_trip(trip_id, trip.clone()).await;

    tx.commit().await?;
    Ok(trip)
}

/// `startTrip`: `driver_arrived -> in_progress`.
pub async fn start_trip(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::DriverArrived])?;

    trip.status = TripStatus::InProgress;
    trip.started_at = Some(clock.now());
    tx.put_trip(trip_id, trip.clone()).await;

    tx.commit().await?;
    Ok(trip)
}

/// `completeTrip`: `in_progress -> completed`. Creates the idempotent
/// `Payment` record (C11) and releases the driver in the same transaction.
pub async fn complete_trip(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::InProgress])?;

    let now = clock.now();
    trip.status = TripStatus::Completed;
    trip.completed_at = Some(now);
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), caller, now).await?;

    let payment_id = payment_id_for_trip(trip_id);
    if tx.get_payment(&payment_id).await?.is_none() {
        let payment = Payment {
            trip_id: trip_id.clone(),
            passenger_id: trip.passenger_id.clone(),
            driver_id: trip.driver_id.clone(),
            amount: trip.fare_amount,
            currency: crate::model::Currency::Ils,
            method: crate::model::PaymentMethod::Cash,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tx.put_payment(&payment_id, payment).await;
    }

    tx.commit().await?;
    Ok(trip)
}

/// `confirmCashPayment`: driver-initiated, trip must be `completed` and
/// payment still `pending`. Flips both `Trip.paymentStatus` and the mirror
/// `Payment.status` to `paid` atomically.
pub async fn confirm_cash_payment(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId, caller: &DriverId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::Completed])?;

    if trip.payment_status == PaymentStatus::Paid {
        return Err(CoreError::forbidden("trip is already paid"));
    }

    let now = clock.now();
    trip.payment_status = PaymentStatus::Paid;
    trip.paid_at = Some(now);
    tx.put_trip(trip_id, trip.clone()).await;

    let payment_id = payment_id_for_trip(trip_id);
    if let Some(mut payment) = tx.get_payment(&payment_id).await? {
        payment.status = PaymentStatus::Paid;
        payment.updated_at = now;
        tx.put_payment(&payment_id, payment).await;
    }

    tx.commit().await?;
    Ok(trip)
}

/// `cancelByPassenger`: legal only from `pending`/`accepted`; later states
/// (driver already arrived or beyond) are explicitly forbidden.
pub async fn cancel_by_passenger(
    store: &dyn Store,
    clock: &dyn Clock,
    trip_id: &TripId,
    caller: &PassengerId,
) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_passenger_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::Pending, TripStatus::Accepted])?;

    let now = clock.now();
    trip.status = TripStatus::CancelledByPassenger;
    trip.cancelled_at = Some(now);
    trip.cancelled_by = Some(CancelledBy::Passenger);
    trip.cancellation_reason = Some("cancelled_by_passenger".to_string());
    let driver_id = trip.driver_id.clone();
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), &driver_id, now).await?;
    cancel_pending_offer(tx.as_mut(), &driver_id, trip_id).await?;

    tx.commit().await?;
    Ok(trip)
}

/// `cancelByDriver`: legal only from `pending`/`accepted`.
pub async fn cancel_by_driver(
    store: &dyn Store,
    clock: &dyn Clock,
    trip_id: &TripId,
    caller: &DriverId,
    reason: Option<String>,
) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_driver_actor(&trip, caller)?;
    require_pre_state(&trip, &[TripStatus::Pending, TripStatus::Accepted])?;

    let now = clock.now();
    trip.status = TripStatus::CancelledByDriver;
    trip.cancelled_at = Some(now);
    trip.cancelled_by = Some(CancelledBy::Driver);
    trip.cancellation_reason = Some(reason.unwrap_or_else(|| "cancelled_by_driver".to_string()));
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), caller, now).await?;
    cancel_pending_offer(tx.as_mut(), caller, trip_id).await?;

    tx.commit().await?;
    Ok(trip)
}

/// `managerForceCancel`: legal from any active state; reason defaults to
/// `manager_override`. Caller's role is checked by the admission layer, not
/// here — this function trusts that the caller is already authorized.
pub async fn manager_force_cancel(
    store: &dyn Store,
    clock: &dyn Clock,
    trip_id: &TripId,
    reason: Option<String>,
) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_pre_state(
        &trip,
        &[
            TripStatus::Pending,
            TripStatus::Accepted,
            TripStatus::DriverArrived,
            TripStatus::InProgress,
        ],
    )?;

    let now = clock.now();
    trip.status = TripStatus::CancelledBySystem;
    trip.cancelled_at = Some(now);
    trip.cancelled_by = Some(CancelledBy::System);
    trip.cancellation_reason = Some(reason.unwrap_or_else(|| "manager_override".to_string()));
    let driver_id = trip.driver_id.clone();
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), &driver_id, now).await?;
    cancel_pending_offer(tx.as_mut(), &driver_id, trip_id).await?;

    tx.commit().await?;
    Ok(trip)
}

/// `offer_expired(sweeper)`: `pending -> no_driver_available` when the
/// driver never responded to the offer within `driverResponseTimeout`.
/// Sweeper-only, like `system_cancel_no_show`; flips the stale
/// `DriverOffer` to `expired` rather than `cancelled` so the two causes
/// (timeout vs. a later transition superseding it) stay distinguishable.
pub async fn system_expire_offer(
    store: &dyn Store,
    clock: &dyn Clock,
    trip_id: &TripId,
    driver_id: &DriverId,
) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_pre_state(&trip, &[TripStatus::Pending])?;

    let offer = tx.get_driver_offer(driver_id, trip_id).await?;
    let offer_is_pending = offer
        .as_ref()
        .map(|o| o.status == DriverOfferStatus::Pending)
        .unwrap_or(false);
    if !offer_is_pending {
        // Already resolved concurrently (accepted/rejected/cancelled); nothing to do.
        tx.commit().await?;
        return Ok(trip);
    }

    let now = clock.now();
    let mut expired_offer = offer.expect("checked pending above");
    expired_offer.status = DriverOfferStatus::Expired;
    tx.put_driver_offer(driver_id, trip_id, expired_offer).await;

    trip.status = TripStatus::NoDriverAvailable;
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), driver_id, now).await?;

    tx.commit().await?;
    Ok(trip)
}

/// Force-cancels due to driver no-show, used only by the sweeper (C9). Does
/// not re-check the actor since the sweeper is not actor-scoped.
pub async fn system_cancel_no_show(store: &dyn Store, clock: &dyn Clock, trip_id: &TripId) -> CoreResult<Trip> {
    let mut tx = store.begin_transaction().await?;
    let mut trip = load_trip(tx.as_mut(), trip_id).await?;
    require_pre_state(&trip, &[TripStatus::Accepted])?;

    let now = clock.now();
    trip.status = TripStatus::CancelledBySystem;
    trip.cancelled_at = Some(now);
    trip.cancelled_by = Some(CancelledBy::System);
    trip.cancellation_reason = Some("driver_no_show".to_string());
    let driver_id = trip.driver_id.clone();
    tx.put_trip(trip_id, trip.clone()).await;
    release_driver(tx.as_mut(), &driver_id, now).await?;
    cancel_pending_offer(tx.as_mut(), &driver_id, trip_id).await?;

    tx.commit().await?;
    Ok(trip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::geo::GeoPoint;
    use crate::model::DriverOfferStatus;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, Utc};

    async fn seed_pending_trip(store: &MemoryStore, driver_id: &DriverId, passenger_id: &PassengerId) -> TripId {
        let now = Utc::now();
        let trip_id = TripId::new();
        let trip = Trip {
            passenger_id: passenger_id.clone(),
            driver_id: driver_id.clone(),
            pickup: GeoPoint::new(32.0, 34.0),
            dropoff: GeoPoint::new(32.1, 34.1),
            estimated_distance_km: 10.0,
            estimated_duration_min: 15.0,
            estimated_price_ils: 5,
            status: TripStatus::Pending,
            fare_amount: 5,
            payment_status: PaymentStatus::Pending,
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
        let mut driver = crate::model::Driver::new_offline(now);
        driver.is_online = true;
        driver.is_available = false;
        driver.current_trip_id = Some(trip_id.clone());
        store.put_driver(driver_id, driver).await.unwrap();

        let offer = DriverOffer {
            trip_id: trip_id.clone(),
            driver_id: driver_id.clone(),
            status: DriverOfferStatus::Pending,
            created_at: now,
            expires_at: now + Duration::seconds(20),
        };

        let mut tx = store.begin_transaction().await.unwrap();
        tx.put_trip(&trip_id, trip).await;
        tx.put_driver_offer(driver_id, &trip_id, offer).await;
        tx.commit().await.unwrap();

        trip_id
    }

    #[tokio::test]
    async fn accept_offer_moves_pending_to_accepted() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        let trip = accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(trip.status, TripStatus::Accepted);
        assert!(trip.accepted_at.is_some());
    }

    #[tokio::test]
    async fn second_accept_sees_forbidden_with_current_state() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        let second = accept_offer(&store, &clock, &trip_id, &driver_id).await;
        let err = second.expect_err("second accept must fail");
        assert!(err.is_kind(crate::error::ErrorKind::Forbidden));
        assert_eq!(err.details["current_state"], "accepted");
    }

    #[tokio::test]
    async fn reject_offer_releases_driver_and_is_idempotent() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        let trip = reject_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(trip.status, TripStatus::NoDriverAvailable);
        let driver = store.get_driver(&driver_id).await.unwrap().unwrap();
        assert!(driver.is_available);

        // Idempotent: calling again on an already-terminal offer is a no-op success.
        let second = reject_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(second.status, TripStatus::NoDriverAvailable);
    }

    #[tokio::test]
    async fn cancel_by_passenger_forbidden_after_driver_arrived() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        driver_arrived(&store, &clock, &trip_id, &driver_id).await.unwrap();

        let result = cancel_by_passenger(&store, &clock, &trip_id, &passenger_id).await;
        assert!(result.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn complete_trip_creates_payment_exactly_once() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        driver_arrived(&store, &clock, &trip_id, &driver_id).await.unwrap();
        start_trip(&store, &clock, &trip_id, &driver_id).await.unwrap();
        let trip = complete_trip(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(trip.status, TripStatus::Completed);

        let payment_id = payment_id_for_trip(&trip_id);
        let payment = store.get_payment(&payment_id).await.unwrap().unwrap();
        assert_eq!(payment.amount, trip.fare_amount);

        // Re-issuing completeTrip on an already-completed trip is forbidden and
        // must not touch the payment record.
        let retry = complete_trip(&store, &clock, &trip_id, &driver_id).await;
        assert!(retry.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
        let payment_again = store.get_payment(&payment_id).await.unwrap().unwrap();
        assert_eq!(payment_again, payment);
    }

    #[tokio::test]
    async fn confirm_cash_payment_marks_paid() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        driver_arrived(&store, &clock, &trip_id, &driver_id).await.unwrap();
        start_trip(&store, &clock, &trip_id, &driver_id).await.unwrap();
        complete_trip(&store, &clock, &trip_id, &driver_id).await.unwrap();

        let trip = confirm_cash_payment(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(trip.payment_status, PaymentStatus::Paid);

        let again = confirm_cash_payment(&store, &clock, &trip_id, &driver_id).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn no_driver_available_not_reachable_from_accepted() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        accept_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        // rejectOffer is only legal from `pending`; an accepted trip cannot
        // reach `no_driver_available` through it.
        let result = reject_offer(&store, &clock, &trip_id, &driver_id).await;
        assert!(result.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn system_expire_offer_releases_driver_and_marks_offer_expired() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let driver_id = DriverId::from("d1");
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_pending_trip(&store, &driver_id, &passenger_id).await;

        let trip = system_expire_offer(&store, &clock, &trip_id, &driver_id).await.unwrap();
        assert_eq!(trip.status, TripStatus::NoDriverAvailable);

        let driver = store.get_driver(&driver_id).await.unwrap().unwrap();
        assert!(driver.is_available);

        let offer = store.get_driver_offer(&driver_id, &trip_id).await.unwrap().unwrap();
        assert_eq!(offer.status, DriverOfferStatus::Expired);

        // Now terminal: accepting a since-expired offer is forbidden.
        let accept_result = accept_offer(&store, &clock, &trip_id, &driver_id).await;
        assert!(accept_result.unwrap_err().is_kind(crate::error::ErrorKind::Forbidden));
    }
}
