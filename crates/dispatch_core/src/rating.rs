//! `submitRating` (supplemented feature — `spec.md` names the operation in
//! §4.1 but does not model its storage; grounded here as a single-document
//! write keyed deterministically off the trip, the same keying style as
//! `payment_<tripId>`).
//!
//! Passenger-only, only after the trip reached `completed`, rating clamped
//! to `1..=5` by the caller before this is invoked. Re-submission overwrites
//! rather than erroring — a passenger correcting a typo shouldn't need a
//! separate "edit" operation.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ids::{rating_id_for_trip, PassengerId, TripId};
use crate::model::{Rating, TripStatus};
use crate::store::Store;

pub async fn submit_rating(
    store: &dyn Store,
    clock: &dyn Clock,
    trip_id: &TripId,
    caller: &PassengerId,
    rating: u8,
    comment: Option<String>,
) -> CoreResult<Rating> {
    if !(1..=5).contains(&rating) {
        return Err(CoreError::invalid_argument("rating must be between 1 and 5"));
    }

    let trip = store
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("trip {trip_id} not found")))?;

    if &trip.passenger_id != caller {
        return Err(CoreError::forbidden("caller is not the passenger of this trip"));
    }
    if trip.status != TripStatus::Completed {
        return Err(CoreError::forbidden_in_state(
            "trip must be completed before it can be rated",
            trip.status,
        ));
    }

    let record = Rating {
        trip_id: trip_id.clone(),
        passenger_id: caller.clone(),
        rating,
        comment,
        created_at: clock.now(),
    };

    let rating_id = rating_id_for_trip(trip_id);
    store.put_rating(&rating_id, record.clone()).await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::geo::GeoPoint;
    use crate::ids::DriverId;
    use crate::model::{PaymentStatus, Trip};
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    async fn seed_completed_trip(store: &MemoryStore, passenger_id: &PassengerId) -> TripId {
        let now = Utc::now();
        let trip_id = TripId::new();
        let trip = Trip {
            passenger_id: passenger_id.clone(),
            driver_id: DriverId::from("d1"),
            pickup: GeoPoint::new(32.0, 34.0),
            dropoff: GeoPoint::new(32.1, 34.1),
            estimated_distance_km: 10.0,
            estimated_duration_min: 15.0,
            estimated_price_ils: 5,
            status: TripStatus::Completed,
            fare_amount: 5,
            payment_status: PaymentStatus::Paid,
            paid_at: Some(now),
            created_at: now,
            accepted_at: Some(now),
            arrived_at: Some(now),
            started_at: Some(now),
            completed_at: Some(now),
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by: None,
        };
        let mut tx = store.begin_transaction().await.unwrap();
        tx.put_trip(&trip_id, trip).await;
        tx.commit().await.unwrap();
        trip_id
    }

    #[tokio::test]
    async fn rejects_out_of_range_rating() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_completed_trip(&store, &passenger_id).await;

        let err = submit_rating(&store, &clock, &trip_id, &passenger_id, 6, None)
            .await
            .unwrap_err();
        assert!(err.is_kind(crate::error::ErrorKind::InvalidArgument));
    }

    #[tokio::test]
    async fn resubmission_overwrites_previous_rating() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_completed_trip(&store, &passenger_id).await;

        submit_rating(&store, &clock, &trip_id, &passenger_id, 3, Some("meh".into()))
            .await
            .unwrap();
        let second = submit_rating(&store, &clock, &trip_id, &passenger_id, 5, None)
            .await
            .unwrap();
        assert_eq!(second.rating, 5);
        assert_eq!(second.comment, None);
    }

    #[tokio::test]
    async fn wrong_passenger_is_forbidden() {
        let store = MemoryStore::new();
        let clock = SystemClock;
        let passenger_id = PassengerId::from("p1");
        let trip_id = seed_completed_trip(&store, &passenger_id).await;

        let err = submit_rating(&store, &clock, &trip_id, &PassengerId::from("other"), 4, None)
            .await
            .unwrap_err();
        assert!(err.is_kind(crate::error::ErrorKind::Forbidden));
    }
}
