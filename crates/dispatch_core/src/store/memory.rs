//! In-memory reference `Store` implementation.
//!
//! Not meant for production use — there is no persistence and transaction
//! isolation is a single global lock rather than per-document locking. It
//! exists to make the rest of the crate (and its tests) runnable without an
//! external database, the same role `test_helpers::create_test_world` plays
//! in the teacher simulation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::CoreResult;
use crate::ids::{DriverId, PassengerId, TripId, TripRequestId};
use crate::model::{
    Driver, DriverOffer, Payment, Rating, SystemConfig, Trip, TripRequest, TripRequestStatus,
    TripStatus,
};
use crate::store::{Store, Transaction};

#[derive(Debug, Default)]
struct StoreData {
    drivers: HashMap<DriverId, Driver>,
    trip_requests: HashMap<TripRequestId, TripRequest>,
    trips: HashMap<TripId, Trip>,
    driver_offers: HashMap<(DriverId, TripId), DriverOffer>,
    payments: HashMap<String, Payment>,
    ratings: HashMap<String, Rating>,
    config: Option<SystemConfig>,
}

/// Single-process, in-memory `Store`. Cheap to clone (shares the same
/// underlying data via `Arc`).
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<StoreData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_driver(&self, id: &DriverId) -> CoreResult<Option<Driver>> {
        Ok(self.data.lock().await.drivers.get(id).cloned())
    }

    async fn put_driver(&self, id: &DriverId, driver: Driver) -> CoreResult<()> {
        self.data.lock().await.drivers.insert(id.clone(), driver);
        Ok(())
    }

    async fn query_eligible_drivers(&self) -> CoreResult<Vec<(DriverId, Driver)>> {
        let data = self.data.lock().await;
        Ok(data
            .drivers
            .iter()
            .filter(|(_, d)| d.is_eligible_for_matching())
            .map(|(id, d)| (id.clone(), d.clone()))
            .collect())
    }

    async fn get_trip_request(&self, id: &TripRequestId) -> CoreResult<Option<TripRequest>> {
        Ok(self.data.lock().await.trip_requests.get(id).cloned())
    }

    async fn put_trip_request(&self, id: &TripRequestId, request: TripRequest) -> CoreResult<()> {
        self.data.lock().await.trip_requests.insert(id.clone(), request);
        Ok(())
    }

    async fn get_trip(&self, id: &TripId) -> CoreResult<Option<Trip>> {
        Ok(self.data.lock().await.trips.get(id).cloned())
    }

    async fn get_driver_offer(
        &self,
        driver_id: &DriverId,
        trip_id: &TripId,
    ) -> CoreResult<Option<DriverOffer>> {
        let key = (driver_id.clone(), trip_id.clone());
        Ok(self.data.lock().await.driver_offers.get(&key).cloned())
    }

    async fn get_payment(&self, payment_id: &str) -> CoreResult<Option<Payment>> {
        Ok(self.data.lock().await.payments.get(payment_id).cloned())
    }

    async fn get_rating(&self, rating_id: &str) -> CoreResult<Option<Rating>> {
        Ok(self.data.lock().await.ratings.get(rating_id).cloned())
    }

    async fn put_rating(&self, rating_id: &str, rating: Rating) -> CoreResult<()> {
        self.data
            .lock()
            .await
            .ratings
            .insert(rating_id.to_string(), rating);
        Ok(())
    }

    async fn get_config(&self) -> CoreResult<Option<SystemConfig>> {
        Ok(self.data.lock().await.config.clone())
    }

    async fn put_config(&self, config: SystemConfig) -> CoreResult<()> {
        self.data.lock().await.config = Some(config);
        Ok(())
    }

    async fn query_open_trip_requests_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(TripRequestId, TripRequest)>> {
        let data = self.data.lock().await;
        Ok(data
            .trip_requests
            .iter()
            .filter(|(_, r)| r.status == TripRequestStatus::Open && r.created_at < cutoff)
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect())
    }

    async fn query_accepted_trips_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(TripId, Trip)>> {
        let data = self.data.lock().await;
        Ok(data
            .trips
            .iter()
            .filter(|(_, t)| {
                t.status == TripStatus::Accepted
                    && t.accepted_at.map(|at| at < cutoff).unwrap_or(false)
            })
            .map(|(id, t)| (id.clone(), t.clone()))
            .collect())
    }

    async fn query_pending_driver_offers_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(DriverId, TripId, DriverOffer)>> {
        let data = self.data.lock().await;
        Ok(data
            .driver_offers
            .iter()
            .filter(|(_, o)| o.status == crate::model::DriverOfferStatus::Pending && o.expires_at < cutoff)
            .map(|((driver_id, trip_id), o)| (driver_id.clone(), trip_id.clone(), o.clone()))
            .collect())
    }

    async fn query_active_trip_for_passenger(
        &self,
        passenger_id: &PassengerId,
    ) -> CoreResult<Option<(TripId, Trip)>> {
        let data = self.data.lock().await;
        Ok(data
            .trips
            .iter()
            .find(|(_, t)| &t.passenger_id == passenger_id && t.status.is_active())
            .map(|(id, t)| (id.clone(), t.clone())))
    }

    async fn query_active_trip_for_driver(
        &self,
        driver_id: &DriverId,
    ) -> CoreResult<Option<(TripId, Trip)>> {
        let data = self.data.lock().await;
        Ok(data
            .trips
            .iter()
            .find(|(_, t)| &t.driver_id == driver_id && t.status.is_active())
            .map(|(id, t)| (id.clone(), t.clone())))
    }

    async fn begin_transaction(&self) -> CoreResult<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.data).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            staged_drivers: HashMap::new(),
            staged_trips: HashMap::new(),
            staged_trip_requests: HashMap::new(),
            staged_driver_offers: HashMap::new(),
            staged_payments: HashMap::new(),
        }))
    }
}

/// Holds the store's global lock for its whole lifetime: no other
/// transaction (and no direct `Store` call) can interleave. Writes are
/// staged locally and only merged into the guarded data on `commit`, so a
/// transaction dropped without committing leaves no trace.
struct MemoryTransaction {
    guard: OwnedMutexGuard<StoreData>,
    staged_drivers: HashMap<DriverId, Driver>,
    staged_trips: HashMap<TripId, Trip>,
    staged_trip_requests: HashMap<TripRequestId, TripRequest>,
    staged_driver_offers: HashMap<(DriverId, TripId), DriverOffer>,
    staged_payments: HashMap<String, Payment>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get_driver(&mut self, id: &DriverId) -> CoreResult<Option<Driver>> {
        Ok(self
            .staged_drivers
            .get(id)
            .cloned()
            .or_else(|| self.guard.drivers.get(id).cloned()))
    }

    async fn put_driver(&mut self, id: &DriverId, driver: Driver) {
        self.staged_drivers.insert(id.clone(), driver);
    }

    async fn get_trip(&mut self, id: &TripId) -> CoreResult<Option<Trip>> {
        Ok(self
            .staged_trips
            .get(id)
            .cloned()
            .or_else(|| self.guard.trips.get(id).cloned()))
    }

    async fn put_trip(&mut self, id: &TripId, trip: Trip) {
        self.staged_trips.insert(id.clone(), trip);
    }

    async fn get_trip_request(&mut self, id: &TripRequestId) -> CoreResult<Option<TripRequest>> {
        Ok(self
            .staged_trip_requests
            .get(id)
            .cloned()
            .or_else(|| self.guard.trip_requests.get(id).cloned()))
    }

    async fn put_trip_request(&mut self, id: &TripRequestId, request: TripRequest) {
        self.staged_trip_requests.insert(id.clone(), request);
    }

    async fn get_driver_offer(
        &mut self,
        driver_id: &DriverId,
        trip_id: &TripId,
    ) -> CoreResult<Option<DriverOffer>> {
        let key = (driver_id.clone(), trip_id.clone());
        Ok(self
            .staged_driver_offers
            .get(&key)
            .cloned()
            .or_else(|| self.guard.driver_offers.get(&key).cloned()))
    }

    async fn put_driver_offer(&mut self, driver_id: &DriverId, trip_id: &TripId, offer: DriverOffer) {
        self.staged_driver_offers
            .insert((driver_id.clone(), trip_id.clone()), offer);
    }

    async fn get_payment(&mut self, payment_id: &str) -> CoreResult<Option<Payment>> {
        Ok(self
            .staged_payments
            .get(payment_id)
            .cloned()
            .or_else(|| self.guard.payments.get(payment_id).cloned()))
    }

    async fn put_payment(&mut self, payment_id: &str, payment: Payment) {
        self.staged_payments.insert(payment_id.to_string(), payment);
    }

    async fn commit(mut self: Box<Self>) -> CoreResult<()> {
        for (id, driver) in self.staged_drivers.drain() {
            self.guard.drivers.insert(id, driver);
        }
        for (id, trip) in self.staged_trips.drain() {
            self.guard.trips.insert(id, trip);
        }
        for (id, request) in self.staged_trip_requests.drain() {
            self.guard.trip_requests.insert(id, request);
        }
        for (key, offer) in self.staged_driver_offers.drain() {
            self.guard.driver_offers.insert(key, offer);
        }
        for (id, payment) in self.staged_payments.drain() {
            self.guard.payments.insert(id, payment);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn sample_driver(now: DateTime<Utc>) -> Driver {
        Driver {
            is_online: true,
            is_available: true,
            last_location: Some(GeoPoint::new(32.0, 34.0)),
            current_trip_id: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn uncommitted_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let driver_id = DriverId::from("d1");
        let now = Utc::now();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.put_driver(&driver_id, sample_driver(now)).await;
        drop(tx); // never committed

        assert!(store.get_driver(&driver_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible_after_commit() {
        let store = MemoryStore::new();
        let driver_id = DriverId::from("d1");
        let now = Utc::now();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.put_driver(&driver_id, sample_driver(now)).await;
        tx.commit().await.unwrap();

        assert!(store.get_driver(&driver_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = MemoryStore::new();
        let driver_id = DriverId::from("d1");
        let now = Utc::now();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.put_driver(&driver_id, sample_driver(now)).await;
        let read_back = tx.get_driver(&driver_id).await.unwrap();
        assert!(read_back.is_some());
    }

    #[tokio::test]
    async fn query_eligible_drivers_filters_offline_and_busy() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut online_available = sample_driver(now);
        online_available.is_available = true;
        store
            .put_driver(&DriverId::from("online"), online_available)
            .await
            .unwrap();

        let mut busy = sample_driver(now);
        busy.is_available = false;
        store.put_driver(&DriverId::from("busy"), busy).await.unwrap();

        let mut offline = sample_driver(now);
        offline.is_online = false;
        store
            .put_driver(&DriverId::from("offline"), offline)
            .await
            .unwrap();

        let eligible = store.query_eligible_drivers().await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].0, DriverId::from("online"));
    }
}
