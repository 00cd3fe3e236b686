//! The `Store` abstraction (C1): a transactional document database.
//!
//! This crate defines the interface only, per `spec.md` ("external
//! (interface only)"); `store::memory` (feature `memstore`, default-on)
//! provides the single in-memory reference implementation used by tests,
//! `dispatch_service`, and `dispatch_experiments`. A production deployment
//! would implement `Store` against Firestore/DynamoDB/Postgres instead.
//!
//! Cross-document atomicity is modeled as an explicit `begin`/`commit`
//! transaction handle rather than a generic closure: `Transaction` buffers
//! writes and re-reads them (read-your-own-writes) until `commit`, at which
//! point they become visible to the rest of the store atomically. Dropping a
//! `Transaction` without committing discards the buffered writes — that's
//! how a failed driver re-check in the claim transaction aborts cleanly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::ids::{DriverId, PassengerId, TripId, TripRequestId};
use crate::model::{Driver, DriverOffer, Payment, Rating, SystemConfig, Trip, TripRequest};

#[cfg(feature = "memstore")]
pub mod memory;

/// Direct (non-transactional) reads and single-document writes, plus the
/// entry point into a multi-document transaction.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_driver(&self, id: &DriverId) -> CoreResult<Option<Driver>>;
    /// Single-document write: used for the driver online/offline toggle,
    /// which never touches a second document.
    async fn put_driver(&self, id: &DriverId, driver: Driver) -> CoreResult<()>;
    /// All drivers with `isOnline=true AND isAvailable=true`. Distance
    /// filtering and the `lastLocation.is_some()` check happen in the
    /// matching engine, not here.
    async fn query_eligible_drivers(&self) -> CoreResult<Vec<(DriverId, Driver)>>;

    async fn get_trip_request(&self, id: &TripRequestId) -> CoreResult<Option<TripRequest>>;
    /// Single-document write: creating the initial `open` `TripRequest` has
    /// no cross-document dependency. The later `open -> matched` transition
    /// happens inside the claim transaction (`Transaction::put_trip_request`).
    async fn put_trip_request(&self, id: &TripRequestId, request: TripRequest) -> CoreResult<()>;
    async fn get_trip(&self, id: &TripId) -> CoreResult<Option<Trip>>;
    async fn get_driver_offer(
        &self,
        driver_id: &DriverId,
        trip_id: &TripId,
    ) -> CoreResult<Option<DriverOffer>>;
    async fn get_payment(&self, payment_id: &str) -> CoreResult<Option<Payment>>;
    async fn get_rating(&self, rating_id: &str) -> CoreResult<Option<Rating>>;
    /// Single-document write; rating has no cross-document invariant.
    async fn put_rating(&self, rating_id: &str, rating: Rating) -> CoreResult<()>;

    async fn get_config(&self) -> CoreResult<Option<SystemConfig>>;
    /// Single-document write: manager toggles write this and nothing else.
    async fn put_config(&self, config: SystemConfig) -> CoreResult<()>;

    /// `TripRequest`s still `open` and created before `cutoff` (sweeper §4.5.1).
    async fn query_open_trip_requests_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(TripRequestId, TripRequest)>>;
    /// `Trip`s still `accepted` and accepted before `cutoff` (sweeper §4.5.2).
    async fn query_accepted_trips_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(TripId, Trip)>>;
    /// `DriverOffer`s still `pending` whose `expiresAt` is before `cutoff`
    /// (sweeper offer-expiry sweep, §4.3's `offer_expired(sweeper)` edge).
    async fn query_pending_driver_offers_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<(DriverId, TripId, DriverOffer)>>;
    /// The passenger's current active trip, if any (pilot cap = 1).
    async fn query_active_trip_for_passenger(
        &self,
        passenger_id: &PassengerId,
    ) -> CoreResult<Option<(TripId, Trip)>>;
    /// The driver's current active trip, if any (pilot cap = 1).
    async fn query_active_trip_for_driver(
        &self,
        driver_id: &DriverId,
    ) -> CoreResult<Option<(TripId, Trip)>>;

    async fn begin_transaction(&self) -> CoreResult<Box<dyn Transaction>>;
}

/// A single atomic, multi-document read-modify-write. Reads observe prior
/// writes made through the same handle; nothing is visible to other callers
/// until `commit`.
#[async_trait]
pub trait Transaction: Send {
    async fn get_driver(&mut self, id: &DriverId) -> CoreResult<Option<Driver>>;
    async fn put_driver(&mut self, id: &DriverId, driver: Driver);

    async fn get_trip(&mut self, id: &TripId) -> CoreResult<Option<Trip>>;
    async fn put_trip(&mut self, id: &TripId, trip: Trip);

    async fn get_trip_request(&mut self, id: &TripRequestId) -> CoreResult<Option<TripRequest>>;
    async fn put_trip_request(&mut self, id: &TripRequestId, request: TripRequest);

    async fn get_driver_offer(
        &mut self,
        driver_id: &DriverId,
        trip_id: &TripId,
    ) -> CoreResult<Option<DriverOffer>>;
    async fn put_driver_offer(&mut self, driver_id: &DriverId, trip_id: &TripId, offer: DriverOffer);

    async fn get_payment(&mut self, payment_id: &str) -> CoreResult<Option<Payment>>;
    async fn put_payment(&mut self, payment_id: &str, payment: Payment);

    /// Commit all buffered writes atomically. Consumes the handle so it
    /// cannot be used (or accidentally double-committed) afterward.
    async fn commit(self: Box<Self>) -> CoreResult<()>;
}
