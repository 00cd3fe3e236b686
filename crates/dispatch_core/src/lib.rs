//! # Ride Dispatch Core
//!
//! The server-side core of a taxi-hailing platform: assigns nearby drivers
//! to passenger ride requests, drives each trip through its state machine
//! from request to payment, expires stalled work, enforces pilot-phase
//! safety limits, and exposes a global kill switch.
//!
//! ## Overview
//!
//! - **Store** ([`store`]): the transactional document-database interface;
//!   [`store::memory`] (feature `memstore`, default-on) is the in-memory
//!   reference implementation.
//! - **Matching** ([`matching`]): nearest-eligible-driver search plus the
//!   transactional claim that binds a driver to a new trip.
//! - **Trip state machine** ([`state_machine`]): every legal transition.
//! - **Timeout sweeper** ([`sweeper`]): expires stale requests, cancels
//!   no-show trips.
//! - **Admission** ([`admission`]): the single callable entry point per
//!   operation — authentication, validation, kill switch, authorization,
//!   dispatch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dispatch_core::admission::{AdmissionService, TripEstimate};
//! use dispatch_core::auth::RoleRegistry;
//! use dispatch_core::clock::SystemClock;
//! use dispatch_core::geo::GeoPoint;
//! use dispatch_core::ids::PassengerId;
//! use dispatch_core::store::memory::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let clock: Arc<dyn dispatch_core::clock::Clock> = Arc::new(SystemClock);
//! let service = AdmissionService::new(store, clock, RoleRegistry::new());
//!
//! let result = service
//!     .request_trip(
//!         &PassengerId::from("passenger_1"),
//!         GeoPoint::new(32.2211, 35.2544),
//!         GeoPoint::new(31.9038, 35.2034),
//!         TripEstimate { distance_km: 37.6, duration_min: 40.0, price_ils: 19 },
//!     )
//!     .await?;
//! println!("{:?}", result.status);
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod matching;
pub mod model;
pub mod pricing;
pub mod rating;
pub mod state_machine;
pub mod store;
pub mod sweeper;
