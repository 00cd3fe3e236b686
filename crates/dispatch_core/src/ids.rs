//! Opaque document identifiers.
//!
//! IDs are newtyped `String`s rather than raw `String`/`Entity` handles so the
//! compiler catches a `TripId` passed where a `DriverId` is expected. Generation
//! is a local concern (`new_opaque_id`); callers that already hold a caller-
//! supplied identity (driver, passenger, user) just wrap it.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(new_opaque_id($prefix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

/// Generate a random opaque id with the given collection-style prefix.
///
/// Not a UUID: 80 bits of `rand` entropy hex-encoded is enough collision
/// resistance for a single-store keyspace and avoids an extra dependency.
fn new_opaque_id(prefix: &str) -> String {
    let mut bytes = [0u8; 10];
    rand::thread_rng().fill(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{prefix}_{hex}")
}

opaque_id!(TripRequestId, "req");
opaque_id!(TripId, "trip");

/// Caller-supplied identities are never generated locally, only wrapped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassengerId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

macro_rules! wrapped_caller_id {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

wrapped_caller_id!(DriverId);
wrapped_caller_id!(PassengerId);
wrapped_caller_id!(UserId);

/// Payment documents are keyed deterministically off the trip, per spec.
pub fn payment_id_for_trip(trip_id: &TripId) -> String {
    format!("payment_{}", trip_id.0)
}

/// Rating documents are keyed deterministically off the trip (one rating per trip).
pub fn rating_id_for_trip(trip_id: &TripId) -> String {
    format!("rating_{}", trip_id.0)
}
