//! Server-authoritative fare pricing.
//!
//! The client's submitted estimate is never trusted: every `Trip.fareAmount`
//! and `Trip.estimatedPriceIls` is recomputed here from distance alone.

use serde::{Deserialize, Serialize};

/// Minimum fare floor, in ILS.
pub const MIN_FARE_ILS: i64 = 5;

/// Linear fare coefficient, ILS per kilometer.
pub const RATE_PER_KM: f64 = 0.5;

/// Pricing knobs, overridable via `SystemConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub min_fare_ils: i64,
    pub rate_per_km: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_fare_ils: MIN_FARE_ILS,
            rate_per_km: RATE_PER_KM,
        }
    }
}

/// `price(distanceKm) = max(minFareIls, ceil(ceil(distanceKm / 0.1) * 0.1 * ratePerKm))`
///
/// Distance is first rounded *up* to the nearest 0.1 km, multiplied by the
/// per-km rate, rounded up to the nearest integer ILS, then floored at
/// `min_fare_ils`. Bit-exact with the pricing function in force at trip
/// creation — see `spec.md` §6.
pub fn price(distance_km: f64, config: PricingConfig) -> i64 {
    let distance_km = distance_km.max(0.0);
    let rounded_tenths = (distance_km / 0.1).ceil();
    let rounded_distance_km = rounded_tenths * 0.1;
    let raw_fare = (rounded_distance_km * config.rate_per_km).ceil() as i64;
    raw_fare.max(config.min_fare_ils)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_km_is_min_fare() {
        assert_eq!(price(0.0, PricingConfig::default()), MIN_FARE_ILS);
    }

    #[test]
    fn ten_km_at_defaults() {
        assert_eq!(price(10.0, PricingConfig::default()), 5);
    }

    #[test]
    fn twenty_km_at_defaults() {
        assert_eq!(price(20.0, PricingConfig::default()), 10);
    }

    #[test]
    fn fifteen_point_three_km_at_defaults() {
        assert_eq!(price(15.3, PricingConfig::default()), 8);
    }

    #[test]
    fn scenario_a_fare() {
        assert_eq!(price(37.6, PricingConfig::default()), 19);
    }

    #[test]
    fn custom_config_changes_rate_and_floor() {
        let config = PricingConfig {
            min_fare_ils: 10,
            rate_per_km: 2.0,
        };
        // rounds up to 1.0km, *2.0 = 2.0 -> below floor of 10
        assert_eq!(price(0.95, config), 10);
        // 5.0km * 2.0 = 10.0 -> exactly at floor
        assert_eq!(price(5.0, config), 10);
        // 10.0km * 2.0 = 20.0 -> above floor
        assert_eq!(price(10.0, config), 20);
    }

    #[test]
    fn never_negative_for_negative_distance_input() {
        assert_eq!(price(-5.0, PricingConfig::default()), MIN_FARE_ILS);
    }
}
