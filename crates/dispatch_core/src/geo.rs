//! Geographic math: Haversine distance between raw lat/lng points.
//!
//! The teacher's simulation indexes positions as H3 cells; the dispatch
//! engine takes raw GPS coordinates from clients, so the distance function
//! works directly in degrees rather than through a hex grid.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers, per spec.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Pilot search radius cap: drivers further than this are never matched.
pub const MAX_SEARCH_RADIUS_KM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haversine great-circle distance between two points, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}
