//! Great-circle distance and nearby filtering for cached places.

use crate::models::Place;

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default search radius for nearby queries
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(*self, *other)
    }

    /// Cache identifier for a nearby query around this point.
    /// Coordinates are rounded to 2 decimals (about 1 km) so small GPS jitter
    /// reuses the same entry.
    pub fn cache_id(&self, radius_km: f64) -> String {
        format!("{:.2},{:.2},{}", self.lat, self.lng, radius_km)
    }
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Places within `radius_km` of `center`, nearest first, each tagged with
/// its distance.
pub fn places_within(places: &[Place], center: Coordinate, radius_km: f64) -> Vec<Place> {
    let mut nearby: Vec<Place> = places
        .iter()
        .filter_map(|p| {
            let distance = center.distance_km(&p.coordinate());
            (distance <= radius_km).then(|| Place {
                distance: Some(distance),
                ..p.clone()
            })
        })
        .collect();
    nearby.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance.unwrap_or(f64::MAX))
    });
    nearby
}

/// Highest-rated places first; unrated places sort last.
pub fn top_rated(places: &[Place], limit: usize) -> Vec<Place> {
    let mut sorted = places.to_vec();
    sorted.sort_by(|a, b| {
        b.rating
            .unwrap_or(f64::MIN)
            .total_cmp(&a.rating.unwrap_or(f64::MIN))
    });
    sorted.truncate(limit);
    sorted
}
