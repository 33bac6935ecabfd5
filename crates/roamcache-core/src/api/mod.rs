//! REST API client module for the travel backend.
//!
//! This module provides the `ApiClient` for talking to the backend and the
//! `TravelApi` trait the offline layer is written against. Requests are
//! authenticated with a JWT bearer token when one is available.

pub mod client;
pub mod error;
#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;

use crate::geo::Coordinate;
use crate::models::{Favorite, Itinerary, NewReview, Place, PlaceFilter, Review, Route, Visit};

pub use client::{ApiClient, FetchOptions};
pub use error::ApiError;

/// Backend operations used by the offline layer.
#[async_trait]
pub trait TravelApi: Send + Sync {
    async fn fetch_places(&self, filter: &PlaceFilter) -> Result<Vec<Place>>;

    async fn fetch_place(&self, id: i64) -> Result<Place>;

    async fn fetch_popular(&self, limit: usize) -> Result<Vec<Place>>;

    async fn fetch_nearby(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Place>>;

    /// All routes, or only those passing through `place_id`
    async fn fetch_routes(&self, place_id: Option<i64>) -> Result<Vec<Route>>;

    async fn fetch_route(&self, id: i64) -> Result<Route>;

    async fn fetch_itineraries(&self) -> Result<Vec<Itinerary>>;

    async fn fetch_itinerary(&self, id: i64) -> Result<Itinerary>;

    async fn fetch_favorites(&self) -> Result<Vec<Favorite>>;

    async fn fetch_visited(&self) -> Result<Vec<Visit>>;

    async fn add_favorite(&self, place_id: i64) -> Result<()>;

    async fn remove_favorite(&self, place_id: i64) -> Result<()>;

    async fn mark_visited(&self, place_id: i64) -> Result<()>;

    async fn create_review(&self, review: &NewReview) -> Result<Review>;
}
