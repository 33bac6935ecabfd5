//! Mock travel API for testing
//!
//! Serves canned data and records every call. Individual operations can be
//! switched to fail, simulating a dropped connection for that endpoint.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{ApiError, TravelApi};
use crate::geo::{self, Coordinate};
use crate::models::{Favorite, Itinerary, NewReview, Place, PlaceFilter, Review, Route, Visit};

#[derive(Default)]
struct MockState {
    places: Vec<Place>,
    routes: Vec<Route>,
    itineraries: Vec<Itinerary>,
    favorites: Vec<Favorite>,
    visited: Vec<Visit>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
    next_review_id: i64,
}

#[derive(Default)]
pub struct MockTravelApi {
    state: Mutex<MockState>,
}

impl MockTravelApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_places(self, places: Vec<Place>) -> Self {
        self.state().places = places;
        self
    }

    pub fn with_routes(self, routes: Vec<Route>) -> Self {
        self.state().routes = routes;
        self
    }

    pub fn with_itineraries(self, itineraries: Vec<Itinerary>) -> Self {
        self.state().itineraries = itineraries;
        self
    }

    /// Make `op` fail until `recover` is called
    pub fn fail(&self, op: &'static str) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.state().failing.remove(op);
    }

    /// Every call made so far, as "op" or "op:arg"
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.as_str() == op || c.starts_with(&format!("{}:", op)))
            .count()
    }

    fn record(&self, op: &'static str, arg: Option<String>) -> Result<()> {
        let mut state = self.state();
        state.calls.push(match arg {
            Some(arg) => format!("{}:{}", op, arg),
            None => op.to_string(),
        });
        if state.failing.contains(op) {
            return Err(anyhow!("{} failed: connection refused", op));
        }
        Ok(())
    }
}

#[async_trait]
impl TravelApi for MockTravelApi {
    async fn fetch_places(&self, filter: &PlaceFilter) -> Result<Vec<Place>> {
        self.record("places", None)?;
        Ok(filter.apply(&self.state().places))
    }

    async fn fetch_place(&self, id: i64) -> Result<Place> {
        self.record("place", Some(id.to_string()))?;
        self.state()
            .places
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("place {}", id)).into())
    }

    async fn fetch_popular(&self, limit: usize) -> Result<Vec<Place>> {
        self.record("popular", Some(limit.to_string()))?;
        Ok(geo::top_rated(&self.state().places, limit))
    }

    async fn fetch_nearby(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Place>> {
        self.record("nearby", None)?;
        Ok(geo::places_within(&self.state().places, center, radius_km))
    }

    async fn fetch_routes(&self, place_id: Option<i64>) -> Result<Vec<Route>> {
        self.record("routes", place_id.map(|id| id.to_string()))?;
        Ok(self
            .state()
            .routes
            .iter()
            .filter(|r| place_id.map(|id| r.place_ids.contains(&id)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn fetch_route(&self, id: i64) -> Result<Route> {
        self.record("route", Some(id.to_string()))?;
        self.state()
            .routes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("route {}", id)).into())
    }

    async fn fetch_itineraries(&self) -> Result<Vec<Itinerary>> {
        self.record("itineraries", None)?;
        Ok(self.state().itineraries.clone())
    }

    async fn fetch_itinerary(&self, id: i64) -> Result<Itinerary> {
        self.record("itinerary", Some(id.to_string()))?;
        self.state()
            .itineraries
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("itinerary {}", id)).into())
    }

    async fn fetch_favorites(&self) -> Result<Vec<Favorite>> {
        self.record("favorites", None)?;
        Ok(self.state().favorites.clone())
    }

    async fn fetch_visited(&self) -> Result<Vec<Visit>> {
        self.record("visited", None)?;
        Ok(self.state().visited.clone())
    }

    async fn add_favorite(&self, place_id: i64) -> Result<()> {
        self.record("add_favorite", Some(place_id.to_string()))?;
        self.state().favorites.push(Favorite {
            id: None,
            place_id,
            created_at: None,
            place: None,
        });
        Ok(())
    }

    async fn remove_favorite(&self, place_id: i64) -> Result<()> {
        self.record("remove_favorite", Some(place_id.to_string()))?;
        self.state().favorites.retain(|f| f.place_id != place_id);
        Ok(())
    }

    async fn mark_visited(&self, place_id: i64) -> Result<()> {
        self.record("mark_visited", Some(place_id.to_string()))?;
        self.state().visited.push(Visit {
            id: None,
            place_id,
            visited_at: None,
            place: None,
        });
        Ok(())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review> {
        self.record("create_review", Some(review.place_id.to_string()))?;
        let mut state = self.state();
        state.next_review_id += 1;
        Ok(Review {
            id: state.next_review_id,
            place_id: review.place_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_and_fails_on_demand() {
        let mock = MockTravelApi::new();
        mock.add_favorite(3).await.unwrap();
        assert_eq!(mock.fetch_favorites().await.unwrap().len(), 1);

        mock.fail("favorites");
        assert!(mock.fetch_favorites().await.is_err());
        mock.recover("favorites");
        assert!(mock.fetch_favorites().await.is_ok());

        assert_eq!(mock.calls(), vec!["add_favorite:3", "favorites", "favorites", "favorites"]);
        assert_eq!(mock.call_count("favorites"), 3);
    }
}
