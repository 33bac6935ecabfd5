use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::api::TravelApi;
use crate::cache::{CacheKind, CacheTtl, OfflineCache};
use crate::geo::{self, Coordinate, DEFAULT_NEARBY_RADIUS_KM};
use crate::models::{Favorite, Itinerary, NewReview, Place, PlaceFilter, Review, Route, Visit};
use crate::network::NetworkMonitor;
use crate::queue::{OfflineQueue, PendingAction, QueuedAction};

use super::OfflineError;

/// Popular list size used when none is given (and by `save_for_offline`)
pub const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Maximum concurrent detail requests during `save_for_offline`
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Identifier for collections cached without a narrower scope
const ALL: &str = "all";

/// Result of a mutating call.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    /// The backend accepted the call.
    Applied(T),
    /// Offline: recorded for replay when the network returns.
    Queued(QueuedAction),
}

impl<T> MutationOutcome<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, MutationOutcome::Queued(_))
    }
}

/// What `save_for_offline` managed to store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub places: usize,
    pub popular: usize,
    pub routes: usize,
    pub itineraries: usize,
    pub itinerary_details: usize,
    pub favorites: usize,
    pub visited: usize,
    /// Resources that could not be fetched or stored
    pub failed: Vec<String>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Offline-aware accessors over the travel API.
#[derive(Clone)]
pub struct OfflineRepository {
    api: Arc<dyn TravelApi>,
    cache: OfflineCache,
    network: NetworkMonitor,
    queue: OfflineQueue,
}

impl OfflineRepository {
    pub fn new(
        api: Arc<dyn TravelApi>,
        cache: OfflineCache,
        network: NetworkMonitor,
        queue: OfflineQueue,
    ) -> Self {
        Self {
            api,
            cache,
            network,
            queue,
        }
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    // ===== Reads =====

    pub async fn places(&self, filter: &PlaceFilter) -> Result<Vec<Place>> {
        let id = filter.cache_id();
        if let Some(places) = self
            .live_or_cached(CacheKind::Places, &id, self.api.fetch_places(filter))
            .await?
        {
            return Ok(places);
        }

        // Narrower query: filter the full collection locally
        if !filter.is_empty() {
            if let Some(all) = self.all_places().await {
                debug!(filter = %id, "Filtering cached place collection");
                return Ok(filter.apply(&all));
            }
        }
        Err(OfflineError::unavailable("Places").into())
    }

    pub async fn place(&self, id: i64) -> Result<Place> {
        let key = id.to_string();
        if let Some(place) = self
            .live_or_cached(CacheKind::Place, &key, self.api.fetch_place(id))
            .await?
        {
            return Ok(place);
        }

        self.all_places()
            .await
            .and_then(|all| all.into_iter().find(|p| p.id == id))
            .ok_or_else(|| OfflineError::unavailable(format!("Place {}", id)).into())
    }

    pub async fn popular(&self, limit: usize) -> Result<Vec<Place>> {
        let key = limit.to_string();
        if let Some(places) = self
            .live_or_cached(CacheKind::Popular, &key, self.api.fetch_popular(limit))
            .await?
        {
            return Ok(places);
        }

        match self.all_places().await {
            Some(all) => {
                debug!(limit = limit, "Deriving popular places from cache");
                Ok(geo::top_rated(&all, limit))
            }
            None => Err(OfflineError::unavailable("Popular places").into()),
        }
    }

    /// Places around `center`, nearest first. Radius defaults to 20 km.
    pub async fn nearby(&self, center: Coordinate, radius_km: Option<f64>) -> Result<Vec<Place>> {
        let radius_km = radius_km.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
        let key = center.cache_id(radius_km);
        if let Some(places) = self
            .live_or_cached(CacheKind::Nearby, &key, self.api.fetch_nearby(center, radius_km))
            .await?
        {
            return Ok(places);
        }

        match self.all_places().await {
            Some(all) => {
                debug!(center = %key, "Deriving nearby places from cache");
                Ok(geo::places_within(&all, center, radius_km))
            }
            None => Err(OfflineError::unavailable("Nearby places").into()),
        }
    }

    /// All routes, or the routes through `place_id`.
    pub async fn routes(&self, place_id: Option<i64>) -> Result<Vec<Route>> {
        let key = match place_id {
            Some(id) => format!("place={}", id),
            None => ALL.to_string(),
        };
        self.live_or_cached(CacheKind::Routes, &key, self.api.fetch_routes(place_id))
            .await?
            .ok_or_else(|| OfflineError::unavailable("Routes").into())
    }

    pub async fn route(&self, id: i64) -> Result<Route> {
        self.live_or_cached(CacheKind::Route, &id.to_string(), self.api.fetch_route(id))
            .await?
            .ok_or_else(|| OfflineError::unavailable(format!("Route {}", id)).into())
    }

    pub async fn itineraries(&self) -> Result<Vec<Itinerary>> {
        self.live_or_cached(CacheKind::Itineraries, ALL, self.api.fetch_itineraries())
            .await?
            .ok_or_else(|| OfflineError::unavailable("Itineraries").into())
    }

    pub async fn itinerary(&self, id: i64) -> Result<Itinerary> {
        self.live_or_cached(CacheKind::Itinerary, &id.to_string(), self.api.fetch_itinerary(id))
            .await?
            .ok_or_else(|| OfflineError::unavailable(format!("Itinerary {}", id)).into())
    }

    pub async fn favorites(&self) -> Result<Vec<Favorite>> {
        self.live_or_cached(CacheKind::Favorites, ALL, self.api.fetch_favorites())
            .await?
            .ok_or_else(|| OfflineError::unavailable("Favorites").into())
    }

    pub async fn visited(&self) -> Result<Vec<Visit>> {
        self.live_or_cached(CacheKind::Visited, ALL, self.api.fetch_visited())
            .await?
            .ok_or_else(|| OfflineError::unavailable("Visited places").into())
    }

    /// Tiers one and two of every read.
    ///
    /// Online: run `fetch`, caching the result; if it fails, answer from
    /// the exact cache entry or propagate the error. Offline: answer from
    /// the exact cache entry. `Ok(None)` means offline with no entry, and
    /// the caller decides whether a derived answer exists.
    async fn live_or_cached<T, F>(&self, kind: CacheKind, id: &str, fetch: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: Future<Output = Result<T>>,
    {
        if !self.network.is_online() {
            return Ok(self.cache.get(kind, id).await);
        }

        match fetch.await {
            Ok(value) => {
                if let Err(e) = self.cache.put(kind, id, &value, CacheTtl::DEFAULT).await {
                    warn!(kind = %kind, id = id, error = %e, "Failed to cache response");
                }
                Ok(Some(value))
            }
            Err(e) => match self.cache.get(kind, id).await {
                Some(cached) => {
                    warn!(kind = %kind, id = id, error = %e, "Fetch failed, serving cached copy");
                    Ok(Some(cached))
                }
                None => Err(e),
            },
        }
    }

    async fn all_places(&self) -> Option<Vec<Place>> {
        self.cache.get(CacheKind::Places, ALL).await
    }

    // ===== Mutations =====

    pub async fn add_favorite(&self, place_id: i64) -> Result<MutationOutcome<()>> {
        if self.network.is_online() && self.queue_settled().await {
            self.api.add_favorite(place_id).await?;
            return Ok(MutationOutcome::Applied(()));
        }
        self.defer(PendingAction::AddFavorite { place_id }).await
    }

    pub async fn remove_favorite(&self, place_id: i64) -> Result<MutationOutcome<()>> {
        if self.network.is_online() && self.queue_settled().await {
            self.api.remove_favorite(place_id).await?;
            return Ok(MutationOutcome::Applied(()));
        }
        self.defer(PendingAction::RemoveFavorite { place_id }).await
    }

    pub async fn mark_visited(&self, place_id: i64) -> Result<MutationOutcome<()>> {
        if self.network.is_online() && self.queue_settled().await {
            self.api.mark_visited(place_id).await?;
            return Ok(MutationOutcome::Applied(()));
        }
        self.defer(PendingAction::MarkVisited { place_id }).await
    }

    pub async fn create_review(&self, review: NewReview) -> Result<MutationOutcome<Review>> {
        review.validate()?;
        if self.network.is_online() && self.queue_settled().await {
            let created = self.api.create_review(&review).await?;
            return Ok(MutationOutcome::Applied(created));
        }
        self.defer(PendingAction::CreateReview(review)).await
    }

    /// Replay anything queued earlier so a new call cannot overtake it.
    /// False if some of it is still queued.
    async fn queue_settled(&self) -> bool {
        if self.queue.is_empty().await {
            return true;
        }
        let report = self.queue.flush(self.api.as_ref()).await;
        report.remaining == 0
    }

    async fn defer<T>(&self, action: PendingAction) -> Result<MutationOutcome<T>> {
        let queued = self.queue.enqueue(action).await?;
        if self.network.is_online() {
            info!(id = %queued.id, kind = %queued.kind(), "Earlier actions still pending, queued behind them");
        } else {
            info!(id = %queued.id, kind = %queued.kind(), "Offline, action queued");
        }
        Ok(MutationOutcome::Queued(queued))
    }

    // ===== Bulk =====

    /// Download everything browsable and cache it for a week.
    pub async fn save_for_offline(&self) -> Result<SaveReport> {
        if !self.network.is_online() {
            bail!("Cannot save for offline use while the network is unavailable");
        }
        info!("Saving data for offline use");

        let all = PlaceFilter::default();
        let (places, popular, routes, itineraries, favorites, visited) = tokio::join!(
            self.api.fetch_places(&all),
            self.api.fetch_popular(DEFAULT_POPULAR_LIMIT),
            self.api.fetch_routes(None),
            self.api.fetch_itineraries(),
            self.api.fetch_favorites(),
            self.api.fetch_visited(),
        );

        let mut report = SaveReport::default();

        if let Some(places) = self.save(CacheKind::Places, ALL, places, &mut report).await {
            report.places = places.len();
        }
        let popular_key = DEFAULT_POPULAR_LIMIT.to_string();
        if let Some(popular) = self.save(CacheKind::Popular, &popular_key, popular, &mut report).await {
            report.popular = popular.len();
        }
        if let Some(routes) = self.save(CacheKind::Routes, ALL, routes, &mut report).await {
            for route in &routes {
                self.save(CacheKind::Route, &route.id.to_string(), Ok(route), &mut report)
                    .await;
            }
            report.routes = routes.len();
        }
        if let Some(favorites) = self.save(CacheKind::Favorites, ALL, favorites, &mut report).await {
            report.favorites = favorites.len();
        }
        if let Some(visited) = self.save(CacheKind::Visited, ALL, visited, &mut report).await {
            report.visited = visited.len();
        }

        if let Some(itineraries) = self
            .save(CacheKind::Itineraries, ALL, itineraries, &mut report)
            .await
        {
            report.itineraries = itineraries.len();

            debug!(
                count = itineraries.len(),
                max_concurrent = MAX_CONCURRENT_REQUESTS,
                "Fetching itinerary details"
            );
            let details: Vec<(i64, Result<Itinerary>)> = stream::iter(itineraries.iter().map(|i| i.id))
                .map(|id| async move { (id, self.api.fetch_itinerary(id).await) })
                .buffer_unordered(MAX_CONCURRENT_REQUESTS)
                .collect()
                .await;

            for (id, detail) in details {
                if self
                    .save(CacheKind::Itinerary, &id.to_string(), detail, &mut report)
                    .await
                    .is_some()
                {
                    report.itinerary_details += 1;
                }
            }
        }

        info!(
            places = report.places,
            routes = report.routes,
            itineraries = report.itineraries,
            failed = report.failed.len(),
            "Offline save complete"
        );
        Ok(report)
    }

    /// Cache one bulk-download result with the offline TTL.
    async fn save<T: Serialize + Sync>(
        &self,
        kind: CacheKind,
        id: &str,
        fetched: Result<T>,
        report: &mut SaveReport,
    ) -> Option<T> {
        let value = match fetched {
            Ok(value) => value,
            Err(e) => {
                warn!(kind = %kind, id = id, error = %e, "Offline save fetch failed");
                report.failed.push(format!("{}:{}", kind, id));
                return None;
            }
        };
        if let Err(e) = self.cache.put(kind, id, &value, CacheTtl::OFFLINE).await {
            warn!(kind = %kind, id = id, error = %e, "Offline save write failed");
            report.failed.push(format!("{}:{}", kind, id));
            return None;
        }
        Some(value)
    }

    /// Remove every cached resource. Returns the number of entries removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        Ok(self.cache.clear().await?)
    }
}
