//! API client for the travel backend REST API.
//!
//! `auth_fetch` is the single entry point every request goes through: it
//! resolves the path against the base URL and attaches the bearer token if
//! one is set. The typed `TravelApi` methods are thin wrappers over it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::geo::Coordinate;
use crate::models::{Favorite, Itinerary, NewReview, Place, PlaceFilter, Review, Route, Visit};

use super::{ApiError, TravelApi};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    id: i64,
    username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceRef {
    place_id: i64,
}

/// Query string and body for `auth_fetch`.
#[derive(Debug, Default, Clone)]
pub struct FetchOptions {
    pub query: Vec<(&'static str, String)>,
    pub body: Option<serde_json::Value>,
}

impl FetchOptions {
    pub fn query(query: Vec<(&'static str, String)>) -> Self {
        Self { query, body: None }
    }

    pub fn json<B: Serialize>(body: &B) -> Result<Self> {
        Ok(Self {
            query: Vec::new(),
            body: Some(serde_json::to_value(body).context("Failed to encode request body")?),
        })
    }
}

/// API client for the travel backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client for the given backend base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: impl Into<Arc<str>>) {
        self.token = Some(token.into());
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token.into()),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Log in and return the session for the new token
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionData> {
        let response = self
            .auth_fetch(
                Method::POST,
                "/api/auth/login",
                FetchOptions::json(&LoginRequest { username, password })?,
            )
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        let login: LoginResponse = response.json().await.context("Failed to parse login response")?;

        Ok(SessionData {
            token: login.token,
            user_id: login.user.id,
            username: login.user.username,
            created_at: Utc::now(),
        })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Send a request to `path`, attaching the bearer token if present.
    /// The raw response is returned; status handling is up to the caller.
    pub async fn auth_fetch(
        &self,
        method: Method,
        path: &str,
        options: FetchOptions,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.auth_headers()?)
            .header(header::ACCEPT, "application/json");
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(ref body) = options.body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "Sending request");
        request
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, url))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send with exponential backoff on 429, returning the successful response.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        options: FetchOptions,
    ) -> Result<reqwest::Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.auth_fetch(method.clone(), path, options.clone()).await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(path = path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Vec<(&'static str, String)>) -> Result<T> {
        self.send_with_retry(Method::GET, path, FetchOptions::query(query))
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        self.send_with_retry(Method::POST, path, FetchOptions::json(body)?)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    /// Send a mutation whose response body is not needed
    async fn send_ignoring_body(&self, method: Method, path: &str, options: FetchOptions) -> Result<()> {
        self.send_with_retry(method, path, options).await?;
        Ok(())
    }
}

#[async_trait]
impl TravelApi for ApiClient {
    async fn fetch_places(&self, filter: &PlaceFilter) -> Result<Vec<Place>> {
        self.get("/api/places", filter.query_pairs()).await
    }

    async fn fetch_place(&self, id: i64) -> Result<Place> {
        self.get(&format!("/api/places/{}", id), Vec::new()).await
    }

    async fn fetch_popular(&self, limit: usize) -> Result<Vec<Place>> {
        self.get("/api/places/popular", vec![("limit", limit.to_string())])
            .await
    }

    async fn fetch_nearby(&self, center: Coordinate, radius_km: f64) -> Result<Vec<Place>> {
        self.get(
            "/api/places/nearby",
            vec![
                ("lat", center.lat.to_string()),
                ("lng", center.lng.to_string()),
                ("radius", radius_km.to_string()),
            ],
        )
        .await
    }

    async fn fetch_routes(&self, place_id: Option<i64>) -> Result<Vec<Route>> {
        let query = place_id
            .map(|id| vec![("placeId", id.to_string())])
            .unwrap_or_default();
        self.get("/api/routes", query).await
    }

    async fn fetch_route(&self, id: i64) -> Result<Route> {
        self.get(&format!("/api/routes/{}", id), Vec::new()).await
    }

    async fn fetch_itineraries(&self) -> Result<Vec<Itinerary>> {
        self.get("/api/itineraries", Vec::new()).await
    }

    async fn fetch_itinerary(&self, id: i64) -> Result<Itinerary> {
        self.get(&format!("/api/itineraries/{}", id), Vec::new()).await
    }

    async fn fetch_favorites(&self) -> Result<Vec<Favorite>> {
        self.get("/api/favorites", Vec::new()).await
    }

    async fn fetch_visited(&self) -> Result<Vec<Visit>> {
        self.get("/api/visited", Vec::new()).await
    }

    async fn add_favorite(&self, place_id: i64) -> Result<()> {
        self.send_ignoring_body(Method::POST, "/api/favorites", FetchOptions::json(&PlaceRef { place_id })?)
            .await
    }

    async fn remove_favorite(&self, place_id: i64) -> Result<()> {
        self.send_ignoring_body(
            Method::DELETE,
            &format!("/api/favorites/{}", place_id),
            FetchOptions::default(),
        )
        .await
    }

    async fn mark_visited(&self, place_id: i64) -> Result<()> {
        self.send_ignoring_body(Method::POST, "/api/visited", FetchOptions::json(&PlaceRef { place_id })?)
            .await
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review> {
        review.validate()?;
        self.post("/api/reviews", review).await
    }
}
