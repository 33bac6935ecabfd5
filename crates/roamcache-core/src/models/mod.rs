//! Data models for travel entities.
//!
//! - `Place`, `PlaceFilter`: points of interest and list queries
//! - `Route`: multi-stop routes
//! - `Itinerary`: generated travel plans
//! - Activity types: `Favorite`, `Visit`, `NewReview`, `Review`

pub mod activity;
pub mod itinerary;
pub mod place;
pub mod route;

pub use activity::{Favorite, NewReview, Review, Visit};
pub use itinerary::Itinerary;
pub use place::{Place, PlaceFilter};
pub use route::Route;
