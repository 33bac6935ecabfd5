//! User activity: favorites, visits and reviews.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Place;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Favorite {
    #[serde(default)]
    pub id: Option<i64>,
    pub place_id: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub place: Option<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Visit {
    #[serde(default)]
    pub id: Option<i64>,
    pub place_id: i64,
    #[serde(default)]
    pub visited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub place: Option<Place>,
}

/// Lowest and highest accepted review rating
const MIN_RATING: u8 = 1;
const MAX_RATING: u8 = 5;

/// Review body as submitted by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewReview {
    pub place_id: i64,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl NewReview {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            bail!(
                "Rating must be between {} and {}, got {}",
                MIN_RATING,
                MAX_RATING,
                self.rating
            );
        }
        Ok(())
    }
}

/// Review as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Review {
    pub id: i64,
    pub place_id: i64,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_rating_bounds() {
        let mut review = NewReview {
            place_id: 1,
            rating: 5,
            comment: None,
        };
        assert!(review.validate().is_ok());
        review.rating = 0;
        assert!(review.validate().is_err());
        review.rating = 6;
        assert!(review.validate().is_err());
    }

    #[test]
    fn test_new_review_wire_format() {
        let review = NewReview {
            place_id: 9,
            rating: 4,
            comment: Some("Lovely".to_string()),
        };
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["placeId"], 9);
        assert_eq!(value["comment"], "Lovely");
    }

    #[test]
    fn test_parse_favorite_with_embedded_place() {
        let json = r#"{"id": 1, "placeId": 5, "place": {"id": 5, "name": "Alhambra", "latitude": 37.17, "longitude": -3.58}}"#;
        let fav: Favorite = serde_json::from_str(json).expect("Failed to parse favorite JSON");
        assert_eq!(fav.place.map(|p| p.name), Some("Alhambra".to_string()));
    }
}
