use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Place {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Kilometers from the query point; only set on nearby results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Place {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Substring match over name, description and city
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        contains_ignore_case(&self.name, query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| contains_ignore_case(d, query))
            || self
                .city
                .as_deref()
                .is_some_and(|c| contains_ignore_case(c, query))
    }

    pub fn location_display(&self) -> String {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => format!("{}, {}", city, country),
            (Some(city), None) => city.clone(),
            (None, Some(country)) => country.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Query parameters for the place list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceFilter {
    pub city: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl PlaceFilter {
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.category.is_none() && self.search.is_none() && self.limit.is_none()
    }

    /// Identifier this query is cached under. The unfiltered list is "all".
    pub fn cache_id(&self) -> String {
        if self.is_empty() {
            return "all".to_string();
        }
        let mut parts = Vec::new();
        if let Some(ref city) = self.city {
            parts.push(format!("city={}", city.to_lowercase()));
        }
        if let Some(ref category) = self.category {
            parts.push(format!("category={}", category.to_lowercase()));
        }
        if let Some(ref search) = self.search {
            parts.push(format!("search={}", search.to_lowercase()));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }
        parts.join("&")
    }

    /// Query string pairs for the places endpoint
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref city) = self.city {
            pairs.push(("city", city.clone()));
        }
        if let Some(ref category) = self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }

    pub fn matches(&self, place: &Place) -> bool {
        let city_ok = match (&self.city, &place.city) {
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (Some(_), None) => false,
            (None, _) => true,
        };
        let category_ok = match (&self.category, &place.category) {
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (Some(_), None) => false,
            (None, _) => true,
        };
        let search_ok = self
            .search
            .as_deref()
            .map(|q| place.matches_search(q))
            .unwrap_or(true);
        city_ok && category_ok && search_ok
    }

    /// Apply this filter to a full place collection, client-side.
    pub fn apply(&self, places: &[Place]) -> Vec<Place> {
        let matched = places.iter().filter(|p| self.matches(p)).cloned();
        match self.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: i64, name: &str, city: &str, category: &str) -> Place {
        Place {
            id,
            name: name.to_string(),
            description: None,
            city: Some(city.to_string()),
            country: None,
            category: Some(category.to_string()),
            latitude: 0.0,
            longitude: 0.0,
            rating: None,
            review_count: None,
            image_url: None,
            distance: None,
        }
    }

    #[test]
    fn test_parse_place_json() {
        let json = r#"{"id": 42, "name": "Sagrada Família", "city": "Barcelona", "category": "landmark", "latitude": 41.4036, "longitude": 2.1744, "rating": 4.8, "reviewCount": 120, "imageUrl": "https://img/1.jpg"}"#;
        let p: Place = serde_json::from_str(json).expect("Failed to parse place JSON");
        assert_eq!(p.id, 42);
        assert_eq!(p.review_count, Some(120));
        assert_eq!(p.image_url.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(p.description, None);
        assert_eq!(p.distance, None);
    }

    #[test]
    fn test_distance_not_serialized_when_absent() {
        let p = place(1, "Museum", "Paris", "museum");
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("distance"));
    }

    #[test]
    fn test_filter_cache_id() {
        assert_eq!(PlaceFilter::default().cache_id(), "all");

        let filter = PlaceFilter {
            city: Some("Paris".to_string()),
            limit: Some(5),
            ..Default::default()
        };
        assert_eq!(filter.cache_id(), "city=paris&limit=5");
    }

    #[test]
    fn test_filter_apply() {
        let places = vec![
            place(1, "Louvre", "Paris", "museum"),
            place(2, "Eiffel Tower", "Paris", "landmark"),
            place(3, "Prado", "Madrid", "museum"),
            place(4, "Orsay", "paris", "museum"),
        ];

        let filter = PlaceFilter {
            city: Some("Paris".to_string()),
            category: Some("museum".to_string()),
            ..Default::default()
        };
        let ids: Vec<i64> = filter.apply(&places).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 4]);

        let filter = PlaceFilter {
            search: Some("tower".to_string()),
            ..Default::default()
        };
        let ids: Vec<i64> = filter.apply(&places).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);

        let filter = PlaceFilter {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(filter.apply(&places).len(), 2);
    }

    #[test]
    fn test_location_display() {
        let mut p = place(1, "Louvre", "Paris", "museum");
        assert_eq!(p.location_display(), "Paris");
        p.country = Some("France".to_string());
        assert_eq!(p.location_display(), "Paris, France");
    }
}
