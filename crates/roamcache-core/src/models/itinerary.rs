use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated day-by-day travel plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Itinerary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
    /// Generated plan text
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Itinerary {
    pub fn summary(&self) -> String {
        match (self.days, &self.city) {
            (Some(days), Some(city)) => format!("{} days in {}", days, city),
            (Some(days), None) => format!("{} days", days),
            (None, Some(city)) => city.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_itinerary_json() {
        let json = r#"{"id": 3, "title": "Rome weekend", "city": "Rome", "days": 2, "content": "Day 1: Colosseum", "createdAt": "2026-03-01T10:00:00Z"}"#;
        let it: Itinerary = serde_json::from_str(json).expect("Failed to parse itinerary JSON");
        assert_eq!(it.summary(), "2 days in Rome");
        assert!(it.created_at.is_some());
    }
}
