use serde::{Deserialize, Serialize};

/// A walking or driving route linking several places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Route {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub place_ids: Vec<i64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

impl Route {
    pub fn duration_display(&self) -> String {
        match self.duration_minutes {
            Some(m) if m >= 60 => format!("{}h {:02}m", m / 60, m % 60),
            Some(m) => format!("{}m", m),
            None => "Unknown".to_string(),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.place_ids.len()
    }
}
