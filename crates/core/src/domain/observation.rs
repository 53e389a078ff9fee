use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[serde(alias = "up", alias = "naik")]
    Rising,
    #[serde(alias = "down", alias = "turun")]
    Falling,
    #[serde(alias = "stabil")]
    Stable,
}

impl Trend {
    /// Label used in the prompt payload (`tren`).
    pub fn prompt_label(self) -> &'static str {
        match self {
            Trend::Rising => "naik",
            Trend::Falling => "turun",
            Trend::Stable => "stabil",
        }
    }

    /// Noun used in heuristic reasons ("tren kenaikan harga ...").
    pub fn movement_noun(self) -> &'static str {
        match self {
            Trend::Rising => "kenaikan",
            Trend::Falling => "penurunan",
            Trend::Stable => "stabilitas",
        }
    }
}

/// One commodity's price snapshot, as produced by the upstream collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityObservation {
    pub id: String,
    pub name: String,
    pub current_price: f64,
    pub previous_price: f64,
    pub trend: Trend,
    #[serde(alias = "percentage")]
    pub percent_change: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(default, alias = "source")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_collector_trend_aliases() {
        let raw = json!({
            "id": "c-1",
            "name": "Cabai Rawit",
            "currentPrice": 45000.0,
            "previousPrice": 40000.0,
            "trend": "up",
            "percentage": 12.5,
            "lastUpdated": "2026-10-01T07:00:00Z",
            "source": ["Pasar Rogojampi"],
        });

        let obs: CommodityObservation = serde_json::from_value(raw).unwrap();
        assert_eq!(obs.trend, Trend::Rising);
        assert_eq!(obs.percent_change, 12.5);
        assert_eq!(obs.sources, vec!["Pasar Rogojampi".to_string()]);
        assert_eq!(obs.location, None);
    }

    #[test]
    fn serializes_camel_case_without_empty_optionals() {
        let obs: CommodityObservation = serde_json::from_value(json!({
            "id": "c-2",
            "name": "Beras",
            "currentPrice": 13000.0,
            "previousPrice": 13000.0,
            "trend": "stable",
            "percentChange": 0.0,
            "lastUpdated": "2026-10-01T07:00:00Z",
        }))
        .unwrap();

        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(value["currentPrice"], json!(13000.0));
        assert_eq!(value["trend"], json!("stable"));
        assert!(value.get("location").is_none());
    }
}
