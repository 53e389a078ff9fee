//! Shapes the model is asked to emit, and their validation into domain types.
//!
//! The prompts request Indonesian enum values (`beli`/`jual`/`tahan`, ...); the
//! English domain names are accepted too, case-insensitively.

use crate::domain::observation::{CommodityObservation, Trend};
use crate::domain::prediction::PricePrediction;
use crate::domain::recommendation::{
    Action, MarketAssessment, MarketSentiment, Recommendation, Volatility,
};
use anyhow::{bail, ensure};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INSIGHTS: &str = "Analisis berhasil diproses";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMarketAssessment {
    pub recommendations: Vec<LlmRecommendation>,
    #[serde(default)]
    pub market_sentiment: Option<String>,
    #[serde(default)]
    pub volatility: Option<String>,
    #[serde(default)]
    pub insights: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRecommendation {
    pub commodity: String,
    pub action: String,
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<LooseText>,
    #[serde(default)]
    pub expected_return: Option<LooseText>,
    #[serde(default)]
    pub timeframe: Option<LooseText>,
}

/// Free-text fields the model sometimes answers with a bare number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseText {
    Text(String),
    Number(f64),
}

impl LooseText {
    fn into_text(self) -> String {
        match self {
            LooseText::Text(s) => s.trim().to_string(),
            LooseText::Number(n) => n.to_string(),
        }
    }
}

fn loose_text(value: Option<LooseText>) -> String {
    value.map(LooseText::into_text).unwrap_or_default()
}

impl LlmMarketAssessment {
    pub fn validate_and_into_assessment(self) -> anyhow::Result<MarketAssessment> {
        let mut recommendations = Vec::with_capacity(self.recommendations.len());
        for (idx, item) in self.recommendations.into_iter().enumerate() {
            match item.validate_and_into_recommendation() {
                Ok(rec) => recommendations.push(rec),
                Err(err) => bail!("invalid recommendation at index {idx}: {err}"),
            }
        }

        let market_sentiment = match self.market_sentiment.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_sentiment(raw)?,
            _ => MarketSentiment::Neutral,
        };
        let volatility = match self.volatility.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_volatility(raw)?,
            _ => Volatility::Medium,
        };
        let insights = self
            .insights
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INSIGHTS.to_string());

        Ok(MarketAssessment {
            recommendations,
            market_sentiment,
            volatility,
            insights,
        })
    }
}

impl LlmRecommendation {
    fn validate_and_into_recommendation(self) -> anyhow::Result<Recommendation> {
        let commodity = self.commodity.trim().to_string();
        ensure!(!commodity.is_empty(), "commodity must be non-empty");

        Ok(Recommendation {
            commodity,
            action: parse_action(&self.action)?,
            confidence: parse_confidence(self.confidence)?,
            reason: loose_text(self.reason),
            expected_return: loose_text(self.expected_return),
            timeframe: loose_text(self.timeframe),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPricePredictions {
    pub predictions: Vec<LlmPricePrediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPricePrediction {
    pub commodity: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub confidence: f64,
    #[serde(default)]
    pub factors: Vec<String>,
}

impl LlmPricePredictions {
    pub fn validate_and_into_predictions(self) -> anyhow::Result<Vec<PricePrediction>> {
        let mut out = Vec::with_capacity(self.predictions.len());
        for (idx, item) in self.predictions.into_iter().enumerate() {
            let commodity = item.commodity.trim().to_string();
            ensure!(
                !commodity.is_empty(),
                "prediction at index {idx}: commodity must be non-empty"
            );
            ensure_price(item.current_price, "currentPrice")?;
            ensure_price(item.predicted_price, "predictedPrice")?;

            out.push(PricePrediction {
                commodity,
                current_price: item.current_price,
                predicted_price: item.predicted_price,
                confidence: parse_confidence(item.confidence)?,
                factors: item
                    .factors
                    .into_iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect(),
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmExtractedPrice {
    pub name: String,
    pub current_price: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl LlmExtractedPrice {
    /// Extracted prices carry no history: previous price equals current, trend is stable.
    pub fn validate_and_into_observation(
        self,
        requested_location: &str,
        extracted_at: DateTime<Utc>,
    ) -> anyhow::Result<CommodityObservation> {
        let name = self.name.trim().to_string();
        ensure!(!name.is_empty(), "name must be non-empty");
        ensure_price(self.current_price, "currentPrice")?;

        let location = non_blank(self.location).unwrap_or_else(|| requested_location.to_string());
        let last_updated = self
            .last_updated
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(extracted_at);

        Ok(CommodityObservation {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            current_price: self.current_price,
            previous_price: self.current_price,
            trend: Trend::Stable,
            percent_change: 0.0,
            last_updated,
            sources: non_blank(self.source).into_iter().collect(),
            location: Some(location),
            unit: non_blank(self.unit),
        })
    }
}

pub fn validate_extracted(
    items: Vec<LlmExtractedPrice>,
    requested_location: &str,
    extracted_at: DateTime<Utc>,
) -> anyhow::Result<Vec<CommodityObservation>> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            item.validate_and_into_observation(requested_location, extracted_at)
                .map_err(|e| anyhow::anyhow!("invalid extracted price at index {idx}: {e}"))
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn ensure_price(price: f64, field: &str) -> anyhow::Result<()> {
    ensure!(
        price.is_finite() && price >= 0.0,
        "{field} must be a non-negative number (got {price})"
    );
    Ok(())
}

fn parse_confidence(raw: f64) -> anyhow::Result<u8> {
    ensure!(
        raw.is_finite() && (0.0..=100.0).contains(&raw),
        "confidence must be between 0 and 100 (got {raw})"
    );
    Ok(raw.round() as u8)
}

pub fn parse_action(raw: &str) -> anyhow::Result<Action> {
    match raw.trim().to_lowercase().as_str() {
        "beli" | "buy" => Ok(Action::Buy),
        "jual" | "sell" => Ok(Action::Sell),
        "tahan" | "hold" => Ok(Action::Hold),
        other => bail!("unknown action: {other:?}"),
    }
}

pub fn parse_sentiment(raw: &str) -> anyhow::Result<MarketSentiment> {
    match raw.trim().to_lowercase().as_str() {
        "positif" | "positive" => Ok(MarketSentiment::Positive),
        "negatif" | "negative" => Ok(MarketSentiment::Negative),
        "netral" | "neutral" => Ok(MarketSentiment::Neutral),
        other => bail!("unknown market sentiment: {other:?}"),
    }
}

pub fn parse_volatility(raw: &str) -> anyhow::Result<Volatility> {
    match raw.trim().to_lowercase().as_str() {
        "rendah" | "low" => Ok(Volatility::Low),
        "sedang" | "medium" => Ok(Volatility::Medium),
        "tinggi" | "high" => Ok(Volatility::High),
        other => bail!("unknown volatility: {other:?}"),
    }
}
