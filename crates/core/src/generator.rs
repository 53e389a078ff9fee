use crate::config::{ConfigError, PromptContext, Settings};
use crate::domain::generated::Generated;
use crate::domain::observation::{CommodityObservation, Trend};
use crate::domain::prediction::PricePrediction;
use crate::domain::recommendation::{
    Action, MarketAssessment, MarketSentiment, Recommendation, Volatility,
};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::gemini::GeminiClient;
use crate::llm::{json, prompt, TextGenerator};
use std::sync::Arc;

pub const FALLBACK_CONFIDENCE: u8 = 70;
pub const FALLBACK_TIMEFRAME: &str = "3-7 hari";
pub const FALLBACK_INSIGHTS: &str =
    "Sistem sedang dalam maintenance, menggunakan analisis dasar berdasarkan tren harga terkini";
pub const FALLBACK_PREDICTION_FACTOR: &str =
    "Prediksi dasar: harga diasumsikan tetap karena analisis AI tidak tersedia";
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

const RAW_OUTPUT_LOG_CHARS: usize = 2000;

/// Turns commodity observations into model-backed commentary.
///
/// Every operation is total: failures anywhere between prompt construction and
/// schema validation degrade to [`Generated::Fallback`] carrying a value derived
/// from the request alone.
#[derive(Clone)]
pub struct RecommendationGenerator {
    llm: Arc<dyn TextGenerator>,
    prompt_ctx: PromptContext,
}

impl RecommendationGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, prompt_ctx: PromptContext) -> Self {
        Self { llm, prompt_ctx }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let client = GeminiClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), settings.prompt_context()))
    }

    pub async fn generate_recommendations(
        &self,
        observations: &[CommodityObservation],
    ) -> Generated<MarketAssessment> {
        if observations.is_empty() {
            return Generated::fallback(
                fallback_assessment(observations),
                "no observations to analyze",
            );
        }

        match self.try_generate_recommendations(observations).await {
            Ok(assessment) => {
                tracing::info!(
                    provider = ?self.llm.provider(),
                    observations = observations.len(),
                    recommendations = assessment.recommendations.len(),
                    "generated market assessment"
                );
                Generated::Ai { value: assessment }
            }
            Err(err) => {
                self.log_failure("market assessment", "trend heuristic", &err);
                Generated::fallback(fallback_assessment(observations), format!("{err:#}"))
            }
        }
    }

    async fn try_generate_recommendations(
        &self,
        observations: &[CommodityObservation],
    ) -> anyhow::Result<MarketAssessment> {
        let prompt = prompt::recommendation_prompt(observations, &self.prompt_ctx)?;
        let text = self.llm.generate_text(&prompt).await?;
        json::parse_assessment(&text)
    }

    /// `horizon_days` below 1 is treated as 1.
    pub async fn generate_price_predictions(
        &self,
        observations: &[CommodityObservation],
        horizon_days: u32,
    ) -> Generated<Vec<PricePrediction>> {
        let horizon_days = horizon_days.max(1);
        if observations.is_empty() {
            return Generated::fallback(Vec::new(), "no observations to predict");
        }

        match self
            .try_generate_price_predictions(observations, horizon_days)
            .await
        {
            Ok(predictions) => {
                tracing::info!(
                    provider = ?self.llm.provider(),
                    horizon_days,
                    predictions = predictions.len(),
                    "generated price predictions"
                );
                Generated::Ai { value: predictions }
            }
            Err(err) => {
                self.log_failure("price prediction", "persistence forecast", &err);
                Generated::fallback(fallback_predictions(observations), format!("{err:#}"))
            }
        }
    }

    async fn try_generate_price_predictions(
        &self,
        observations: &[CommodityObservation],
        horizon_days: u32,
    ) -> anyhow::Result<Vec<PricePrediction>> {
        let prompt = prompt::prediction_prompt(observations, horizon_days, &self.prompt_ctx)?;
        let text = self.llm.generate_text(&prompt).await?;
        json::parse_predictions(&text)
    }

    /// Blank `location` means the configured default location.
    pub async fn extract_observations(
        &self,
        text: &str,
        location: Option<&str>,
    ) -> Generated<Vec<CommodityObservation>> {
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.prompt_ctx.default_location.as_str());

        if text.trim().is_empty() {
            return Generated::fallback(Vec::new(), "no text to extract from");
        }

        match self.try_extract_observations(text, location).await {
            Ok(observations) => {
                tracing::info!(
                    provider = ?self.llm.provider(),
                    %location,
                    observations = observations.len(),
                    "extracted observations from text"
                );
                Generated::Ai {
                    value: observations,
                }
            }
            Err(err) => {
                self.log_failure("observation extraction", "empty result", &err);
                Generated::fallback(Vec::new(), format!("{err:#}"))
            }
        }
    }
}

impl RecommendationGenerator {
    fn log_failure(&self, operation: &'static str, fallback: &'static str, err: &anyhow::Error) {
        let stage = err
            .downcast_ref::<LlmDiagnosticsError>()
            .map(|diag| diag.stage);
        let raw_output = raw_output_excerpt(err);
        tracing::warn!(
            provider = ?self.llm.provider(),
            stage,
            raw_output = raw_output.as_deref(),
            error = %err,
            "{operation} failed; using {fallback}"
        );
    }

    async fn try_extract_observations(
        &self,
        text: &str,
        location: &str,
    ) -> anyhow::Result<Vec<CommodityObservation>> {
        let prompt = prompt::extraction_prompt(text, location);
        let reply = self.llm.generate_text(&prompt).await?;
        json::parse_extracted_observations(&reply, location, chrono::Utc::now())
    }
}

/// What the provider actually sent back, if the error carries it, cut to a loggable length.
fn raw_output_excerpt(err: &anyhow::Error) -> Option<String> {
    let diag = err.downcast_ref::<LlmDiagnosticsError>()?;
    let raw = match (&diag.raw_output, &diag.raw_response_json) {
        (Some(text), _) => text.clone(),
        (None, Some(json)) => json.to_string(),
        (None, None) => return None,
    };
    Some(match raw.char_indices().nth(RAW_OUTPUT_LOG_CHARS) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw,
    })
}

/// Trend heuristic: sell into a rise, buy into a fall, hold when stable.
pub fn fallback_action(trend: Trend) -> Action {
    match trend {
        Trend::Rising => Action::Sell,
        Trend::Falling => Action::Buy,
        Trend::Stable => Action::Hold,
    }
}

pub fn fallback_recommendation(obs: &CommodityObservation) -> Recommendation {
    let magnitude = obs.percent_change.abs();
    Recommendation {
        commodity: obs.name.clone(),
        action: fallback_action(obs.trend),
        confidence: FALLBACK_CONFIDENCE,
        reason: format!(
            "Berdasarkan tren {} harga {magnitude}%",
            obs.trend.movement_noun()
        ),
        expected_return: format!("{magnitude}%-{}%", magnitude + 5.0),
        timeframe: FALLBACK_TIMEFRAME.to_string(),
    }
}

pub fn fallback_assessment(observations: &[CommodityObservation]) -> MarketAssessment {
    MarketAssessment {
        recommendations: observations.iter().map(fallback_recommendation).collect(),
        market_sentiment: MarketSentiment::Neutral,
        volatility: Volatility::Medium,
        insights: FALLBACK_INSIGHTS.to_string(),
    }
}

/// Persistence forecast: tomorrow's price is today's.
pub fn fallback_predictions(observations: &[CommodityObservation]) -> Vec<PricePrediction> {
    observations
        .iter()
        .map(|obs| PricePrediction {
            commodity: obs.name.clone(),
            current_price: obs.current_price,
            predicted_price: obs.current_price,
            confidence: FALLBACK_CONFIDENCE,
            factors: vec![FALLBACK_PREDICTION_FACTOR.to_string()],
        })
        .collect()
}
