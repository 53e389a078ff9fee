use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use komoditas_core::domain::observation::CommodityObservation;
use komoditas_core::domain::prediction::PricePrediction;
use komoditas_core::domain::recommendation::MarketAssessment;
use komoditas_core::generator::DEFAULT_HORIZON_DAYS;
use komoditas_core::{Generated, RecommendationGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = komoditas_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let generator = match RecommendationGenerator::from_settings(&settings) {
        Ok(generator) => generator,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "generator configuration invalid; refusing to start");
            return Err(err);
        }
    };

    let state = AppState {
        generator: Arc::new(generator),
    };
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, model = %settings.gemini_model, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/recommendations", post(post_recommendations))
        .route("/predictions", post(post_predictions))
        .route("/observations/extract", post(post_extract_observations))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    generator: Arc<RecommendationGenerator>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiResult<T> {
    request_id: Uuid,
    #[serde(flatten)]
    result: Generated<T>,
}

impl<T> ApiResult<T> {
    fn new(request_id: Uuid, operation: &'static str, result: Generated<T>) -> Self {
        if let Some(reason) = result.fallback_reason() {
            tracing::warn!(%request_id, operation, %reason, "served fallback result");
        } else {
            tracing::debug!(%request_id, operation, "served AI result");
        }
        Self { request_id, result }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsRequest {
    observations: Vec<CommodityObservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionsRequest {
    observations: Vec<CommodityObservation>,
    #[serde(default)]
    horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest {
    text: String,
    #[serde(default)]
    location: Option<String>,
}

async fn post_recommendations(
    State(state): State<AppState>,
    Json(req): Json<RecommendationsRequest>,
) -> Json<ApiResult<MarketAssessment>> {
    let request_id = Uuid::new_v4();
    let result = state
        .generator
        .generate_recommendations(&req.observations)
        .await;
    Json(ApiResult::new(request_id, "recommendations", result))
}

async fn post_predictions(
    State(state): State<AppState>,
    Json(req): Json<PredictionsRequest>,
) -> Result<Json<ApiResult<Vec<PricePrediction>>>, StatusCode> {
    let horizon_days = req.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);
    if horizon_days == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let request_id = Uuid::new_v4();
    let result = state
        .generator
        .generate_price_predictions(&req.observations, horizon_days)
        .await;
    Ok(Json(ApiResult::new(request_id, "predictions", result)))
}

async fn post_extract_observations(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Json<ApiResult<Vec<CommodityObservation>>> {
    let request_id = Uuid::new_v4();
    let result = state
        .generator
        .extract_observations(&req.text, req.location.as_deref())
        .await;
    Json(ApiResult::new(request_id, "extract_observations", result))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &komoditas_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use komoditas_core::config::PromptContext;
    use komoditas_core::domain::recommendation::Action;
    use komoditas_core::llm::{Provider, TextGenerator};
    use serde_json::{json, Value};

    struct CannedGenerator(Option<&'static str>);

    #[async_trait::async_trait]
    impl TextGenerator for CannedGenerator {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate_text(&self, _prompt: &str) -> anyhow::Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("upstream unavailable"))
        }
    }

    fn state(reply: Option<&'static str>) -> AppState {
        let generator =
            RecommendationGenerator::new(Arc::new(CannedGenerator(reply)), PromptContext::default());
        AppState {
            generator: Arc::new(generator),
        }
    }

    fn observations() -> Vec<CommodityObservation> {
        serde_json::from_value(json!([
            {
                "id": "1",
                "name": "Cabai Rawit",
                "currentPrice": 45000.0,
                "previousPrice": 40000.0,
                "trend": "rising",
                "percentChange": 12.5,
                "lastUpdated": "2026-10-17T06:00:00Z",
                "sources": ["Pasar Banyuwangi"],
            },
            {
                "id": "2",
                "name": "Beras",
                "currentPrice": 13000.0,
                "previousPrice": 13000.0,
                "trend": "stable",
                "percentChange": 0.0,
                "lastUpdated": "2026-10-17T06:00:00Z",
                "sources": [],
            },
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn recommendations_report_fallback_source() {
        let Json(body) = post_recommendations(
            State(state(None)),
            Json(RecommendationsRequest {
                observations: observations(),
            }),
        )
        .await;

        assert!(body.result.is_fallback());
        let actions: Vec<Action> = body
            .result
            .value()
            .recommendations
            .iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(actions, vec![Action::Sell, Action::Hold]);

        let wire: Value = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["source"], json!("fallback"));
        assert!(wire["requestId"].is_string());
        assert_eq!(wire["value"]["marketSentiment"], json!("neutral"));
    }

    #[tokio::test]
    async fn recommendations_pass_through_ai_result() {
        let reply = r#"```json
{"recommendations": [{"commodity": "Beras", "action": "beli", "confidence": 77}], "marketSentiment": "positif"}
```"#;
        let Json(body) = post_recommendations(
            State(state(Some(reply))),
            Json(RecommendationsRequest {
                observations: observations(),
            }),
        )
        .await;

        let wire: Value = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["source"], json!("ai"));
        assert_eq!(wire["value"]["recommendations"][0]["action"], json!("buy"));
        assert_eq!(wire["value"]["marketSentiment"], json!("positive"));
    }

    #[tokio::test]
    async fn predictions_reject_zero_horizon() {
        let res = post_predictions(
            State(state(None)),
            Json(PredictionsRequest {
                observations: observations(),
                horizon_days: Some(0),
            }),
        )
        .await;
        assert_eq!(res.unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extraction_falls_back_to_empty() {
        let Json(body) = post_extract_observations(
            State(state(Some("tidak ada data"))),
            Json(ExtractRequest {
                text: "Harga cabai naik".to_string(),
                location: None,
            }),
        )
        .await;
        assert!(body.result.is_fallback());
        assert!(body.result.value().is_empty());
    }
}
