use crate::domain::contract::{
    validate_extracted, LlmExtractedPrice, LlmMarketAssessment, LlmPricePredictions,
};
use crate::domain::observation::CommodityObservation;
use crate::domain::prediction::PricePrediction;
use crate::domain::recommendation::MarketAssessment;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn delimiters(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }
}

impl fmt::Display for JsonShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonShape::Object => f.write_str("object"),
            JsonShape::Array => f.write_str("array"),
        }
    }
}

/// Removes every ```` ```json ```` / ```` ``` ```` marker (plus the newline that follows it).
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        let mut after = &rest[pos + 3..];
        if after
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            after = &after[4..];
        }
        after = after
            .strip_prefix("\r\n")
            .or_else(|| after.strip_prefix('\n'))
            .unwrap_or(after);
        rest = after;
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// First `open ... close` span whose delimiters balance, ignoring delimiters inside JSON strings.
pub fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(open) {
        let start = search_from + rel;
        if let Some(end) = span_end(&text[start..], open, close) {
            return Some(&text[start..start + end]);
        }
        search_from = start + open.len_utf8();
    }
    None
}

// Byte length of the balanced span starting at `s[0] == open`, if it closes.
fn span_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx + ch.len_utf8());
            }
        }
    }
    None
}

/// Strict parse of the fence-stripped text, then of the first balanced span of `shape`.
pub fn decode<T: DeserializeOwned>(text: &str, shape: JsonShape) -> anyhow::Result<T> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<T>(&cleaned) {
        Ok(parsed) => Ok(parsed),
        Err(strict_err) => {
            let (open, close) = shape.delimiters();
            let span = balanced_span(&cleaned, open, close).with_context(|| {
                format!("no JSON {shape} found in model output (strict parse: {strict_err})")
            })?;
            serde_json::from_str::<T>(span)
                .with_context(|| format!("model output is not a valid JSON {shape}: {span}"))
        }
    }
}

pub fn parse_assessment(text: &str) -> anyhow::Result<MarketAssessment> {
    let parsed = decode::<LlmMarketAssessment>(text, JsonShape::Object)
        .context("LLM output does not match the assessment schema")?;
    parsed.validate_and_into_assessment()
}

pub fn parse_predictions(text: &str) -> anyhow::Result<Vec<PricePrediction>> {
    let parsed = decode::<LlmPricePredictions>(text, JsonShape::Object)
        .context("LLM output does not match the predictions schema")?;
    parsed.validate_and_into_predictions()
}

pub fn parse_extracted_observations(
    text: &str,
    requested_location: &str,
    extracted_at: DateTime<Utc>,
) -> anyhow::Result<Vec<CommodityObservation>> {
    let parsed = decode::<Vec<LlmExtractedPrice>>(text, JsonShape::Array)
        .context("LLM output does not match the extraction schema")?;
    validate_extracted(parsed, requested_location, extracted_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{Action, MarketSentiment};
    use serde_json::{json, Value};

    fn assessment_json() -> String {
        json!({
            "recommendations": [{
                "commodity": "Cabai Rawit",
                "action": "jual",
                "confidence": 80,
                "reason": "pasokan menipis",
                "expectedReturn": "10-15%",
                "timeframe": "1-2 minggu",
            }],
            "marketSentiment": "positif",
            "volatility": "tinggi",
            "insights": "Harga cabai naik menjelang musim hujan",
        })
        .to_string()
    }

    #[test]
    fn strip_code_fences_handles_json_fence() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(strip_code_fences(&fenced), body);
    }

    #[test]
    fn strip_code_fences_leaves_plain_text() {
        assert_eq!(strip_code_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn fenced_output_parses_like_unwrapped_json() {
        let body = assessment_json();
        let fenced = format!("```json\n{body}\n```");
        let from_fenced: Value = decode(&fenced, JsonShape::Object).unwrap();
        let direct: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(from_fenced, direct);
    }

    #[test]
    fn balanced_span_ignores_braces_in_strings() {
        let s = r#"Berikut hasilnya: {"a": "kurung } di teks", "b": {"c": 1}} semoga membantu {x}"#;
        assert_eq!(
            balanced_span(s, '{', '}'),
            Some(r#"{"a": "kurung } di teks", "b": {"c": 1}}"#)
        );
    }

    #[test]
    fn balanced_span_skips_unclosed_opening() {
        let s = r#"catatan {tanpa penutup ... lalu [1, 2]"#;
        assert_eq!(balanced_span(s, '[', ']'), Some("[1, 2]"));
        assert_eq!(balanced_span(s, '{', '}'), None);
    }

    #[test]
    fn decode_recovers_object_wrapped_in_prose() {
        let text = format!("Tentu! Ini analisisnya:\n{}\nSemoga bermanfaat.", assessment_json());
        let assessment = parse_assessment(&text).unwrap();
        assert_eq!(assessment.recommendations.len(), 1);
        assert_eq!(assessment.recommendations[0].action, Action::Sell);
        assert_eq!(assessment.market_sentiment, MarketSentiment::Positive);
    }

    #[test]
    fn parse_assessment_rejects_missing_recommendations() {
        let text = json!({"marketSentiment": "netral"}).to_string();
        assert!(parse_assessment(&text).is_err());
    }

    #[test]
    fn parse_assessment_rejects_non_sequence_recommendations() {
        let text = json!({"recommendations": {"commodity": "Beras"}}).to_string();
        assert!(parse_assessment(&text).is_err());
    }

    #[test]
    fn parse_predictions_accepts_fenced_payload() {
        let text = "```json\n{\"predictions\":[{\"commodity\":\"Beras\",\"currentPrice\":13000,\"predictedPrice\":13200,\"confidence\":75,\"factors\":[\"panen raya\"]}]}\n```";
        let predictions = parse_predictions(text).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].predicted_price, 13200.0);
        assert_eq!(predictions[0].factors, vec!["panen raya".to_string()]);
    }

    #[test]
    fn parse_extracted_observations_finds_array_in_prose() {
        let now = Utc::now();
        let text = r#"Hasil ekstraksi: [{"name": "Bawang Putih", "currentPrice": 38000, "unit": "kg"}] selesai."#;
        let observations = parse_extracted_observations(text, "Banyuwangi", now).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].name, "Bawang Putih");
        assert_eq!(observations[0].location.as_deref(), Some("Banyuwangi"));
    }

    #[test]
    fn parse_extracted_observations_errors_without_array() {
        assert!(parse_extracted_observations("tidak ada data harga", "Banyuwangi", Utc::now()).is_err());
    }
}
