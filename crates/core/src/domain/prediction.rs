use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePrediction {
    pub commodity: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub confidence: u8,
    pub factors: Vec<String>,
}
