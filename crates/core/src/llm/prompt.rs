use crate::config::PromptContext;
use crate::domain::observation::CommodityObservation;
use anyhow::Context;
use serde::Serialize;

/// Observation as shown to the model, with Indonesian field labels.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptRow<'a> {
    komoditas: &'a str,
    harga_sekarang: f64,
    harga_sebelumnya: f64,
    tren: &'static str,
    persentase_perubahan: f64,
    sumber: String,
    lokasi: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    satuan: Option<&'a str>,
}

fn observations_json(
    observations: &[CommodityObservation],
    ctx: &PromptContext,
) -> anyhow::Result<String> {
    let rows: Vec<PromptRow<'_>> = observations
        .iter()
        .map(|obs| PromptRow {
            komoditas: &obs.name,
            harga_sekarang: obs.current_price,
            harga_sebelumnya: obs.previous_price,
            tren: obs.trend.prompt_label(),
            persentase_perubahan: obs.percent_change,
            sumber: obs.sources.join(", "),
            lokasi: obs
                .location
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(ctx.default_location.as_str()),
            satuan: obs.unit.as_deref(),
        })
        .collect();

    serde_json::to_string_pretty(&rows).context("failed to serialize observations for prompt")
}

pub fn recommendation_prompt(
    observations: &[CommodityObservation],
    ctx: &PromptContext,
) -> anyhow::Result<String> {
    let data = observations_json(observations, ctx)?;
    let place = format!("{}, {}", ctx.default_location, ctx.region);

    let schema = [
        "{",
        "  \"recommendations\": [",
        "    {",
        "      \"commodity\": \"nama komoditas\",",
        "      \"action\": \"beli/jual/tahan\",",
        "      \"confidence\": 85,",
        "      \"reason\": \"alasan detail berdasarkan analisis tren dan kondisi pasar\",",
        "      \"expectedReturn\": \"perkiraan return dalam persen\",",
        "      \"timeframe\": \"estimasi waktu dalam hari/minggu\"",
        "    }",
        "  ],",
        "  \"marketSentiment\": \"positif/negatif/netral\",",
        "  \"volatility\": \"rendah/sedang/tinggi\",",
        "  \"insights\": \"insight pasar umum dan prediksi kondisi mendatang\"",
        "}",
    ]
    .join("\n");

    Ok(format!(
        "Sebagai AI ahli analisis komoditas pertanian di {place}, analisis data harga komoditas berikut dan berikan rekomendasi yang akurat:\n\n\
DATA KOMODITAS:\n{data}\n\n\
KONTEKS LOKAL:\n\
- Lokasi: {place}\n\
- Fokus: Petani lokal, UMKM, pedagang pasar tradisional\n\
- Musim: Pertimbangkan faktor cuaca dan musim panen lokal\n\
- Kondisi ekonomi: Pasar lokal dan regional {region}\n\n\
INSTRUKSI ANALISIS:\n\
1. Analisis tren harga setiap komoditas\n\
2. Pertimbangkan faktor musiman dan lokal {location}\n\
3. Berikan rekomendasi praktis untuk petani dan pedagang\n\
4. Sertakan tingkat kepercayaan prediksi (0-100)\n\
5. Pertimbangkan volatilitas pasar\n\n\
WAJIB RESPONSE DALAM FORMAT JSON BERIKUT (tanpa markdown atau backticks):\n{schema}\n\n\
Pastikan response hanya berupa JSON yang valid tanpa teks tambahan.",
        region = ctx.region,
        location = ctx.default_location,
    ))
}

pub fn prediction_prompt(
    observations: &[CommodityObservation],
    horizon_days: u32,
    ctx: &PromptContext,
) -> anyhow::Result<String> {
    let data = observations_json(observations, ctx)?;

    let schema = [
        "{",
        "  \"predictions\": [",
        "    {",
        "      \"commodity\": \"nama komoditas\",",
        "      \"currentPrice\": 0,",
        "      \"predictedPrice\": 0,",
        "      \"confidence\": 0,",
        "      \"factors\": [\"faktor1\", \"faktor2\"]",
        "    }",
        "  ]",
        "}",
    ]
    .join("\n");

    Ok(format!(
        "Sebagai AI predictor harga komoditas untuk wilayah {location}, {region}, prediksi harga {horizon_days} hari ke depan berdasarkan data:\n\n\
{data}\n\n\
Berikan prediksi dalam format JSON berikut (tanpa markdown atau backticks, confidence 0-100, harga dalam rupiah):\n{schema}",
        location = ctx.default_location,
        region = ctx.region,
    ))
}

pub fn extraction_prompt(text: &str, location: &str) -> String {
    let location_line = format!("    \"location\": \"{location}\",");
    let schema = [
        "[",
        "  {",
        "    \"name\": \"nama komoditas\",",
        "    \"currentPrice\": 0,",
        "    \"unit\": \"satuan (kg/ikat/dll)\",",
        location_line.as_str(),
        "    \"source\": \"sumber informasi\",",
        "    \"lastUpdated\": \"YYYY-MM-DD jika ada\"",
        "  }",
        "]",
    ]
    .join("\n");

    format!(
        "Ekstrak informasi harga komoditas dari teks berikut untuk wilayah {location}:\n\n\
\"{text}\"\n\n\
Format response sebagai JSON array (tanpa markdown atau backticks, currentPrice berupa angka):\n{schema}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Trend;
    use chrono::{TimeZone, Utc};

    fn observation(name: &str, location: Option<&str>) -> CommodityObservation {
        CommodityObservation {
            id: format!("id-{name}"),
            name: name.to_string(),
            current_price: 12000.0,
            previous_price: 10000.0,
            trend: Trend::Rising,
            percent_change: 20.0,
            last_updated: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
            sources: vec!["Pasar Induk".to_string(), "Dinas Pertanian".to_string()],
            location: location.map(str::to_string),
            unit: None,
        }
    }

    #[test]
    fn recommendation_prompt_uses_indonesian_labels() {
        let prompt =
            recommendation_prompt(&[observation("Tomat", None)], &PromptContext::default())
                .unwrap();
        assert!(prompt.contains("\"komoditas\": \"Tomat\""));
        assert!(prompt.contains("\"hargaSekarang\": 12000.0"));
        assert!(prompt.contains("\"tren\": \"naik\""));
        assert!(prompt.contains("\"sumber\": \"Pasar Induk, Dinas Pertanian\""));
        assert!(prompt.contains("\"lokasi\": \"Banyuwangi\""));
        assert!(prompt.contains("Banyuwangi, Jawa Timur"));
        assert!(prompt.contains("\"marketSentiment\""));
    }

    #[test]
    fn explicit_location_overrides_default() {
        let observations = [observation("Tomat", Some("Genteng"))];
        let prompt = recommendation_prompt(&observations, &PromptContext::default()).unwrap();
        assert!(prompt.contains("\"lokasi\": \"Genteng\""));
    }

    #[test]
    fn prediction_prompt_mentions_horizon() {
        let prompt =
            prediction_prompt(&[observation("Kedelai", None)], 14, &PromptContext::default())
                .unwrap();
        assert!(prompt.contains("14 hari ke depan"));
        assert!(prompt.contains("\"predictions\""));
    }

    #[test]
    fn extraction_prompt_embeds_text_and_location() {
        let prompt = extraction_prompt("Harga cabai Rp45.000/kg di Pasar Genteng", "Genteng");
        assert!(prompt.contains("Rp45.000/kg"));
        assert!(prompt.contains("\"location\": \"Genteng\""));
    }
}
