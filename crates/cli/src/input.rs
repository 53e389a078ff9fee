use anyhow::Context;
use komoditas_core::domain::observation::CommodityObservation;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Reads a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ObservationsFile {
    Bare(Vec<CommodityObservation>),
    Wrapped { observations: Vec<CommodityObservation> },
}

/// Accepts either a bare JSON array or `{"observations": [...]}`.
pub fn parse_observations(raw: &str) -> anyhow::Result<Vec<CommodityObservation>> {
    let parsed = serde_json::from_str::<ObservationsFile>(raw)
        .context("input is not a JSON array of observations or an {\"observations\": [...]} object")?;
    Ok(match parsed {
        ObservationsFile::Bare(items) => items,
        ObservationsFile::Wrapped { observations } => observations,
    })
}

pub fn load_observations(path: &Path) -> anyhow::Result<Vec<CommodityObservation>> {
    let raw = read_input(path)?;
    parse_observations(&raw).with_context(|| format!("invalid observations in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = r#"{
        "id": "1",
        "name": "Jagung",
        "currentPrice": 6000,
        "previousPrice": 6500,
        "trend": "down",
        "percentChange": -7.69,
        "lastUpdated": "2026-10-17T06:00:00Z",
        "source": ["Pasar Srono"],
        "location": "Srono"
    }"#;

    #[test]
    fn parses_bare_array() {
        let items = parse_observations(&format!("[{ROW}]")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].location.as_deref(), Some("Srono"));
    }

    #[test]
    fn parses_wrapped_object() {
        let items = parse_observations(&format!("{{\"observations\": [{ROW}, {ROW}]}}")).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_observations("{\"items\": []}").is_err());
        assert!(parse_observations("not json").is_err());
    }
}
