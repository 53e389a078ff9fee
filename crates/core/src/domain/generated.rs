use serde::{Deserialize, Serialize};

/// Result of a generator call, tagged with where the value came from.
///
/// `Fallback` values are computed from the request alone; `reason` carries the
/// failure that forced the fallback so callers can surface or log it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Generated<T> {
    Ai { value: T },
    Fallback { value: T, reason: String },
}

impl<T> Generated<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Generated::Fallback {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Generated::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Generated::Ai { value } | Generated::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Generated::Ai { value } | Generated::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Generated::Ai { .. } => None,
            Generated::Fallback { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_source_tag() {
        let ai = Generated::Ai { value: vec![1, 2] };
        assert_eq!(
            serde_json::to_value(&ai).unwrap(),
            json!({"source": "ai", "value": [1, 2]})
        );

        let fb = Generated::fallback(Vec::<i32>::new(), "timeout");
        assert_eq!(
            serde_json::to_value(&fb).unwrap(),
            json!({"source": "fallback", "value": [], "reason": "timeout"})
        );
        assert!(fb.is_fallback());
        assert_eq!(fb.fallback_reason(), Some("timeout"));
    }
}
