use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed associative edge. Every logical association is stored as
/// two complementary rows `(source, target)` and `(target, source)` —
/// see `query::link` — so traversal from either endpoint is a plain
/// lookup, not a UNION query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub strength: f32,
    pub link_type: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Link {
    pub const DEFAULT_TYPE: &'static str = "association";
    /// Strength assigned the first time two memories co-occur: higher
    /// than the per-call increment, since first co-occurrence is
    /// already evidence of association.
    pub const INITIAL_STRENGTH: f32 = 0.5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip() {
        let link = Link {
            source_id: Uuid::now_v7(),
            target_id: Uuid::now_v7(),
            strength: 0.6,
            link_type: Link::DEFAULT_TYPE.to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&link).unwrap();
        let back: Link = serde_json::from_str(&json).unwrap();
        assert_eq!(link, back);
    }
}
