use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single remembered item: the fundamental unit of the store.
///
/// `content` and `embedding` are immutable after write (invariant: the
/// engine never mutates them). `importance` is fixed at write time;
/// `stability` only moves upward, via reinforcement (see `query::write`
/// and `query::read`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: Uuid,
    pub agent_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub memory_type: MemoryType,
    pub topics: Vec<String>,
    pub importance: f32,
    pub stability: f32,
    pub created_at: String,
    pub event_date: Option<String>,
    pub expires_at: Option<String>,
    pub last_accessed: String,
    pub access_count: u64,
    pub source_channel: Option<String>,
    pub source_session: Option<String>,
    pub is_summary: bool,
    pub summarizes: Vec<Uuid>,
    pub is_deleted: bool,
}

impl Memory {
    /// Default stability assigned to a freshly written memory.
    pub const INITIAL_STABILITY: f32 = 0.3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Episodic => write!(f, "episodic"),
            MemoryType::Semantic => write!(f, "semantic"),
            MemoryType::Procedural => write!(f, "procedural"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            _ => Err(crate::error::Error::Validation(format!(
                "invalid memory type: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        Memory {
            id: Uuid::now_v7(),
            agent_id: "agent-1".to_string(),
            content: "user prefers dark mode".to_string(),
            embedding: vec![0.1, 0.2, 0.3],
            memory_type: MemoryType::Semantic,
            topics: vec!["ui".to_string()],
            importance: 0.5,
            stability: Memory::INITIAL_STABILITY,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            event_date: None,
            expires_at: None,
            last_accessed: "2025-01-01T00:00:00Z".to_string(),
            access_count: 0,
            source_channel: None,
            source_session: None,
            is_summary: false,
            summarizes: vec![],
            is_deleted: false,
        }
    }

    #[test]
    fn serde_roundtrip() {
        let m = sample();
        let json = serde_json::to_string(&m).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn memory_type_fromstr_and_display() {
        assert_eq!("episodic".parse::<MemoryType>().unwrap(), MemoryType::Episodic);
        assert_eq!("semantic".parse::<MemoryType>().unwrap(), MemoryType::Semantic);
        assert_eq!("procedural".parse::<MemoryType>().unwrap(), MemoryType::Procedural);
        assert!("bogus".parse::<MemoryType>().is_err());
        assert_eq!(MemoryType::Procedural.to_string(), "procedural");
    }
}
