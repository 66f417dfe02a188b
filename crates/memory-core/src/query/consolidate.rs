use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::memory::Memory;
use crate::query::write::{execute as write_execute, WriteOutcome, WriteRequest};
use crate::query::MemoryEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidateRequest {
    pub agent_id: String,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    #[serde(default = "default_decay_cutoff")]
    pub decay_cutoff: f32,
    #[serde(default = "default_trash_cutoff")]
    pub trash_cutoff: f32,
    #[serde(default = "default_dormancy_days")]
    pub dormancy_days: i64,
    #[serde(default = "default_promotion_stability")]
    pub promotion_stability: f32,
    #[serde(default = "default_promotion_access")]
    pub promotion_access: u64,
}

fn default_compression_threshold() -> usize {
    5
}
fn default_decay_cutoff() -> f32 {
    0.2
}
fn default_trash_cutoff() -> f32 {
    0.05
}
fn default_dormancy_days() -> i64 {
    30
}
fn default_promotion_stability() -> f32 {
    0.9
}
fn default_promotion_access() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedGroup {
    pub topic: String,
    pub count: usize,
    pub summary_id: Uuid,
    pub original_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidateReport {
    pub agent_id: String,
    pub decayed: Vec<Uuid>,
    pub compressed: Vec<CompressedGroup>,
    pub promotion_candidates: Vec<Uuid>,
    pub dormant_deleted: usize,
}

/// Runs the four consolidation stages in order against a fresh
/// snapshot each time: decay scan, topic-cluster compression,
/// promotion-candidate scan (read-only), dormant soft-delete.
pub async fn execute(engine: &MemoryEngine, request: ConsolidateRequest) -> Result<ConsolidateReport> {
    let now = chrono::Utc::now();

    let fading = engine
        .store
        .scan_below_retention(&request.agent_id, request.decay_cutoff, true, now)
        .await?;
    let decayed: Vec<Uuid> = fading.iter().map(|m| m.id).collect();

    let compressed = if fading.len() >= request.compression_threshold {
        compress_by_topic(engine, &request.agent_id, &fading).await?
    } else {
        tracing::debug!(
            agent_id = %request.agent_id,
            fading = fading.len(),
            threshold = request.compression_threshold,
            "fading set below compression threshold, skipping clustering"
        );
        Vec::new()
    };

    let promotion_candidates: Vec<Uuid> = engine
        .store
        .scan_promotion(&request.agent_id, request.promotion_stability, request.promotion_access)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    let dormant_deleted = engine
        .store
        .soft_delete_dormant(
            &request.agent_id,
            request.trash_cutoff,
            chrono::Duration::days(request.dormancy_days),
            now,
        )
        .await?;

    Ok(ConsolidateReport {
        agent_id: request.agent_id,
        decayed,
        compressed,
        promotion_candidates,
        dormant_deleted,
    })
}

/// Groups `fading` by topic (a memory with k topics contributes to k
/// groups), processing groups in lexicographic topic order so repeated
/// runs against the same snapshot behave identically. Each group of at
/// least 3 is summarized and its originals marked absorbed; a memory
/// belonging to multiple qualifying topics may be absorbed into more
/// than one gist — the core tolerates this since originals carry only
/// a boolean `is_summary` flag, not a single-owner pointer.
async fn compress_by_topic(engine: &MemoryEngine, agent_id: &str, fading: &[Memory]) -> Result<Vec<CompressedGroup>> {
    let mut by_topic: BTreeMap<String, Vec<&Memory>> = BTreeMap::new();
    for memory in fading {
        for topic in &memory.topics {
            by_topic.entry(topic.clone()).or_default().push(memory);
        }
    }

    let mut groups = Vec::new();
    for (topic, members) in by_topic {
        if members.len() < 3 {
            continue;
        }
        let group: Vec<Memory> = members.iter().map(|m| (*m).clone()).collect();
        let original_ids: Vec<Uuid> = group.iter().map(|m| m.id).collect();

        let summary_text = match engine.scored(engine.scoring.summarize(&group)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    agent_id = %agent_id,
                    topic = %topic,
                    error = %e,
                    "summarize failed for topic group, skipping compression for this topic"
                );
                continue;
            }
        };

        let write_request = WriteRequest {
            agent_id: agent_id.to_string(),
            content: summary_text,
            memory_type: Some(crate::model::memory::MemoryType::Semantic),
            importance: Some(0.7),
            topics: Some(vec![topic.clone()]),
            event_date: None,
            expires_at: None,
            channel: None,
            session: None,
            skip_dedup: true,
            auto_score_importance: false,
            auto_extract_topics: false,
            dedup_threshold: engine.config().dedup_threshold,
        };
        let summary_id = match write_execute(engine, write_request).await? {
            WriteOutcome::Created { id, .. } => id,
            WriteOutcome::Reinforced { id, .. } => id,
        };

        engine.store.mark_summarized(&original_ids).await?;

        groups.push(CompressedGroup { topic, count: group.len(), summary_id, original_ids });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::scoring::noop::NoopScoring;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn engine() -> MemoryEngine {
        MemoryEngine::new(Arc::new(InMemoryStore::new()), Arc::new(NoopScoring::new(16)), MemoryConfig::default())
    }

    async fn write_stale(engine: &MemoryEngine, content: &str, topics: Vec<String>) -> Uuid {
        let now = (chrono::Utc::now() - chrono::Duration::days(90)).to_rfc3339();
        let memory = Memory {
            id: Uuid::now_v7(),
            agent_id: "agent-1".into(),
            content: content.into(),
            embedding: vec![0.0; 16],
            memory_type: crate::model::memory::MemoryType::Episodic,
            topics,
            importance: 0.1,
            stability: 0.05,
            created_at: now.clone(),
            event_date: None,
            expires_at: None,
            last_accessed: now,
            access_count: 0,
            source_channel: None,
            source_session: None,
            is_summary: false,
            summarizes: vec![],
            is_deleted: false,
        };
        let id = memory.id;
        engine.store.insert(memory).await.unwrap();
        id
    }

    #[tokio::test]
    async fn below_compression_threshold_skips_clustering() {
        let engine = engine();
        write_stale(&engine, "first fading memory", vec!["project-x".into()]).await;
        write_stale(&engine, "second fading memory", vec!["project-x".into()]).await;

        let report = execute(
            &engine,
            ConsolidateRequest {
                agent_id: "agent-1".into(),
                compression_threshold: 5,
                decay_cutoff: 0.2,
                trash_cutoff: 0.05,
                dormancy_days: 30,
                promotion_stability: 0.9,
                promotion_access: 10,
            },
        )
        .await
        .unwrap();
        assert!(report.compressed.is_empty());
    }

    #[tokio::test]
    async fn promotion_candidates_are_recorded_not_mutated() {
        let engine = engine();
        let id = match write_execute(
            &engine,
            WriteRequest {
                agent_id: "agent-1".into(),
                content: "a stable, frequently accessed fact".into(),
                memory_type: Some(crate::model::memory::MemoryType::Semantic),
                importance: Some(0.8),
                topics: Some(vec!["facts".into()]),
                event_date: None,
                expires_at: None,
                channel: None,
                session: None,
                skip_dedup: true,
                auto_score_importance: false,
                auto_extract_topics: false,
                dedup_threshold: 0.92,
            },
        )
        .await
        .unwrap()
        {
            WriteOutcome::Created { id, .. } => id,
            _ => panic!("expected Created"),
        };

        let mut when = chrono::Utc::now();
        for _ in 0..10 {
            when += chrono::Duration::days(20);
            engine.store.reinforce(id, when).await.unwrap();
        }

        let report = execute(
            &engine,
            ConsolidateRequest {
                agent_id: "agent-1".into(),
                compression_threshold: 5,
                decay_cutoff: 0.2,
                trash_cutoff: 0.05,
                dormancy_days: 30,
                promotion_stability: 0.5,
                promotion_access: 5,
            },
        )
        .await
        .unwrap();
        assert!(report.promotion_candidates.contains(&id));

        let after = engine.store.get(id).await.unwrap().unwrap();
        assert!(!after.is_deleted);
        assert!(!after.is_summary);
    }
}
