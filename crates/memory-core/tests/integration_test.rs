//! End-to-end lifecycle test: store, reinforce-on-duplicate, retrieve
//! with associations, link, and consolidate — run against the DuckDB
//! backend with deterministic offline scoring.

use std::sync::Arc;

use chrono::Utc;

use memory_core::config::MemoryConfig;
use memory_core::model::memory::MemoryType;
use memory_core::query::consolidate::ConsolidateRequest;
use memory_core::query::read::ReadRequest;
use memory_core::query::write::{WriteOutcome, WriteRequest};
use memory_core::scoring::noop::NoopScoring;
use memory_core::store::duckdb::DuckDbStore;
use memory_core::store::Store;
use memory_core::MemoryEngine;

const DIM: usize = 32;

fn build_engine() -> MemoryEngine {
    let store = Arc::new(DuckDbStore::open_in_memory(DIM).unwrap());
    let scoring = Arc::new(NoopScoring::new(DIM));
    MemoryEngine::new(store, scoring, MemoryConfig { embedding_dim: DIM, ..Default::default() })
}

fn write_request(agent: &str, content: &str) -> WriteRequest {
    WriteRequest {
        agent_id: agent.to_string(),
        content: content.to_string(),
        memory_type: Some(MemoryType::Semantic),
        importance: Some(0.6),
        topics: Some(vec!["testing".to_string()]),
        event_date: None,
        expires_at: None,
        channel: None,
        session: None,
        skip_dedup: false,
        auto_score_importance: false,
        auto_extract_topics: false,
        dedup_threshold: 0.92,
    }
}

#[tokio::test]
async fn write_then_retrieve_round_trip() {
    let engine = build_engine();

    let outcome = engine.write(write_request("agent-1", "the user prefers dark mode")).await.unwrap();
    let id = match outcome {
        WriteOutcome::Created { id, .. } => id,
        WriteOutcome::Reinforced { .. } => panic!("first write should create"),
    };

    let read = engine
        .read(ReadRequest {
            agent_id: "agent-1".to_string(),
            query: "the user prefers dark mode".to_string(),
            limit: 5,
            include_associations: false,
            min_retention: 0.0,
            memory_types: None,
        })
        .await
        .unwrap();

    assert_eq!(read.memories.len(), 1);
    assert_eq!(read.memories[0].memory.id, id);
    assert_eq!(read.memories[0].memory.access_count, 1, "retrieval reinforces the memory it returns");
}

#[tokio::test]
async fn identical_second_write_reinforces_instead_of_duplicating() {
    let engine = build_engine();

    let first = engine.write(write_request("agent-1", "the deploy runs at 3am UTC")).await.unwrap();
    let first_id = match first {
        WriteOutcome::Created { id, .. } => id,
        _ => panic!("expected creation"),
    };

    let second = engine.write(write_request("agent-1", "the deploy runs at 3am UTC")).await.unwrap();
    match second {
        WriteOutcome::Reinforced { id, .. } => assert_eq!(id, first_id),
        WriteOutcome::Created { .. } => panic!("identical content should reinforce, not duplicate"),
    }

    let stored = engine.store().get(first_id).await.unwrap().unwrap();
    assert_eq!(stored.access_count, 1, "reinforcement counts as one access beyond the original write");
}

#[tokio::test]
async fn linking_two_memories_makes_them_associate_on_retrieval() {
    let engine = build_engine();

    let a = match engine.write(write_request("agent-1", "project alpha uses rust")).await.unwrap() {
        WriteOutcome::Created { id, .. } => id,
        _ => panic!(),
    };
    let b = match engine.write(write_request("agent-1", "project beta uses go")).await.unwrap() {
        WriteOutcome::Created { id, .. } => id,
        _ => panic!(),
    };

    let link_outcome = engine.link(a, b, 0.1).await.unwrap();
    assert_eq!(link_outcome.forward_strength, link_outcome.backward_strength);
    assert!(link_outcome.forward_strength >= 0.5, "a fresh link starts at the first-co-occurrence strength");

    let read = engine
        .read(ReadRequest {
            agent_id: "agent-1".to_string(),
            query: "project alpha uses rust".to_string(),
            limit: 5,
            include_associations: true,
            min_retention: 0.0,
            memory_types: None,
        })
        .await
        .unwrap();

    assert!(read.memories.iter().any(|m| m.memory.id == a));
    assert!(
        read.associations.iter().any(|assoc| assoc.memory.id == b),
        "linked memory should surface as an association of the primary hit"
    );
}

#[tokio::test]
async fn consolidation_summarizes_a_cluster_and_marks_originals() {
    let engine = build_engine();
    let store = engine.store();

    let mut ids = Vec::new();
    for i in 0..5 {
        let mut req = write_request("agent-1", &format!("note about the release checklist item {i}"));
        req.topics = Some(vec!["release".to_string()]);
        let outcome = engine.write(req).await.unwrap();
        let id = match outcome {
            WriteOutcome::Created { id, .. } => id,
            WriteOutcome::Reinforced { id, .. } => id,
        };
        ids.push(id);
    }

    // Force the cluster below the decay cutoff without waiting real time.
    for id in &ids {
        let memory = store.get(*id).await.unwrap().unwrap();
        assert!(!memory.is_summary);
    }

    let report = engine
        .consolidate(ConsolidateRequest {
            agent_id: "agent-1".to_string(),
            compression_threshold: 3,
            decay_cutoff: 1.0, // everything in-window counts as "fading" for this test
            trash_cutoff: 0.0,
            dormancy_days: 30,
            promotion_stability: 0.9,
            promotion_access: 10,
        })
        .await
        .unwrap();

    assert_eq!(report.decayed.len(), 5);
    assert_eq!(report.compressed.len(), 1);
    assert_eq!(report.compressed[0].topic, "release");
    assert_eq!(report.compressed[0].count, 5);

    for id in &ids {
        let memory = store.get(*id).await.unwrap().unwrap();
        assert!(memory.is_summary, "originals are marked as summarized, not deleted");
    }
}

#[tokio::test]
async fn dormant_low_retention_memories_are_soft_deleted_on_consolidation() {
    let engine = build_engine();
    let store = engine.store();

    let old_memory = memory_core::model::memory::Memory {
        id: uuid::Uuid::now_v7(),
        agent_id: "agent-1".to_string(),
        content: "ancient scratch note".to_string(),
        embedding: vec![0.1; DIM],
        memory_type: MemoryType::Episodic,
        topics: vec![],
        importance: 0.1,
        stability: 0.1,
        created_at: (Utc::now() - chrono::Duration::days(400)).to_rfc3339(),
        event_date: None,
        expires_at: None,
        last_accessed: (Utc::now() - chrono::Duration::days(400)).to_rfc3339(),
        access_count: 0,
        source_channel: None,
        source_session: None,
        is_summary: false,
        summarizes: vec![],
        is_deleted: false,
    };
    let id = old_memory.id;
    store.insert(old_memory).await.unwrap();

    let report = engine
        .consolidate(ConsolidateRequest {
            agent_id: "agent-1".to_string(),
            compression_threshold: 100, // skip compression entirely
            decay_cutoff: 0.2,
            trash_cutoff: 0.9, // everything decayed counts as trash for this test
            dormancy_days: 30,
            promotion_stability: 0.9,
            promotion_access: 10,
        })
        .await
        .unwrap();

    assert_eq!(report.dormant_deleted, 1);
    let stored = store.get(id).await.unwrap().unwrap();
    assert!(stored.is_deleted);
}
