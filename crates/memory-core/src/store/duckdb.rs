use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::usearch::UsearchIndex;
use crate::index::VectorIndex;
use crate::model::link::Link;
use crate::model::memory::{Memory, MemoryType};
use crate::retention::retention;
use crate::store::{next_link_states, LinkedMemory, ScoredMemory, Store};

/// Composes DuckDB (memory/link metadata, embeddings as `BLOB`s — DuckDB
/// has no native vector type) with an in-process `UsearchIndex` for the
/// ANN half of `knn`. The two are glued behind the single `Store` trait
/// so callers see one transactional-ish persistence port rather than
/// two collaborators.
pub struct DuckDbStore {
    conn: Arc<Mutex<duckdb::Connection>>,
    index: UsearchIndex,
}

impl DuckDbStore {
    pub fn open(path: &Path, dimensions: usize) -> Result<Self> {
        let conn = duckdb::Connection::open(path)?;
        super::migrations::run_migrations(&conn)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)), index: UsearchIndex::new(dimensions)? };
        store.rebuild_index_blocking()?;
        Ok(store)
    }

    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        let conn = duckdb::Connection::open_in_memory()?;
        super::migrations::run_migrations(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), index: UsearchIndex::new(dimensions)? })
    }

    /// The ANN index lives in memory only; on open against an existing
    /// database file it must be rehydrated from the persisted rows.
    fn rebuild_index_blocking(&self) -> Result<()> {
        // Called only from the constructor, before the connection is
        // shared with any other task, so the lock is always free.
        let conn = self.conn.try_lock().expect("connection uncontended during construction");
        let mut stmt = conn.prepare("SELECT id, embedding FROM memories WHERE is_deleted = false")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;
        for row in rows {
            let (id, blob) = row?;
            let id = Uuid::parse_str(&id).map_err(|e| Error::Storage(e.to_string()))?;
            self.index.add(id, &deserialize_embedding(&blob))?;
        }
        Ok(())
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_memory(row: &duckdb::Row<'_>) -> duckdb::Result<Memory> {
    let id: String = row.get(0)?;
    let embedding_blob: Vec<u8> = row.get(3)?;
    let topics_json: String = row.get(5)?;
    let summarizes_json: String = row.get(16)?;

    Ok(Memory {
        id: Uuid::parse_str(&id).unwrap(),
        agent_id: row.get(1)?,
        content: row.get(2)?,
        embedding: deserialize_embedding(&embedding_blob),
        memory_type: row.get::<_, String>(4)?.parse().unwrap_or(MemoryType::Episodic),
        topics: serde_json::from_str(&topics_json).unwrap_or_default(),
        importance: row.get(6)?,
        stability: row.get(7)?,
        created_at: row.get(8)?,
        event_date: row.get(9)?,
        expires_at: row.get(10)?,
        last_accessed: row.get(11)?,
        access_count: row.get::<_, i64>(12)? as u64,
        source_channel: row.get(13)?,
        source_session: row.get(14)?,
        is_summary: row.get(15)?,
        summarizes: serde_json::from_str::<Vec<String>>(&summarizes_json)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect(),
        is_deleted: row.get(17)?,
    })
}

const SELECT_COLUMNS: &str = "id, agent_id, content, embedding, memory_type, topics, importance, stability, \
    created_at, event_date, expires_at, last_accessed, access_count, source_channel, source_session, \
    is_summary, summarizes, is_deleted";

fn is_expired(memory: &Memory, now: DateTime<Utc>) -> bool {
    memory
        .expires_at
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .is_some_and(|exp| exp.with_timezone(&Utc) <= now)
}

fn effective_retention(memory: &Memory, now: DateTime<Utc>) -> f32 {
    if is_expired(memory, now) {
        return 0.0;
    }
    let last_accessed = match DateTime::parse_from_rfc3339(&memory.last_accessed) {
        Ok(d) => d.with_timezone(&Utc),
        Err(_) => return 0.0,
    };
    retention(memory.stability, memory.importance, last_accessed, now) as f32
}

#[async_trait::async_trait]
impl Store for DuckDbStore {
    async fn knn(
        &self,
        agent_id: &str,
        vector: &[f32],
        k: usize,
        min_retention: f32,
        type_filter: Option<MemoryType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredMemory>> {
        // Oversample the ANN candidate set since filtering (agent,
        // type, retention) happens after hydration, not inside the index.
        let candidates = self.index.search(vector, (k * 8).max(k))?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;
        let mut scored = Vec::new();
        for (id, similarity) in candidates {
            let query = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?");
            let mut stmt = conn.prepare(&query)?;
            let memory: Option<Memory> = match stmt.query_row([id.to_string()], row_to_memory) {
                Ok(m) => Some(m),
                Err(duckdb::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };
            let Some(memory) = memory else { continue };
            if memory.is_deleted || memory.agent_id != agent_id {
                continue;
            }
            if let Some(t) = type_filter {
                if memory.memory_type != t {
                    continue;
                }
            }
            let r = effective_retention(&memory, now);
            if min_retention > 0.0 && r < min_retention {
                continue;
            }
            scored.push(ScoredMemory { memory, similarity });
        }

        scored.sort_by(|a, b| {
            let key_a = a.similarity * effective_retention(&a.memory, now);
            let key_b = b.similarity * effective_retention(&b.memory, now);
            key_b
                .partial_cmp(&key_a)
                .unwrap()
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn insert(&self, memory: Memory) -> Result<(Uuid, String)> {
        let conn = self.conn.lock().await;
        let embedding_blob = serialize_embedding(&memory.embedding);
        let topics_json = serde_json::to_string(&memory.topics)?;
        let summarizes_json =
            serde_json::to_string(&memory.summarizes.iter().map(|id| id.to_string()).collect::<Vec<_>>())?;

        conn.execute(
            "INSERT INTO memories (id, agent_id, content, embedding, memory_type, topics, importance, stability, \
             created_at, event_date, expires_at, last_accessed, access_count, source_channel, source_session, \
             is_summary, summarizes, is_deleted) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                memory.id.to_string(),
                memory.agent_id,
                memory.content,
                embedding_blob,
                memory.memory_type.to_string(),
                topics_json,
                memory.importance,
                memory.stability,
                memory.created_at,
                memory.event_date,
                memory.expires_at,
                memory.last_accessed,
                memory.access_count as i64,
                memory.source_channel,
                memory.source_session,
                memory.is_summary,
                summarizes_json,
                memory.is_deleted,
            ],
        )?;
        drop(conn);

        self.index.add(memory.id, &memory.embedding)?;
        Ok((memory.id, memory.created_at))
    }

    async fn reinforce(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        let query = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?");
        let mut stmt = conn.prepare(&query)?;
        let mut memory: Memory = match stmt.query_row([id.to_string()], row_to_memory) {
            Ok(m) => m,
            Err(duckdb::Error::QueryReturnedNoRows) => return Err(Error::NotFound(format!("memory {id} not found"))),
            Err(e) => return Err(e.into()),
        };
        crate::query::write::apply_reinforcement(&mut memory, now);

        conn.execute(
            "UPDATE memories SET stability = ?, last_accessed = ?, access_count = ? WHERE id = ?",
            duckdb::params![memory.stability, memory.last_accessed, memory.access_count as i64, id.to_string()],
        )?;
        Ok(())
    }

    async fn upsert_link(&self, source: Uuid, target: Uuid, increment: f32, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        let existing_forward = fetch_link(&conn, source, target)?;
        let existing_backward = fetch_link(&conn, target, source)?;
        let (forward, backward) =
            next_link_states(source, target, existing_forward.as_ref(), existing_backward.as_ref(), increment, now);

        for link in [&forward, &backward] {
            conn.execute(
                "INSERT INTO memory_links (source_id, target_id, strength, link_type, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (source_id, target_id) DO UPDATE SET strength = excluded.strength, updated_at = excluded.updated_at",
                duckdb::params![
                    link.source_id.to_string(),
                    link.target_id.to_string(),
                    link.strength,
                    link.link_type,
                    link.created_at,
                    link.updated_at,
                ],
            )?;
        }
        Ok(())
    }

    async fn scan_below_retention(
        &self,
        agent_id: &str,
        threshold: f32,
        exclude_summaries: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Memory>> {
        let conn = self.conn.lock().await;
        let query = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE agent_id = ? AND is_deleted = false");
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([agent_id], row_to_memory)?;
        let mut out = Vec::new();
        for row in rows {
            let memory = row?;
            if exclude_summaries && memory.is_summary {
                continue;
            }
            if effective_retention(&memory, now) < threshold {
                out.push(memory);
            }
        }
        Ok(out)
    }

    async fn scan_promotion(&self, agent_id: &str, stability_min: f32, access_count_min: u64) -> Result<Vec<Memory>> {
        let conn = self.conn.lock().await;
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM memories WHERE agent_id = ? AND is_deleted = false \
             AND memory_type = 'semantic' AND stability >= ? AND access_count >= ?"
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(duckdb::params![agent_id, stability_min, access_count_min as i64], row_to_memory)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn soft_delete_dormant(
        &self,
        agent_id: &str,
        retention_cutoff: f32,
        dormant_for: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let conn = self.conn.lock().await;
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM memories WHERE agent_id = ? AND is_deleted = false AND is_summary = false"
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([agent_id], row_to_memory)?;
        let mut to_delete = Vec::new();
        for row in rows {
            let memory = row?;
            let last_accessed = match DateTime::parse_from_rfc3339(&memory.last_accessed) {
                Ok(d) => d.with_timezone(&Utc),
                Err(_) => continue,
            };
            if effective_retention(&memory, now) <= retention_cutoff && now - last_accessed >= dormant_for {
                to_delete.push(memory.id);
            }
        }
        for id in &to_delete {
            conn.execute("UPDATE memories SET is_deleted = true WHERE id = ?", [id.to_string()])?;
        }
        Ok(to_delete.len())
    }

    async fn mark_summarized(&self, ids: &[Uuid]) -> Result<()> {
        let conn = self.conn.lock().await;
        for id in ids {
            conn.execute("UPDATE memories SET is_summary = true WHERE id = ?", [id.to_string()])?;
        }
        Ok(())
    }

    async fn fetch_links(&self, source_ids: &[Uuid], strength_min: f32, limit: usize) -> Result<Vec<LinkedMemory>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let source_set: std::collections::HashSet<Uuid> = source_ids.iter().copied().collect();
        let placeholders = source_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("SELECT target_id, strength FROM memory_links WHERE source_id IN ({placeholders})");
        let mut stmt = conn.prepare(&query)?;
        let params: Vec<String> = source_ids.iter().map(|id| id.to_string()).collect();
        let rows = stmt.query_map(duckdb::params_from_iter(params), |row| {
            let target: String = row.get(0)?;
            let strength: f32 = row.get(1)?;
            Ok((target, strength))
        })?;

        let mut best: std::collections::HashMap<Uuid, f32> = std::collections::HashMap::new();
        for row in rows {
            let (target, strength) = row?;
            if strength < strength_min {
                continue;
            }
            let Ok(target_id) = Uuid::parse_str(&target) else { continue };
            if source_set.contains(&target_id) {
                continue;
            }
            best.entry(target_id).and_modify(|s| *s = s.max(strength)).or_insert(strength);
        }

        let mut results = Vec::new();
        for (id, strength) in best {
            let query = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ? AND is_deleted = false");
            let mut stmt = conn.prepare(&query)?;
            match stmt.query_row([id.to_string()], row_to_memory) {
                Ok(memory) => results.push(LinkedMemory { memory, link_strength: strength }),
                Err(duckdb::Error::QueryReturnedNoRows) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        results.sort_by(|a, b| b.link_strength.partial_cmp(&a.link_strength).unwrap());
        results.truncate(limit);
        Ok(results)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Memory>> {
        let conn = self.conn.lock().await;
        let query = format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?");
        let mut stmt = conn.prepare(&query)?;
        match stmt.query_row([id.to_string()], row_to_memory) {
            Ok(memory) => Ok(Some(memory)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn fetch_link(conn: &duckdb::Connection, source: Uuid, target: Uuid) -> Result<Option<Link>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, target_id, strength, link_type, created_at, updated_at FROM memory_links \
         WHERE source_id = ? AND target_id = ?",
    )?;
    let result = stmt.query_row([source.to_string(), target.to_string()], |row| {
        Ok(Link {
            source_id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap(),
            target_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap(),
            strength: row.get(2)?,
            link_type: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    });
    match result {
        Ok(link) => Ok(Some(link)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory(agent: &str, embedding: Vec<f32>) -> Memory {
        let now = Utc::now().to_rfc3339();
        Memory {
            id: Uuid::now_v7(),
            agent_id: agent.to_string(),
            content: "test content".to_string(),
            embedding,
            memory_type: MemoryType::Episodic,
            topics: vec!["test".to_string()],
            importance: 0.5,
            stability: Memory::INITIAL_STABILITY,
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
        }
    }

    #[tokio::test]
    async fn insert_and_knn_roundtrip() {
        let store = DuckDbStore::open_in_memory(4).unwrap();
        let memory = sample_memory("agent-1", vec![1.0, 0.0, 0.0, 0.0]);
        let id = memory.id;
        store.insert(memory).await.unwrap();

        let results = store.knn("agent-1", &[1.0, 0.0, 0.0, 0.0], 5, 0.0, None, Utc::now()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.id, id);
    }

    #[tokio::test]
    async fn reinforce_persists_updated_stability() {
        let store = DuckDbStore::open_in_memory(2).unwrap();
        let memory = sample_memory("agent-1", vec![1.0, 0.0]);
        let id = memory.id;
        store.insert(memory).await.unwrap();

        let future = Utc::now() + chrono::Duration::days(14);
        store.reinforce(id, future).await.unwrap();

        let updated = store.get(id).await.unwrap().unwrap();
        assert_eq!(updated.access_count, 1);
        assert!(updated.stability > Memory::INITIAL_STABILITY);
    }

    #[tokio::test]
    async fn upsert_link_is_symmetric_and_persists() {
        let store = DuckDbStore::open_in_memory(2).unwrap();
        let a = sample_memory("agent-1", vec![1.0, 0.0]);
        let b = sample_memory("agent-1", vec![0.0, 1.0]);
        let (a_id, b_id) = (a.id, b.id);
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        store.upsert_link(a_id, b_id, 0.1, Utc::now()).await.unwrap();
        let assoc = store.fetch_links(&[a_id], 0.3, 5).await.unwrap();
        assert_eq!(assoc.len(), 1);
        assert_eq!(assoc[0].memory.id, b_id);

        let conn = store.conn.lock().await;
        let backward = fetch_link(&conn, b_id, a_id).unwrap();
        assert!(backward.is_some());
    }

    #[tokio::test]
    async fn scan_promotion_filters_by_type_and_thresholds() {
        let store = DuckDbStore::open_in_memory(2).unwrap();
        let mut candidate = sample_memory("agent-1", vec![1.0, 0.0]);
        candidate.memory_type = MemoryType::Semantic;
        candidate.stability = 0.95;
        candidate.access_count = 20;
        let candidate_id = candidate.id;
        store.insert(candidate).await.unwrap();
        store.insert(sample_memory("agent-1", vec![0.0, 1.0])).await.unwrap();

        let promotable = store.scan_promotion("agent-1", 0.9, 10).await.unwrap();
        assert_eq!(promotable.len(), 1);
        assert_eq!(promotable[0].id, candidate_id);
    }
}
