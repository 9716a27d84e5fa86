use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{cosine_similarity, IndexMatch, IndexRecord, QueryFilter};

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    namespace: String,
    #[serde(flatten)]
    record: IndexRecord,
}

/// Entries plus their position keyed by (namespace, id)
#[derive(Default)]
struct Store {
    entries: Vec<VectorEntry>,
    positions: HashMap<(String, String), usize>,
}

impl Store {
    fn from_entries(loaded: Vec<VectorEntry>) -> Self {
        let mut store = Store::default();
        for entry in loaded {
            store.insert(entry);
        }
        store
    }

    fn insert(&mut self, entry: VectorEntry) {
        let key = (entry.namespace.clone(), entry.record.id.clone());
        match self.positions.get(&key).copied() {
            Some(pos) => self.entries[pos] = entry,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

/// In-memory vector index with disk persistence and cosine similarity search.
///
/// Writes stay in memory until [`LocalIndex::flush`].
pub struct LocalIndex {
    store: RwLock<Store>,
    persist_path: PathBuf,
}

impl LocalIndex {
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let persist_path = index_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector index")?;
            match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable vector index {}: {e}",
                        persist_path.display()
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            store: RwLock::new(Store::from_entries(entries)),
            persist_path,
        })
    }

    /// Insert records, replacing any entry with the same id in `namespace`.
    pub fn upsert(&self, namespace: &str, records: Vec<IndexRecord>) -> Result<usize> {
        let count = records.len();
        let mut store = self.store.write();
        for record in records {
            store.insert(VectorEntry {
                namespace: namespace.to_string(),
                record,
            });
        }
        Ok(count)
    }

    /// Remove every entry in every namespace and persist the empty index.
    pub fn clear(&self) -> Result<()> {
        *self.store.write() = Store::default();
        self.flush()
    }

    /// Write entries to disk (atomic write via temp file + rename).
    pub fn flush(&self) -> Result<()> {
        // Searches keep running while the snapshot is serialized
        let data = {
            let store = self.store.read();
            serde_json::to_string(&store.entries)?
        };
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector index")?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace vector index")?;
        Ok(())
    }

    /// Search `namespace` by cosine similarity against a query embedding.
    pub fn search(
        &self,
        namespace: &str,
        query_embedding: &[f32],
        limit: usize,
        filter: &QueryFilter,
    ) -> Vec<IndexMatch> {
        let store = self.store.read();

        let mut scored: Vec<(f32, &VectorEntry)> = store
            .entries
            .iter()
            .filter(|e| e.namespace == namespace)
            .filter(|e| match &filter.domain {
                Some(domain) => &e.record.domain == domain,
                None => true,
            })
            .map(|e| (cosine_similarity(query_embedding, &e.record.values), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| IndexMatch {
                id: e.record.id.clone(),
                score,
                text: e.record.text.clone(),
                source: Some(e.record.source.clone()).filter(|s| !s.is_empty()),
                domain: Some(e.record.domain.clone()).filter(|d| !d.is_empty()),
                page: e.record.page,
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.store.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>, domain: &str, source: &str) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            values,
            text: format!("text of {id}"),
            source: source.to_string(),
            domain: domain.to_string(),
            page: Some(1),
            chunk_index: 0,
        }
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert(
                "",
                vec![
                    record("far", vec![0.0, 1.0], "droit", "a.pdf"),
                    record("near", vec![1.0, 0.1], "droit", "b.pdf"),
                    record("exact", vec![1.0, 0.0], "droit", "c.pdf"),
                ],
            )
            .unwrap();

        let hits = index.search("", &[1.0, 0.0], 2, &QueryFilter::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "exact");
        assert_eq!(hits[1].id, "near");
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].source.as_deref(), Some("c.pdf"));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert("legal", vec![record("l1", vec![1.0, 0.0], "droit", "a.pdf")])
            .unwrap();
        index
            .upsert("health", vec![record("h1", vec![1.0, 0.0], "sante", "b.pdf")])
            .unwrap();

        let hits = index.search("legal", &[1.0, 0.0], 10, &QueryFilter::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "l1");
        assert!(index
            .search("missing", &[1.0, 0.0], 10, &QueryFilter::default())
            .is_empty());
    }

    #[test]
    fn test_domain_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert(
                "",
                vec![
                    record("a", vec![1.0, 0.0], "droit", "a.pdf"),
                    record("b", vec![1.0, 0.0], "finance", "b.pdf"),
                ],
            )
            .unwrap();

        let filter = QueryFilter {
            domain: Some("finance".into()),
        };
        let hits = index.search("", &[1.0, 0.0], 10, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain.as_deref(), Some("finance"));
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert("", vec![record("x", vec![1.0, 0.0], "droit", "old.pdf")])
            .unwrap();
        index
            .upsert("", vec![record("x", vec![0.0, 1.0], "droit", "new.pdf")])
            .unwrap();

        assert_eq!(index.entry_count(), 1);
        let hits = index.search("", &[0.0, 1.0], 1, &QueryFilter::default());
        assert_eq!(hits[0].source.as_deref(), Some("new.pdf"));
    }

    #[test]
    fn test_empty_source_reported_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert("", vec![record("x", vec![1.0], "", "")])
            .unwrap();
        let hits = index.search("", &[1.0], 1, &QueryFilter::default());
        assert_eq!(hits[0].source, None);
        assert_eq!(hits[0].domain, None);
    }

    #[test]
    fn test_persists_and_clears() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let index = LocalIndex::open_or_create(tmp.path()).unwrap();
            index
                .upsert("", vec![record("x", vec![1.0, 0.0], "tech", "a.md")])
                .unwrap();
            index.flush().unwrap();
        }

        let reopened = LocalIndex::open_or_create(tmp.path()).unwrap();
        assert_eq!(reopened.entry_count(), 1);
        assert!(!tmp.path().join("vectors.json.tmp").exists());

        reopened.clear().unwrap();
        let reopened = LocalIndex::open_or_create(tmp.path()).unwrap();
        assert_eq!(reopened.entry_count(), 0);
    }

    #[test]
    fn test_upsert_stays_in_memory_until_flush() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        for batch in 0..3 {
            let records = (0..4)
                .map(|i| record(&format!("{batch}-{i}"), vec![1.0, i as f32], "tech", "a.md"))
                .collect();
            index.upsert("", records).unwrap();
        }
        assert_eq!(index.entry_count(), 12);
        assert!(!tmp.path().join("vectors.json").exists());

        index.flush().unwrap();
        let reopened = LocalIndex::open_or_create(tmp.path()).unwrap();
        assert_eq!(reopened.entry_count(), 12);
    }

    #[test]
    fn test_same_id_in_other_namespace_is_separate() {
        let tmp = tempfile::tempdir().unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        index
            .upsert("legal", vec![record("x", vec![1.0, 0.0], "droit", "a.pdf")])
            .unwrap();
        index
            .upsert("health", vec![record("x", vec![1.0, 0.0], "sante", "b.pdf")])
            .unwrap();
        index
            .upsert("legal", vec![record("x", vec![1.0, 0.0], "droit", "c.pdf")])
            .unwrap();

        assert_eq!(index.entry_count(), 2);
        let legal = index.search("legal", &[1.0, 0.0], 10, &QueryFilter::default());
        assert_eq!(legal[0].source.as_deref(), Some("c.pdf"));
        let health = index.search("health", &[1.0, 0.0], 10, &QueryFilter::default());
        assert_eq!(health[0].source.as_deref(), Some("b.pdf"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("vectors.json"), "{not json").unwrap();
        let index = LocalIndex::open_or_create(tmp.path()).unwrap();
        assert_eq!(index.entry_count(), 0);
    }
}
