//! Exact nearest-neighbour vector index under squared Euclidean distance.
//!
//! Entries are stored as a single `Vec<IndexedDocument>` addressed by
//! insertion position, so text, payload, and vector can never drift apart.
//! Search is a brute-force scan over every stored vector.
//!
//! # Lifecycle
//!
//! A [`VectorIndex`] is mutable and only used while ingesting. Once
//! ingestion is done it is frozen into a [`ReadyIndex`], which only
//! supports reads and can be shared freely between request handlers.
//!
//! # Snapshot layout
//!
//! A persistent index lives in a directory holding two artifacts:
//!
//! | File | Content |
//! |------|---------|
//! | `index.bin` | `u32` dimension, `u64` count (little-endian), then `count × dimension` little-endian `f32`s |
//! | `documents.json` | `{"documents": [...], "metadatas": [...]}`, parallel to the vectors |
//!
//! Both must be present for a snapshot to be loaded. Every [`add`](VectorIndex::add)
//! rewrites both files. A snapshot that does not decode fails the load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{ChunkMetadata, IndexedDocument, SearchResult};

/// File name of the raw vector artifact.
pub const INDEX_FILE: &str = "index.bin";
/// File name of the documents/metadata artifact.
pub const DOCUMENTS_FILE: &str = "documents.json";

const HEADER_LEN: usize = 4 + 8;

/// Squared Euclidean distance between two vectors of equal length.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dimension and cardinality of a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub dimension: usize,
    pub count: usize,
}

#[derive(Serialize, Deserialize)]
struct DocumentsSnapshot {
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

/// Mutable flat L2 index used during ingestion.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexedDocument>,
    dir: Option<PathBuf>,
}

impl VectorIndex {
    /// Create an empty index that is never persisted.
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            dir: None,
        }
    }

    /// Open the index persisted in `dir`, or start empty if no complete
    /// snapshot is there.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexLoadCorrupt`] if an artifact does not decode or the
    ///   two artifacts disagree in length.
    /// - [`RagError::DimensionMismatch`] if the snapshot was built with a
    ///   different vector dimension.
    pub fn open(dir: impl Into<PathBuf>, dimension: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| RagError::io(&dir, e))?;

        let entries = match read_snapshot(&dir)? {
            Some((stored_dimension, entries)) => {
                if stored_dimension != dimension {
                    return Err(RagError::DimensionMismatch {
                        expected: dimension,
                        actual: stored_dimension,
                    });
                }
                tracing::info!(
                    path = %dir.display(),
                    count = entries.len(),
                    "loaded existing index"
                );
                entries
            }
            None => {
                tracing::info!(path = %dir.display(), "no index snapshot, starting empty");
                Vec::new()
            }
        };

        Ok(Self {
            dimension,
            entries,
            dir: Some(dir),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append texts with their vectors and metadata, then persist.
    ///
    /// Without `metadatas`, every text gets empty metadata. No deduplication
    /// is performed.
    ///
    /// # Errors
    ///
    /// Fails with [`RagError::LengthMismatch`] or [`RagError::DimensionMismatch`]
    /// before touching any state; fails with [`RagError::Io`] if the snapshot
    /// cannot be written.
    pub fn add(
        &mut self,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        metadatas: Option<Vec<ChunkMetadata>>,
    ) -> Result<()> {
        let metadatas = metadatas.unwrap_or_else(|| vec![ChunkMetadata::default(); texts.len()]);

        if texts.len() != vectors.len() || texts.len() != metadatas.len() {
            return Err(RagError::LengthMismatch {
                texts: texts.len(),
                vectors: vectors.len(),
                metadatas: metadatas.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        let added = texts.len();
        self.entries.extend(
            texts
                .into_iter()
                .zip(vectors)
                .zip(metadatas)
                .map(|((content, vector), metadata)| IndexedDocument {
                    content,
                    metadata,
                    vector,
                }),
        );

        if let Err(e) = self.save() {
            self.entries.truncate(self.entries.len() - added);
            return Err(e);
        }
        tracing::info!(added, total = self.entries.len(), "added documents to index");
        Ok(())
    }

    /// Return up to `k` entries closest to `query`, nearest first.
    ///
    /// An empty index yields an empty result. `k` is clamped to the index
    /// size. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            tracing::warn!("search on empty index");
            return Ok(Vec::new());
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, l2_distance(query, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k.min(self.entries.len()));

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                let entry = &self.entries[position];
                SearchResult {
                    content: entry.content.clone(),
                    metadata: entry.metadata.clone(),
                    distance,
                    position,
                }
            })
            .collect())
    }

    /// Write both snapshot artifacts. A no-op for in-memory indexes.
    pub fn save(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;

        let mut raw = Vec::with_capacity(HEADER_LEN + self.entries.len() * self.dimension * 4);
        raw.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        raw.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for entry in &self.entries {
            raw.extend_from_slice(&vec_to_blob(&entry.vector));
        }
        let index_path = dir.join(INDEX_FILE);
        fs::write(&index_path, raw).map_err(|e| RagError::io(&index_path, e))?;

        let docs = DocumentsSnapshot {
            documents: self.entries.iter().map(|e| e.content.clone()).collect(),
            metadatas: self.entries.iter().map(|e| e.metadata.clone()).collect(),
        };
        let docs_path = dir.join(DOCUMENTS_FILE);
        let json = serde_json::to_vec(&docs)
            .map_err(|e| RagError::io(&docs_path, std::io::Error::other(e)))?;
        fs::write(&docs_path, json).map_err(|e| RagError::io(&docs_path, e))?;

        tracing::debug!(path = %dir.display(), count = self.entries.len(), "index saved");
        Ok(())
    }

    /// Freeze the index for the serving phase.
    pub fn into_ready(self) -> ReadyIndex {
        ReadyIndex { inner: self }
    }
}

/// Read-only index handed to the serving phase.
#[derive(Debug)]
pub struct ReadyIndex {
    inner: VectorIndex,
}

impl ReadyIndex {
    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// See [`VectorIndex::search`].
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.inner.search(query, k)
    }
}

/// Report dimension and count of the snapshot in `dir` without an embedder.
///
/// Returns `Ok(None)` when no complete snapshot exists.
pub fn inspect(dir: &Path) -> Result<Option<SnapshotInfo>> {
    Ok(read_snapshot(dir)?.map(|(dimension, entries)| SnapshotInfo {
        dimension,
        count: entries.len(),
    }))
}

/// Delete both snapshot artifacts, if present.
pub fn remove_snapshot(dir: &Path) -> Result<()> {
    for name in [INDEX_FILE, DOCUMENTS_FILE] {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RagError::io(&path, e)),
        }
    }
    Ok(())
}

fn read_snapshot(dir: &Path) -> Result<Option<(usize, Vec<IndexedDocument>)>> {
    let index_path = dir.join(INDEX_FILE);
    let docs_path = dir.join(DOCUMENTS_FILE);
    if !index_path.exists() || !docs_path.exists() {
        return Ok(None);
    }

    let raw = fs::read(&index_path).map_err(|e| RagError::io(&index_path, e))?;
    let (dimension, vectors) = decode_vectors(&raw).map_err(|reason| RagError::IndexLoadCorrupt {
        path: index_path.clone(),
        reason,
    })?;

    let docs_raw = fs::read(&docs_path).map_err(|e| RagError::io(&docs_path, e))?;
    let docs: DocumentsSnapshot =
        serde_json::from_slice(&docs_raw).map_err(|e| RagError::IndexLoadCorrupt {
            path: docs_path.clone(),
            reason: e.to_string(),
        })?;

    if docs.documents.len() != vectors.len() || docs.metadatas.len() != vectors.len() {
        return Err(RagError::IndexLoadCorrupt {
            path: dir.to_path_buf(),
            reason: format!(
                "{} vectors, {} documents, {} metadata entries",
                vectors.len(),
                docs.documents.len(),
                docs.metadatas.len()
            ),
        });
    }

    let entries = vectors
        .into_iter()
        .zip(docs.documents)
        .zip(docs.metadatas)
        .map(|((vector, content), metadata)| IndexedDocument {
            content,
            metadata,
            vector,
        })
        .collect();

    Ok(Some((dimension, entries)))
}

fn decode_vectors(raw: &[u8]) -> std::result::Result<(usize, Vec<Vec<f32>>), String> {
    if raw.len() < HEADER_LEN {
        return Err(format!("truncated header ({} bytes)", raw.len()));
    }
    let dimension = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    if dimension == 0 {
        return Err("zero vector dimension".to_string());
    }
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&raw[4..HEADER_LEN]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    let body = &raw[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "vector count overflows".to_string())?;
    if body.len() != expected {
        return Err(format!(
            "expected {} bytes of vectors for {} × {}, found {}",
            expected,
            count,
            dimension,
            body.len()
        ));
    }
    let vectors = body
        .chunks_exact(dimension * 4)
        .map(blob_to_vec)
        .collect();
    Ok((dimension, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(section: &str, id: usize) -> ChunkMetadata {
        ChunkMetadata {
            source: "doc.md".to_string(),
            section: section.to_string(),
            chunk_id: Some(id),
        }
    }

    fn sample() -> (Vec<String>, Vec<Vec<f32>>, Vec<ChunkMetadata>) {
        (
            vec!["origin".into(), "east".into(), "far".into()],
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![10.0, 10.0]],
            vec![meta("A", 0), meta("B", 1), meta("C", 2)],
        )
    }

    #[test]
    fn test_l2_distance_is_squared() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(l2_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::in_memory(2);
        assert!(index.search(&[1.0, 1.0], 4).unwrap().is_empty());
        // Even a wrongly sized query is fine when there is nothing to compare.
        assert!(index.search(&[1.0], 4).unwrap().is_empty());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = VectorIndex::in_memory(2);
        let (t, v, m) = sample();
        index.add(t, v, Some(m)).unwrap();

        let results = index.search(&[0.9, 0.1], 3).unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["east", "origin", "far"]);
        assert_eq!(results[0].position, 1);
        assert_eq!(results[0].metadata.section, "B");
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_search_clamps_k() {
        let mut index = VectorIndex::in_memory(2);
        index
            .add(
                vec!["a".into(), "b".into()],
                vec![vec![0.0, 1.0], vec![1.0, 0.0]],
                None,
            )
            .unwrap();
        assert_eq!(index.search(&[0.0, 0.0], 5).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0, 0.0], 1).unwrap().len(), 1);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::in_memory(1);
        index
            .add(
                vec!["left".into(), "right".into()],
                vec![vec![-1.0], vec![1.0]],
                None,
            )
            .unwrap();
        let results = index.search(&[0.0], 2).unwrap();
        assert_eq!(results[0].position, 0);
        assert_eq!(results[1].position, 1);
    }

    #[test]
    fn test_add_synthesizes_empty_metadata() {
        let mut index = VectorIndex::in_memory(1);
        index.add(vec!["x".into()], vec![vec![0.5]], None).unwrap();
        let hit = &index.search(&[0.5], 1).unwrap()[0];
        assert_eq!(hit.metadata, ChunkMetadata::default());
    }

    #[test]
    fn test_add_rejects_length_mismatch() {
        let mut index = VectorIndex::in_memory(1);
        let err = index
            .add(vec!["x".into(), "y".into()], vec![vec![0.5]], None)
            .unwrap_err();
        assert!(matches!(err, RagError::LengthMismatch { .. }));

        let err = index
            .add(vec!["x".into()], vec![vec![0.5]], Some(vec![]))
            .unwrap_err();
        assert!(matches!(err, RagError::LengthMismatch { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = VectorIndex::in_memory(3);
        let err = index
            .add(vec!["x".into()], vec![vec![0.5, 0.5]], None)
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_query_dimension_checked() {
        let mut index = VectorIndex::in_memory(2);
        index.add(vec!["x".into()], vec![vec![0.0, 0.0]], None).unwrap();
        assert!(index.search(&[0.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_persist_and_reload() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        {
            let mut index = VectorIndex::open(&dir, 2).unwrap();
            assert!(index.is_empty());
            let (t, v, m) = sample();
            index.add(t, v, Some(m)).unwrap();
            index
                .add(vec!["late".into()], vec![vec![5.0, 5.0]], None)
                .unwrap();
        }
        assert!(dir.join(INDEX_FILE).exists());
        assert!(dir.join(DOCUMENTS_FILE).exists());

        let reopened = VectorIndex::open(&dir, 2).unwrap();
        assert_eq!(reopened.len(), 4);
        let hits = reopened.search(&[10.0, 10.0], 4).unwrap();
        assert_eq!(hits[0].content, "far");
        assert_eq!(hits[0].metadata, meta("C", 2));
        assert_eq!(hits[0].position, 2);
        let late = hits.iter().find(|h| h.content == "late").unwrap();
        assert_eq!(late.position, 3);
        assert_eq!(late.metadata, ChunkMetadata::default());

        assert_eq!(
            inspect(&dir).unwrap(),
            Some(SnapshotInfo {
                dimension: 2,
                count: 4
            })
        );
    }

    #[test]
    fn test_single_artifact_is_not_a_snapshot() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(INDEX_FILE), b"garbage").unwrap();
        let index = VectorIndex::open(tmp.path(), 2).unwrap();
        assert!(index.is_empty());
        assert_eq!(inspect(tmp.path()).unwrap(), None);
    }

    #[test]
    fn test_corrupt_vectors_fail_load() {
        let tmp = TempDir::new().unwrap();
        {
            let mut index = VectorIndex::open(tmp.path(), 2).unwrap();
            let (t, v, m) = sample();
            index.add(t, v, Some(m)).unwrap();
        }
        let path = tmp.path().join(INDEX_FILE);
        let mut raw = std::fs::read(&path).unwrap();
        raw.truncate(raw.len() - 3);
        std::fs::write(&path, raw).unwrap();

        let err = VectorIndex::open(tmp.path(), 2).unwrap_err();
        assert!(matches!(err, RagError::IndexLoadCorrupt { .. }));
    }

    #[test]
    fn test_zero_dimension_header_fails_load() {
        let tmp = TempDir::new().unwrap();
        let mut raw = Vec::new();
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&(u64::MAX / 2).to_le_bytes());
        std::fs::write(tmp.path().join(INDEX_FILE), raw).unwrap();
        std::fs::write(
            tmp.path().join(DOCUMENTS_FILE),
            br#"{"documents": [], "metadatas": []}"#,
        )
        .unwrap();

        let err = VectorIndex::open(tmp.path(), 384).unwrap_err();
        assert!(matches!(err, RagError::IndexLoadCorrupt { .. }));
        assert!(inspect(tmp.path()).is_err());
    }

    #[test]
    fn test_failed_save_leaves_entries_unchanged() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let mut index = VectorIndex::open(&dir, 2).unwrap();
        index
            .add(vec!["first".into()], vec![vec![0.0, 0.0]], None)
            .unwrap();

        // Replace the snapshot directory with a plain file so the write fails.
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        let (t, v, m) = sample();
        let err = index.add(t, v, Some(m)).unwrap_err();
        assert!(matches!(err, RagError::Io { .. }));
        assert_eq!(index.len(), 1);
        let hits = index.search(&[10.0, 10.0], 4).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "first");
    }

    #[test]
    fn test_corrupt_documents_fail_load() {
        let tmp = TempDir::new().unwrap();
        {
            let mut index = VectorIndex::open(tmp.path(), 2).unwrap();
            let (t, v, m) = sample();
            index.add(t, v, Some(m)).unwrap();
        }
        std::fs::write(tmp.path().join(DOCUMENTS_FILE), b"{not json").unwrap();
        let err = VectorIndex::open(tmp.path(), 2).unwrap_err();
        assert!(matches!(err, RagError::IndexLoadCorrupt { .. }));
    }

    #[test]
    fn test_desynced_artifacts_fail_load() {
        let tmp = TempDir::new().unwrap();
        {
            let mut index = VectorIndex::open(tmp.path(), 2).unwrap();
            let (t, v, m) = sample();
            index.add(t, v, Some(m)).unwrap();
        }
        std::fs::write(
            tmp.path().join(DOCUMENTS_FILE),
            br#"{"documents": ["one"], "metadatas": [{}]}"#,
        )
        .unwrap();
        let err = VectorIndex::open(tmp.path(), 2).unwrap_err();
        assert!(matches!(err, RagError::IndexLoadCorrupt { .. }));
    }

    #[test]
    fn test_dimension_mismatch_on_open() {
        let tmp = TempDir::new().unwrap();
        {
            let mut index = VectorIndex::open(tmp.path(), 2).unwrap();
            index.add(vec!["x".into()], vec![vec![1.0, 2.0]], None).unwrap();
        }
        let err = VectorIndex::open(tmp.path(), 384).unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 384,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_remove_snapshot() {
        let tmp = TempDir::new().unwrap();
        {
            let mut index = VectorIndex::open(tmp.path(), 1).unwrap();
            index.add(vec!["x".into()], vec![vec![1.0]], None).unwrap();
        }
        remove_snapshot(tmp.path()).unwrap();
        assert_eq!(inspect(tmp.path()).unwrap(), None);
        // Removing twice is fine.
        remove_snapshot(tmp.path()).unwrap();
    }

    #[test]
    fn test_ready_index_reads() {
        let mut index = VectorIndex::in_memory(2);
        let (t, v, m) = sample();
        index.add(t, v, Some(m)).unwrap();
        let ready = index.into_ready();
        assert_eq!(ready.len(), 3);
        assert_eq!(ready.dimension(), 2);
        assert_eq!(ready.search(&[0.0, 0.0], 1).unwrap()[0].content, "origin");
    }
}
