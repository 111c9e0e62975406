use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One indexed movie chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    name: String,
    records: Vec<VectorRecord>,
}

/// `1 - cosine similarity`; zero-length vectors are maximally distant
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 || a.len() != b.len() {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// File-backed vector collections, one JSON document per collection name
#[derive(Debug)]
pub struct VectorStore {
    root: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl VectorStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create vector store at {}", root.display()))?;
        Ok(Self {
            root,
            collections: RwLock::new(HashMap::new()),
        })
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    async fn load_collection(path: &Path, name: &str) -> Result<Collection> {
        if !path.exists() {
            return Ok(Collection {
                name: name.to_string(),
                records: Vec::new(),
            });
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read collection {}", path.display()))?;
        let collection = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse collection {}", path.display()))?;
        Ok(collection)
    }

    async fn ensure_loaded(&self, name: &str) -> Result<()> {
        if self.collections.read().await.contains_key(name) {
            return Ok(());
        }
        let collection = Self::load_collection(&self.collection_path(name), name).await?;
        debug!("Loaded collection {} ({} records)", name, collection.records.len());
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_insert(collection);
        Ok(())
    }

    async fn persist(&self, collection: &Collection) -> Result<()> {
        let path = self.collection_path(&collection.name);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serde_json::to_vec(collection)?).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    /// Insert or replace records by id
    pub async fn add(&self, name: &str, records: Vec<VectorRecord>) -> Result<()> {
        self.ensure_loaded(name).await?;
        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.to_string()).or_default();
        collection.name = name.to_string();

        let added = records.len();
        for record in records {
            match collection.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => collection.records.push(record),
            }
        }

        self.persist(collection).await?;
        info!("🗂️ Indexed {} records into {} ({} total)", added, name, collection.records.len());
        Ok(())
    }

    /// The `k` nearest records with their cosine distance, nearest first
    pub async fn query(&self, name: &str, embedding: &[f32], k: usize) -> Result<Vec<(VectorRecord, f64)>> {
        self.ensure_loaded(name).await?;
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(name) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(usize, f64)> = collection
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, cosine_distance(embedding, &r.embedding)))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| (collection.records[i].clone(), distance))
            .collect())
    }

    pub async fn count(&self, name: &str) -> Result<usize> {
        self.ensure_loaded(name).await?;
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }

    /// Remove a collection and its file. Missing collections are ignored.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        let path = self.collection_path(name);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete collection {}", path.display()))?;
            info!("🧹 Deleted collection {}", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: format!("text of {}", id),
            start_time: 0.0,
            end_time: 10.0,
            embedding,
        }
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_add_query_and_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = VectorStore::open(dir.path()).await.unwrap();
            store
                .add(
                    "movie_subtitles_p",
                    vec![record("a", vec![1.0, 0.0]), record("b", vec![0.7, 0.7]), record("c", vec![0.0, 1.0])],
                )
                .await
                .unwrap();
        }

        let store = VectorStore::open(dir.path()).await.unwrap();
        let hits = store.query("movie_subtitles_p", &[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|(r, _)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[tokio::test]
    async fn test_add_replaces_by_id_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        store.add("c", vec![record("a", vec![1.0])]).await.unwrap();
        store.add("c", vec![record("a", vec![2.0]), record("b", vec![1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 2);

        store.delete("c").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
        assert!(store.query("c", &[1.0], 3).await.unwrap().is_empty());
        store.delete("never-created").await.unwrap();
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        store.add("movie_subtitles_one", vec![record("a", vec![1.0])]).await.unwrap();
        assert_eq!(store.count("movie_subtitles_two").await.unwrap(), 0);
    }
}
