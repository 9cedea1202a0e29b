//! Integration tests for the workspace vector store

use async_trait::async_trait;
use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{ChunkId, ChunkInput, ChunkMetadata};
use ragnest_llm::{Embedder, HashEmbedder};
use ragnest_store::{StoreConfig, WorkspaceStore, WorkspaceVectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIMS: usize = 256;

fn store_at(dir: &TempDir) -> WorkspaceVectorStore {
    store_with(dir, 16)
}

fn store_with(dir: &TempDir, max_mounted: usize) -> WorkspaceVectorStore {
    let embedder = Arc::new(HashEmbedder::new(DIMS).unwrap());
    let config = StoreConfig::new(dir.path(), DIMS).with_max_mounted(max_mounted);
    WorkspaceVectorStore::new(config, embedder).unwrap()
}

/// Hash embedder that pauses before embedding any text starting with "slow"
struct SlowEmbedder {
    inner: HashEmbedder,
    delay: Duration,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.starts_with("slow")) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.embed(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

fn slow_store(dir: &TempDir, max_mounted: usize, delay: Duration) -> WorkspaceVectorStore {
    let embedder = Arc::new(SlowEmbedder {
        inner: HashEmbedder::new(DIMS).unwrap(),
        delay,
    });
    let config = StoreConfig::new(dir.path(), DIMS).with_max_mounted(max_mounted);
    WorkspaceVectorStore::new(config, embedder).unwrap()
}

async fn contents(store: &WorkspaceVectorStore, workspace_id: &str) -> HashSet<String> {
    store
        .search(workspace_id, "anything", 100, 0.0)
        .await
        .unwrap()
        .into_results()
        .into_iter()
        .map(|r| r.chunk.content)
        .collect()
}

fn chunk(text: &str, doc: &str, index: usize) -> ChunkInput {
    ChunkInput::new(text, ChunkMetadata::new(doc, index))
}

#[tokio::test]
async fn test_add_then_search_single_chunk() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);

    let ids = store.add("w1", vec![chunk("The sky is blue.", "sky.txt", 0)]).await.unwrap();
    assert_eq!(ids, vec![ChunkId(0)]);

    let results = store.search("w1", "sky color", 5, 0.0).await.unwrap().into_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[0].chunk.content, "The sky is blue.");
    assert!(results[0].score > 0.0 && results[0].score <= 1.0);
}

#[tokio::test]
async fn test_top_k_limits_and_orders_results() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);

    store
        .add(
            "w1",
            vec![
                chunk("Rust ownership rules prevent data races", "rust.md", 0),
                chunk("Borrowing lets functions use data without ownership", "rust.md", 1),
                chunk("Bread needs flour, water, salt and yeast", "bread.md", 0),
            ],
        )
        .await
        .unwrap();

    let results = store.search("w1", "rust ownership", 2, 0.0).await.unwrap().into_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
    assert!(results[0].score >= results[1].score);
    assert_eq!(results[0].chunk.metadata.document_id, "rust.md");
}

#[tokio::test]
async fn test_high_threshold_is_empty_not_error() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.add("w1", vec![chunk("The sky is blue.", "sky.txt", 0)]).await.unwrap();

    let outcome = store.search("w1", "sky color", 5, 0.99).await.unwrap();
    assert!(outcome.is_empty());
}

#[tokio::test]
async fn test_size_invariant_after_every_add() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);

    let mut expected = 0;
    for batch in 1..=4 {
        let chunks = (0..batch)
            .map(|i| chunk(&format!("batch {} item {}", batch, i), "doc", i))
            .collect();
        let ids = store.add("w1", chunks).await.unwrap();
        assert_eq!(ids.first(), Some(&ChunkId(expected as u64)));
        expected += batch;

        let stats = store.stats("w1").await.unwrap();
        assert_eq!(stats.vector_count, expected);
        assert_eq!(stats.live_chunks + stats.tombstoned, stats.vector_count);
    }
}

#[tokio::test]
async fn test_round_trip_across_unmount() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .add("w1", vec![chunk("alpha", "a", 0), chunk("beta", "b", 0)])
        .await
        .unwrap();
    let before = store.search("w1", "beta", 2, 0.0).await.unwrap();

    store.unmount("w1").await.unwrap();
    assert!(!store.is_mounted("w1").await);

    let after = store.search("w1", "beta", 2, 0.0).await.unwrap();
    assert!(store.is_mounted("w1").await);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.into_results().iter().zip(after.into_results().iter()) {
        assert_eq!(b.rank, a.rank);
        assert_eq!(b.chunk, a.chunk);
        assert!((b.score - a.score).abs() < 1e-5);
    }

    // A fresh process sees the same data
    let reopened = store_at(&dir);
    assert_eq!(reopened.stats("w1").await.unwrap().vector_count, 2);
}

#[tokio::test]
async fn test_mount_is_idempotent_and_does_not_reread() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.add("w1", vec![chunk("persisted text", "doc", 0)]).await.unwrap();

    std::fs::write(dir.path().join("w1").join("index.json"), b"{ not json").unwrap();

    store.mount("w1").await.unwrap();
    assert_eq!(store.mounted().await, vec!["w1".to_string()]);
    assert_eq!(store.stats("w1").await.unwrap().vector_count, 1);

    // A second process has to read the corrupt file
    let err = store_at(&dir).mount("w1").await.unwrap_err();
    assert!(matches!(err, RagError::WorkspaceLoad { .. }));
}

#[tokio::test]
async fn test_half_present_pair_fails_mount() {
    let dir = TempDir::new().unwrap();
    store_at(&dir).add("w1", vec![chunk("text", "doc", 0)]).await.unwrap();
    std::fs::remove_file(dir.path().join("w1").join("metadata.json")).unwrap();

    let err = store_at(&dir).mount("w1").await.unwrap_err();
    assert!(matches!(err, RagError::WorkspaceLoad { .. }));
}

#[tokio::test]
async fn test_mismatched_pair_fails_mount() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.add("w1", vec![chunk("one", "doc", 0)]).await.unwrap();
    let old_metadata = std::fs::read(dir.path().join("w1").join("metadata.json")).unwrap();
    store.add("w1", vec![chunk("two", "doc", 1)]).await.unwrap();

    // Simulate a crash between the index and metadata renames
    std::fs::write(dir.path().join("w1").join("metadata.json"), old_metadata).unwrap();

    let err = store_at(&dir).mount("w1").await.unwrap_err();
    assert!(err.to_string().contains("1 records"));
}

#[tokio::test]
async fn test_failed_persist_rolls_back_add() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store.mount("w1").await.unwrap();

    // A plain file where the workspace directory should go
    std::fs::write(dir.path().join("w1"), b"blocker").unwrap();

    let err = store.add("w1", vec![chunk("text", "doc", 0)]).await.unwrap_err();
    assert!(matches!(err, RagError::Persistence { .. }));
    let stats = store.stats("w1").await.unwrap();
    assert_eq!(stats.vector_count, 0);
    assert_eq!(stats.live_chunks, 0);
}

#[tokio::test]
async fn test_delete_and_compact() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .add(
            "w1",
            vec![
                chunk("apples are red", "fruit", 0),
                chunk("bananas are yellow", "fruit", 1),
                chunk("limes are green", "fruit", 2),
            ],
        )
        .await
        .unwrap();

    assert!(store.delete("w1", ChunkId(1)).await.unwrap());
    assert!(!store.delete("w1", ChunkId(1)).await.unwrap());
    assert!(matches!(
        store.delete("w1", ChunkId(9)).await.unwrap_err(),
        RagError::Validation { .. }
    ));

    let results = store.search("w1", "bananas are yellow", 3, 0.0).await.unwrap().into_results();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.chunk.id != ChunkId(1)));

    // Tombstones survive a restart
    let reopened = store_at(&dir);
    let stats = reopened.stats("w1").await.unwrap();
    assert_eq!((stats.vector_count, stats.tombstoned), (3, 1));

    assert_eq!(reopened.compact("w1").await.unwrap(), 1);
    let stats = reopened.stats("w1").await.unwrap();
    assert_eq!((stats.vector_count, stats.live_chunks, stats.tombstoned), (2, 2, 0));

    let results = reopened.search("w1", "limes are green", 1, 0.0).await.unwrap().into_results();
    assert_eq!(results[0].chunk.id, ChunkId(1));
    assert_eq!(results[0].chunk.content, "limes are green");
}

#[tokio::test]
async fn test_capacity_evicts_least_recently_mounted() {
    let dir = TempDir::new().unwrap();
    let store = store_with(&dir, 2);

    store.add("a", vec![chunk("alpha data", "a", 0)]).await.unwrap();
    store.mount("b").await.unwrap();
    store.mount("c").await.unwrap();
    assert_eq!(store.mounted().await, vec!["b".to_string(), "c".to_string()]);

    // Evicted workspaces come back from disk
    let results = store.search("a", "alpha", 1, 0.0).await.unwrap().into_results();
    assert_eq!(results[0].chunk.content, "alpha data");
    assert_eq!(store.mounted().await, vec!["c".to_string(), "a".to_string()]);
}

#[tokio::test]
async fn test_workspaces_are_independent() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_at(&dir));

    let mut handles = Vec::new();
    for ws in ["w1", "w2"] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                store
                    .add(ws, vec![chunk(&format!("{} chunk {}", ws, i), ws, i)])
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for ws in ["w1", "w2"] {
        let stats = store.stats(ws).await.unwrap();
        assert_eq!(stats.vector_count, 10);
        assert_eq!(stats.document_count, 1);
    }
    let results = store.search("w1", "w2 chunk", 10, 0.0).await.unwrap().into_results();
    assert!(results.iter().all(|r| r.chunk.metadata.document_id == "w1"));
}

#[tokio::test]
async fn test_add_spanning_eviction_and_remount_keeps_every_chunk() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(slow_store(&dir, 1, Duration::from_millis(200)));
    store.add("w1", vec![chunk("alpha", "a", 0)]).await.unwrap();

    let slow = {
        let store = store.clone();
        tokio::spawn(async move { store.add("w1", vec![chunk("slow bravo", "b", 0)]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // w1 is persisted and dropped, then loaded again while the slow add is embedding
    store.mount("w2").await.unwrap();
    store.mount("w1").await.unwrap();
    let next = store.add("w1", vec![chunk("charlie", "c", 0)]).await.unwrap();
    let slow = slow.await.unwrap().unwrap();

    assert_eq!(next, vec![ChunkId(1)]);
    assert_eq!(slow, vec![ChunkId(2)]);

    store.unmount_all().await.unwrap();
    let reopened = store_at(&dir);
    assert_eq!(reopened.stats("w1").await.unwrap().live_chunks, 3);
    let expected: HashSet<String> =
        ["alpha", "slow bravo", "charlie"].iter().map(|s| s.to_string()).collect();
    assert_eq!(contents(&reopened, "w1").await, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_under_constant_eviction() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_with(&dir, 1));

    let mut tasks = Vec::new();
    for ws in ["w1", "w2"] {
        for writer in 0..2 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..10 {
                    let text = format!("{} writer {} chunk {}", ws, writer, i);
                    ids.extend(store.add(ws, vec![chunk(&text, ws, i)]).await.unwrap());
                }
                (ws, ids)
            }));
        }
    }

    let mut ids_by_workspace: Vec<(&str, Vec<ChunkId>)> = Vec::new();
    for task in tasks {
        ids_by_workspace.push(task.await.unwrap());
    }

    store.unmount_all().await.unwrap();
    let reopened = store_at(&dir);
    for ws in ["w1", "w2"] {
        let mut ids: Vec<ChunkId> = ids_by_workspace
            .iter()
            .filter(|(w, _)| *w == ws)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        ids.sort();
        assert_eq!(ids, (0..20).map(ChunkId).collect::<Vec<_>>());
        assert_eq!(reopened.stats(ws).await.unwrap().live_chunks, 20);
        assert_eq!(contents(&reopened, ws).await.len(), 20);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loading_one_workspace_does_not_block_another() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(store_at(&dir));

    let big: Vec<ChunkInput> = (0..3000)
        .map(|i| chunk(&format!("bulk record number {} of the archive", i), "bulk", i))
        .collect();
    store.add("big", big).await.unwrap();
    store.unmount("big").await.unwrap();
    store.add("hot", vec![chunk("small and mounted", "hot", 0)]).await.unwrap();

    let loading = {
        let store = store.clone();
        tokio::spawn(async move { store.mount("big").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    let stats = store.stats("hot").await.unwrap();
    assert_eq!(stats.live_chunks, 1);
    assert!(!loading.is_finished(), "stats on a mounted workspace waited for another load");

    loading.await.unwrap().unwrap();
    assert_eq!(store.stats("big").await.unwrap().live_chunks, 3000);
}

#[tokio::test]
async fn test_invalid_workspace_id_and_arguments() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);

    assert!(matches!(store.mount("../etc").await.unwrap_err(), RagError::Validation { .. }));
    assert!(store.search("w1", "q", 0, 0.5).await.is_err());
    assert!(store.search("w1", "q", 3, 1.5).await.is_err());
    assert!(store.add("w1", vec![chunk("  ", "doc", 0)]).await.is_err());
    assert!(store.add("w1", Vec::new()).await.unwrap().is_empty());
}

#[test]
fn test_dimension_mismatch_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(HashEmbedder::new(64).unwrap());
    assert!(WorkspaceVectorStore::new(StoreConfig::new(dir.path(), 128), embedder).is_err());
}
