//! In-process tree backend with the same consistency rules as the cloud.

use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{schema, RemoteError, RemoteResult, RemoteTree};
use crate::models::RootPointer;

/// Write counters observed by tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub blob_writes: usize,
    pub root_writes: usize,
    pub sync_completions: usize,
}

#[derive(Debug)]
struct MemoryState {
    blobs: HashMap<String, Vec<u8>>,
    root: RootPointer,
    stats: MemoryStats,
    foreign_commits: usize,
}

/// A [`RemoteTree`] held entirely in memory
#[derive(Debug)]
pub struct MemoryTree {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryTree {
    /// An empty tree at generation 0
    pub fn new() -> Self {
        let empty = schema::serialize_index(&[]);
        let hash = schema::blob_hash(&empty);
        let mut blobs = HashMap::new();
        blobs.insert(hash.clone(), empty);

        Self {
            state: Mutex::new(MemoryState {
                blobs,
                root: RootPointer {
                    hash,
                    generation: 0,
                },
                stats: MemoryStats::default(),
                foreign_commits: 0,
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call, so concurrent callers interleave
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` root writes lose a race against another client
    pub async fn simulate_foreign_commits(&self, count: usize) {
        self.state.lock().await.foreign_commits = count;
    }

    pub async fn stats(&self) -> MemoryStats {
        self.state.lock().await.stats
    }

    pub async fn root(&self) -> RootPointer {
        self.state.lock().await.root.clone()
    }

    pub async fn blob_count(&self) -> usize {
        self.state.lock().await.blobs.len()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTree for MemoryTree {
    async fn get_root_hash(&self) -> RemoteResult<RootPointer> {
        self.pause().await;
        Ok(self.state.lock().await.root.clone())
    }

    async fn put_root_hash(&self, hash: &str, expected_generation: u64) -> RemoteResult<u64> {
        self.pause().await;
        let mut state = self.state.lock().await;

        if state.foreign_commits > 0 {
            state.foreign_commits -= 1;
            state.root.generation += 1;
        }
        if state.root.generation != expected_generation {
            return Err(RemoteError::Conflict {
                expected: expected_generation,
            });
        }
        if !state.blobs.contains_key(hash) {
            return Err(RemoteError::Status {
                status: 400,
                message: format!("root points at unknown blob {hash}"),
            });
        }

        state.root = RootPointer {
            hash: hash.to_string(),
            generation: expected_generation + 1,
        };
        state.stats.root_writes += 1;
        Ok(state.root.generation)
    }

    async fn get_blob(&self, hash: &str) -> RemoteResult<Vec<u8>> {
        self.pause().await;
        self.state
            .lock()
            .await
            .blobs
            .get(hash)
            .cloned()
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                message: format!("blob {hash} not found"),
            })
    }

    async fn put_blob(&self, hash: &str, filename: &str, bytes: Vec<u8>) -> RemoteResult<()> {
        self.pause().await;
        if schema::blob_hash(&bytes) != hash {
            return Err(RemoteError::Status {
                status: 400,
                message: format!("hash mismatch for {filename}"),
            });
        }

        let mut state = self.state.lock().await;
        match state.blobs.entry(hash.to_string()) {
            Slot::Occupied(stored) if *stored.get() != bytes => {
                return Err(RemoteError::Status {
                    status: 409,
                    message: format!("blob {hash} is already stored with other content"),
                });
            }
            Slot::Occupied(_) => {}
            Slot::Vacant(slot) => {
                slot.insert(bytes);
            }
        }
        state.stats.blob_writes += 1;
        Ok(())
    }

    async fn sync_complete(&self, generation: u64) -> RemoteResult<()> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if generation > state.root.generation {
            return Err(RemoteError::Status {
                status: 400,
                message: format!("generation {generation} was never committed"),
            });
        }
        state.stats.sync_completions += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn root_write_requires_matching_generation() {
        let tree = MemoryTree::new();
        let file = tree.put_text("a.content", "{}").await.unwrap();
        let root = tree.put_entries("", vec![file]).await.unwrap();

        let before = tree.root().await;
        assert!(matches!(
            tree.put_root_hash(&root.hash, 7).await,
            Err(RemoteError::Conflict { expected: 7 })
        ));
        assert_eq!(tree.root().await, before);

        assert_eq!(tree.put_root_hash(&root.hash, 0).await.unwrap(), 1);
        assert_eq!(tree.root().await.hash, root.hash);
        assert_eq!(tree.stats().await.root_writes, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_commit_bumps_generation() {
        let tree = MemoryTree::new();
        let root = tree.root().await;
        tree.simulate_foreign_commits(1).await;

        assert!(tree.put_root_hash(&root.hash, 0).await.is_err());
        assert_eq!(tree.put_root_hash(&root.hash, 1).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blobs_are_content_addressed() {
        let tree = MemoryTree::new();
        assert!(tree
            .put_blob("deadbeef", "x.pdf", b"bytes".to_vec())
            .await
            .is_err());

        let entry = tree.put_file("x.pdf", b"bytes".to_vec()).await.unwrap();
        assert_eq!(tree.get_blob(&entry.hash).await.unwrap(), b"bytes");
        assert!(tree.get_blob("missing").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn index_blobs_are_content_addressed_too() {
        let tree = MemoryTree::new();
        let file = tree.put_text("a.metadata", "{}").await.unwrap();
        let index = schema::serialize_index(&[file]);

        assert!(tree
            .put_blob(&schema::blob_hash(b"other"), "a.docSchema", index.clone())
            .await
            .is_err());
        tree.put_blob(&schema::blob_hash(&index), "a.docSchema", index.clone())
            .await
            .unwrap();
        // Re-uploading identical bytes is a no-op.
        tree.put_blob(&schema::blob_hash(&index), "a.docSchema", index)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_name_folders_both_stay_listed() {
        let tree = MemoryTree::new();
        let metadata = crate::remote::DocumentMetadata::folder("SyncReads")
            .to_json()
            .unwrap();

        let mut children = Vec::new();
        for id in ["a", "b"] {
            let file = tree
                .put_text(&format!("{id}.metadata"), &metadata)
                .await
                .unwrap();
            children.push(tree.put_entries(id, vec![file]).await.unwrap());
        }
        assert_ne!(children[0].hash, children[1].hash);

        let root = tree.put_entries("", children).await.unwrap();
        tree.put_root_hash(&root.hash, 0).await.unwrap();

        let mut ids: Vec<String> = tree
            .get_entries_metadata()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn root_must_reference_stored_blob() {
        let tree = MemoryTree::new();
        let result = tree.put_root_hash("ffff", 0).await;
        assert!(matches!(result, Err(RemoteError::Status { status: 400, .. })));
    }
}
