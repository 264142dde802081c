//! Client side of the device cloud's content-addressed document tree.
//!
//! [`RemoteTree`] exposes the five primitives every backend implements (root
//! pointer read/write, blob read/write, sync-complete notification) and
//! derives the higher level tree operations from them.

mod guard;
mod memory;
mod metadata;
mod remarkable;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Device, Entry, RootPointer, TreeEntry, TreeEntryKind};

pub use guard::GuardedTree;
pub use memory::{MemoryStats, MemoryTree};
pub use metadata::{DocumentContent, DocumentMetadata};
pub use remarkable::{
    RemarkableAuth, RemarkableClient, RemarkableConnector, DEFAULT_AUTH_URL, DEFAULT_SYNC_URL,
};

/// Errors raised by device cloud calls
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Device cloud request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Device cloud API error: {message} ({status})")]
    Status { status: u16, message: String },
    #[error("Device cloud rejected the credentials: {0}")]
    Auth(String),
    #[error("Malformed device cloud data: {0}")]
    Malformed(String),
    #[error("Root generation {expected} is stale, the tree was changed concurrently")]
    Conflict { expected: u64 },
    #[error("Device cloud call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Device cloud call cancelled")]
    Cancelled,
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Filename the device cloud expects for the index blob of `id`
fn index_filename(id: &str) -> String {
    if id.is_empty() {
        "root.docSchema".to_string()
    } else {
        format!("{id}.docSchema")
    }
}

/// A user's document tree on the device cloud
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// Read the current root pointer
    async fn get_root_hash(&self) -> RemoteResult<RootPointer>;

    /// Move the root pointer, succeeding only if the generation is still
    /// `expected_generation`; returns the new generation
    async fn put_root_hash(&self, hash: &str, expected_generation: u64) -> RemoteResult<u64>;

    /// Download a blob by hash
    async fn get_blob(&self, hash: &str) -> RemoteResult<Vec<u8>>;

    /// Upload a blob under its hash
    async fn put_blob(&self, hash: &str, filename: &str, bytes: Vec<u8>) -> RemoteResult<()>;

    /// Tell other clients a new generation is available
    async fn sync_complete(&self, generation: u64) -> RemoteResult<()>;

    /// Read the entries of the index blob `hash`
    ///
    /// An empty hash is an account that has never been written to.
    async fn get_entries(&self, hash: &str) -> RemoteResult<Vec<TreeEntry>> {
        if hash.is_empty() {
            return Ok(Vec::new());
        }
        let bytes = self.get_blob(hash).await?;
        schema::parse_index(&bytes)
    }

    /// Upload a file blob and return the entry referencing it
    async fn put_file(&self, name: &str, bytes: Vec<u8>) -> RemoteResult<TreeEntry> {
        let entry = schema::file_entry(name, &bytes);
        self.put_blob(&entry.hash, name, bytes).await?;
        Ok(entry)
    }

    /// Upload a text blob and return the entry referencing it
    async fn put_text(&self, name: &str, text: &str) -> RemoteResult<TreeEntry> {
        self.put_file(name, text.as_bytes().to_vec()).await
    }

    /// Upload the index blob for `entries` and return the collection entry
    /// for `id`; the root index uses an empty id
    async fn put_entries(&self, id: &str, entries: Vec<TreeEntry>) -> RemoteResult<TreeEntry> {
        let (entry, index) = schema::collection(id, &entries)?;
        self.put_blob(&entry.hash, &index_filename(id), index).await?;
        Ok(entry)
    }

    /// Read the metadata of every document and folder reachable from the root
    async fn get_entries_metadata(&self) -> RemoteResult<Vec<Entry>> {
        let root = self.get_root_hash().await?;
        let documents = self.get_entries(&root.hash).await?;

        let mut entries = Vec::with_capacity(documents.len());
        for document in documents
            .iter()
            .filter(|entry| entry.kind == TreeEntryKind::Collection)
        {
            let files = self.get_entries(&document.hash).await?;
            let metadata_name = format!("{}.metadata", document.id);
            let Some(metadata_file) = files.iter().find(|file| file.id == metadata_name) else {
                tracing::warn!(document = %document.id, "Skipping document without metadata");
                continue;
            };

            let bytes = self.get_blob(&metadata_file.hash).await?;
            let metadata = DocumentMetadata::from_slice(&bytes)?;
            entries.push(metadata.into_entry(&document.id, &document.hash));
        }

        Ok(entries)
    }
}

/// Opens an authenticated tree client for a linked device
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self, device: &Device) -> RemoteResult<Arc<dyn RemoteTree>>;
}

#[async_trait]
impl<T: DeviceConnector + ?Sized> DeviceConnector for Arc<T> {
    async fn connect(&self, device: &Device) -> RemoteResult<Arc<dyn RemoteTree>> {
        (**self).connect(device).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_index_has_fixed_filename() {
        assert_eq!(index_filename(""), "root.docSchema");
        assert_eq!(index_filename("abc"), "abc.docSchema");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_root_hash_has_no_entries() {
        let tree = MemoryTree::new();
        assert!(tree.get_entries("").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_metadata_walks_documents() {
        let tree = MemoryTree::new();
        let metadata = DocumentMetadata::folder("Articles");
        let meta_file = tree
            .put_text("f1.metadata", &metadata.to_json().unwrap())
            .await
            .unwrap();
        let content_file = tree.put_text("f1.content", "{}").await.unwrap();
        let folder = tree
            .put_entries("f1", vec![meta_file, content_file])
            .await
            .unwrap();
        let orphan_file = tree.put_text("o1.pdf", "%PDF").await.unwrap();
        let orphan = tree.put_entries("o1", vec![orphan_file]).await.unwrap();
        let root = tree.put_entries("", vec![folder.clone(), orphan]).await.unwrap();
        tree.put_root_hash(&root.hash, 0).await.unwrap();

        let entries = tree.get_entries_metadata().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "f1");
        assert_eq!(entries[0].hash, folder.hash);
        assert_eq!(entries[0].kind, EntryKind::Folder);
        assert_eq!(entries[0].visible_name, "Articles");
    }
}
