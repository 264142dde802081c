//! Folder and document writes against a reMarkable document tree.

use std::sync::Arc;

use uuid::Uuid;

use super::UserLocks;
use crate::models::{Entry, EntryKind, TreeEntry, UserId};
use crate::remote::{DocumentContent, DocumentMetadata, RemoteError, RemoteResult, RemoteTree};

/// How many times a root commit is retried after losing a generation race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub max_attempts: u32,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// A PDF to place on the device
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub user_id: &'a UserId,
    /// Parent folder id; `None` uploads to the root
    pub folder: Option<&'a str>,
    pub title: &'a str,
    pub pdf: Vec<u8>,
}

/// Writes folders and documents into one user's tree
pub struct RemarkableStrategy {
    tree: Arc<dyn RemoteTree>,
    locks: UserLocks,
    policy: CommitPolicy,
}

impl RemarkableStrategy {
    pub fn new(tree: Arc<dyn RemoteTree>, locks: UserLocks, policy: CommitPolicy) -> Self {
        Self {
            tree,
            locks,
            policy,
        }
    }

    /// Every document and folder in the tree
    pub async fn list_entries(&self) -> RemoteResult<Vec<Entry>> {
        self.tree.get_entries_metadata().await
    }

    /// Find the live top-level folder named `name`, creating it if absent
    ///
    /// Lookup and creation run under the user's lock, so concurrent callers
    /// for the same user end up with a single folder.
    pub async fn upsert_folder(&self, user_id: &UserId, name: &str) -> RemoteResult<Entry> {
        let _guard = self.locks.acquire(user_id).await;

        let existing = self
            .list_entries()
            .await?
            .into_iter()
            .find(|entry| entry.is_live_folder_named(name));
        if let Some(folder) = existing {
            tracing::debug!(folder = %folder.id, "Reusing existing folder \"{name}\"");
            return Ok(folder);
        }

        self.create_folder(name).await
    }

    /// Upload a PDF document, optionally inside a folder
    pub async fn upload(&self, request: UploadRequest<'_>) -> RemoteResult<Entry> {
        let _guard = self.locks.acquire(request.user_id).await;

        let id = Uuid::new_v4().to_string();
        let parent = request.folder.unwrap_or_default();
        let metadata = DocumentMetadata::document(request.title, parent);
        let metadata_json = metadata.to_json()?;
        let content_json = DocumentContent::pdf().to_json()?;

        let metadata_name = format!("{id}.metadata");
        let content_name = format!("{id}.content");
        let pagedata_name = format!("{id}.pagedata");
        let pdf_name = format!("{id}.pdf");
        let files = tokio::try_join!(
            self.tree.put_text(&metadata_name, &metadata_json),
            self.tree.put_text(&content_name, &content_json),
            self.tree.put_text(&pagedata_name, ""),
            self.tree.put_file(&pdf_name, request.pdf),
        )?;

        let document = self
            .tree
            .put_entries(&id, vec![files.0, files.1, files.2, files.3])
            .await?;
        self.commit(&document).await?;

        tracing::info!(document = %id, "Uploaded \"{}\"", request.title);
        Ok(metadata.into_entry(&id, &document.hash))
    }

    /// Link an uploaded collection into the root and publish the new root
    ///
    /// Callers must hold the user's lock.
    async fn commit(&self, entry: &TreeEntry) -> RemoteResult<u64> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let root = self.tree.get_root_hash().await?;
            let mut entries = self.tree.get_entries(&root.hash).await?;
            entries.retain(|existing| existing.id != entry.id);
            entries.push(entry.clone());

            let new_root = self.tree.put_entries("", entries).await?;
            match self.tree.put_root_hash(&new_root.hash, root.generation).await {
                Ok(generation) => {
                    self.tree.sync_complete(generation).await?;
                    return Ok(generation);
                }
                Err(RemoteError::Conflict { expected }) if attempt < self.policy.max_attempts => {
                    tracing::warn!(
                        attempt,
                        expected,
                        "Root generation moved while committing {}, retrying",
                        entry.id
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<Entry> {
        let id = Uuid::new_v4().to_string();
        let metadata = DocumentMetadata::folder(name);
        let metadata_json = metadata.to_json()?;

        let metadata_name = format!("{id}.metadata");
        let content_name = format!("{id}.content");
        let (metadata_file, content_file) = tokio::try_join!(
            self.tree.put_text(&metadata_name, &metadata_json),
            self.tree.put_text(&content_name, "{}"),
        )?;

        let folder = self
            .tree
            .put_entries(&id, vec![metadata_file, content_file])
            .await?;
        self.commit(&folder).await?;

        tracing::info!(folder = %id, "Created folder \"{name}\"");
        Ok(metadata.into_entry(&id, &folder.hash))
    }
}
