//! JSON payloads stored next to every document and folder.

use serde::{Deserialize, Serialize};

use super::{RemoteError, RemoteResult};
use crate::models::{Entry, EntryKind};

/// Contents of a `<id>.metadata` blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub visible_name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub parent: String,
    /// Unix ms as a decimal string
    #[serde(default)]
    pub last_modified: String,
    #[serde(default)]
    pub last_opened_page: u32,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub modified: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, rename = "metadatamodified")]
    pub metadata_modified: bool,
}

impl DocumentMetadata {
    fn new(kind: EntryKind, visible_name: &str, parent: &str) -> Self {
        Self {
            visible_name: visible_name.to_string(),
            kind,
            parent: parent.to_string(),
            last_modified: chrono::Utc::now().timestamp_millis().to_string(),
            last_opened_page: 0,
            version: 0,
            pinned: false,
            synced: true,
            modified: false,
            deleted: false,
            metadata_modified: false,
        }
    }

    /// Metadata for a new top-level folder
    pub fn folder(visible_name: &str) -> Self {
        Self::new(EntryKind::Folder, visible_name, "")
    }

    /// Metadata for a new document inside `parent` (empty for the root)
    pub fn document(visible_name: &str, parent: &str) -> Self {
        Self::new(EntryKind::Document, visible_name, parent)
    }

    pub fn from_slice(bytes: &[u8]) -> RemoteResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| RemoteError::Malformed(format!("invalid document metadata: {err}")))
    }

    pub fn to_json(&self) -> RemoteResult<String> {
        serde_json::to_string(self)
            .map_err(|err| RemoteError::Malformed(format!("unserializable metadata: {err}")))
    }

    pub fn into_entry(self, id: &str, hash: &str) -> Entry {
        Entry {
            id: id.to_string(),
            hash: hash.to_string(),
            kind: self.kind,
            visible_name: self.visible_name,
            parent: self.parent,
            deleted: self.deleted,
        }
    }
}

/// Contents of a `<id>.content` blob for an uploaded PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    pub file_type: String,
    pub extra_metadata: serde_json::Map<String, serde_json::Value>,
    pub last_opened_page: u32,
    pub line_height: i32,
    pub margins: u32,
    pub page_count: u32,
    pub text_scale: f32,
    pub transform: serde_json::Map<String, serde_json::Value>,
}

impl DocumentContent {
    pub fn pdf() -> Self {
        Self {
            file_type: "pdf".to_string(),
            extra_metadata: serde_json::Map::new(),
            last_opened_page: 0,
            line_height: -1,
            margins: 180,
            page_count: 0,
            text_scale: 1.0,
            transform: serde_json::Map::new(),
        }
    }

    pub fn to_json(&self) -> RemoteResult<String> {
        serde_json::to_string(self)
            .map_err(|err| RemoteError::Malformed(format!("unserializable content: {err}")))
    }
}
