//! Remote document tree models

use serde::{Deserialize, Serialize};

/// Parent value marking an entry as moved to the device trash
pub const TRASH: &str = "trash";

/// Kind of a document-tree node as reported by the device metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A readable document (PDF, EPUB, notebook)
    #[serde(rename = "DocumentType")]
    Document,
    /// A folder
    #[serde(rename = "CollectionType")]
    Folder,
}

/// Metadata view of a document or folder in the user's tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque document id
    pub id: String,
    /// Content hash of the entry's index blob
    pub hash: String,
    /// Document or folder
    pub kind: EntryKind,
    /// Name shown on the device
    pub visible_name: String,
    /// Containing folder id, empty for the root, or [`TRASH`]
    pub parent: String,
    /// Tombstone flag
    pub deleted: bool,
}

impl Entry {
    /// Whether the entry sits in the trash
    pub fn is_trashed(&self) -> bool {
        self.parent == TRASH
    }

    /// Whether the entry is a live folder with the given display name
    pub fn is_live_folder_named(&self, name: &str) -> bool {
        self.kind == EntryKind::Folder
            && !self.is_trashed()
            && !self.deleted
            && self.visible_name == name
    }
}

/// Kind of a line in a content-addressed index blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeEntryKind {
    /// A plain blob (metadata, content, pdf, ...)
    File,
    /// An index blob listing further entries
    Collection,
}

impl TreeEntryKind {
    /// Wire tag used in index lines
    pub const fn tag(self) -> &'static str {
        match self {
            Self::File => "0",
            Self::Collection => "80000000",
        }
    }

    /// Parse a wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "0" => Some(Self::File),
            "80000000" => Some(Self::Collection),
            _ => None,
        }
    }
}

/// One immutable node in the content-addressed tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    /// SHA-256 hex of the referenced blob
    pub hash: String,
    /// File or collection
    pub kind: TreeEntryKind,
    /// Document id for collections, file name for files
    pub id: String,
    /// Number of children for collections, zero for files
    pub subfiles: u32,
    /// Byte size (sum of children for collections)
    pub size: u64,
}

/// The per-user root pointer guarded by the generation counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPointer {
    /// Hash of the root index blob
    pub hash: String,
    /// Monotonic generation used for optimistic concurrency
    pub generation: u64,
}
