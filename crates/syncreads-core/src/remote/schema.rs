//! Content-addressed index format shared by every tree client.
//!
//! An index blob starts with the schema version line followed by one
//! `hash:type:id:subfiles:size` line per child. Every blob, index blobs
//! included, is addressed by the SHA-256 of its bytes, so two collections
//! with equal payloads but different ids never share an address.

use sha2::{Digest, Sha256};

use super::{RemoteError, RemoteResult};
use crate::models::{TreeEntry, TreeEntryKind};

/// Index schema version written as the first line of every index blob
pub const SCHEMA_VERSION: &str = "3";

/// SHA-256 hex digest of a blob
pub fn blob_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Build the file entry describing `bytes` stored under `name`
pub fn file_entry(name: &str, bytes: &[u8]) -> TreeEntry {
    TreeEntry {
        hash: blob_hash(bytes),
        kind: TreeEntryKind::File,
        id: name.to_string(),
        subfiles: 0,
        size: bytes.len() as u64,
    }
}

/// Hash of a collection made of `entries`: the hash of its index blob
pub fn collection_hash(entries: &[TreeEntry]) -> RemoteResult<String> {
    for entry in entries {
        if entry.hash.len() != 64 || hex::decode(&entry.hash).is_err() {
            return Err(RemoteError::Malformed(format!(
                "entry '{}' has a non-hex hash",
                entry.id
            )));
        }
    }
    Ok(blob_hash(&serialize_index(entries)))
}

/// Serialize entries into an index blob, ordered by id
pub fn serialize_index(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::from(SCHEMA_VERSION);
    out.push('\n');
    for entry in sorted {
        out.push_str(&format!(
            "{}:{}:{}:{}:{}\n",
            entry.hash,
            entry.kind.tag(),
            entry.id,
            entry.subfiles,
            entry.size
        ));
    }
    out.into_bytes()
}

/// Parse an index blob
pub fn parse_index(bytes: &[u8]) -> RemoteResult<Vec<TreeEntry>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| RemoteError::Malformed("index blob is not UTF-8".to_string()))?;
    let mut lines = text.lines();

    match lines.next().map(str::trim) {
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(RemoteError::Malformed(format!(
                "unsupported index schema version '{other}'"
            )))
        }
        None => return Err(RemoteError::Malformed("empty index blob".to_string())),
    }

    lines
        .filter(|line| !line.trim().is_empty())
        .map(parse_index_line)
        .collect()
}

fn parse_index_line(line: &str) -> RemoteResult<TreeEntry> {
    let malformed = || RemoteError::Malformed(format!("invalid index line '{line}'"));

    let parts: Vec<&str> = line.trim().split(':').collect();
    let [hash, tag, id, subfiles, size] = parts.as_slice() else {
        return Err(malformed());
    };

    Ok(TreeEntry {
        hash: (*hash).to_string(),
        kind: TreeEntryKind::from_tag(tag).ok_or_else(malformed)?,
        id: (*id).to_string(),
        subfiles: subfiles.parse().map_err(|_| malformed())?,
        size: size.parse().map_err(|_| malformed())?,
    })
}

/// Build the collection entry for `id` and its index blob
pub fn collection(id: &str, entries: &[TreeEntry]) -> RemoteResult<(TreeEntry, Vec<u8>)> {
    let hash = collection_hash(entries)?;
    let entry = TreeEntry {
        hash,
        kind: TreeEntryKind::Collection,
        id: id.to_string(),
        subfiles: u32::try_from(entries.len()).unwrap_or(u32::MAX),
        size: entries.iter().map(|entry| entry.size).sum(),
    };
    Ok((entry, serialize_index(entries)))
}
