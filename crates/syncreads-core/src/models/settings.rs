//! Per-user sync preferences

use serde::{Deserialize, Serialize};

/// Longest folder name accepted for a sync
pub const MAX_FOLDER_NAME_LEN: usize = 255;

/// Sync preferences, stored per user or sent with a single request
///
/// Request values win over the user's stored defaults, which win over the
/// server's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Device folder articles are placed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl SyncSettings {
    #[must_use]
    pub fn with_folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
        }
    }

    /// The folder name with surrounding whitespace removed, if any is set
    #[must_use]
    pub fn folder_name(&self) -> Option<&str> {
        self.folder
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Fill unset values from `defaults`
    #[must_use]
    pub fn or(&self, defaults: &Self) -> Self {
        Self {
            folder: self
                .folder_name()
                .or_else(|| defaults.folder_name())
                .map(str::to_string),
        }
    }

    /// Why these settings cannot be used, if they can't
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        let name = self.folder_name()?;
        if name.chars().count() > MAX_FOLDER_NAME_LEN {
            return Some(format!(
                "folder name must be at most {MAX_FOLDER_NAME_LEN} characters"
            ));
        }
        if name.chars().any(char::is_control) {
            return Some("folder name must not contain control characters".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_values_win_over_defaults() {
        let defaults = SyncSettings::with_folder("Reading");
        let request = SyncSettings::with_folder("  Later ");

        assert_eq!(request.or(&defaults).folder_name(), Some("Later"));
        assert_eq!(SyncSettings::default().or(&defaults).folder_name(), Some("Reading"));
        let blank = SyncSettings::with_folder("   ");
        assert_eq!(blank.or(&defaults).folder_name(), Some("Reading"));
        assert_eq!(SyncSettings::default().or(&SyncSettings::default()).folder, None);
    }

    #[test]
    fn oversized_or_control_names_are_rejected() {
        let longest = "x".repeat(MAX_FOLDER_NAME_LEN);
        assert!(SyncSettings::with_folder(longest.clone()).problem().is_none());
        let too_long = format!("{longest}x");
        assert!(SyncSettings::with_folder(too_long).problem().is_some());
        assert!(SyncSettings::with_folder("a\nb").problem().is_some());
        assert!(SyncSettings::default().problem().is_none());
    }

    #[test]
    fn unset_folder_is_omitted_from_json() {
        assert_eq!(serde_json::to_string(&SyncSettings::default()).unwrap(), "{}");
        let parsed: SyncSettings = serde_json::from_str(r#"{"folder":"Inbox"}"#).unwrap();
        assert_eq!(parsed, SyncSettings::with_folder("Inbox"));
    }
}
