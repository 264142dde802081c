//! User and linked device models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a user, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new unique user ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An account that syncs articles to a device
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,
    /// Contact email, unique per user
    pub email: String,
    /// Key forwarded by the dashboard in the `Authorization` header
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl User {
    /// Create a new user with a freshly minted API key
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            api_key: Uuid::new_v4().simple().to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("api_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A device cloud registration linked to a user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Owning user
    pub user_id: UserId,
    /// Long-lived device token returned by device registration
    #[serde(skip_serializing)]
    pub token: String,
    /// Registration timestamp (Unix ms)
    pub registered_at: i64,
}

impl fmt::Debug for Device {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Device")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse() {
        let id = UserId::new();
        let parsed: UserId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_users_get_distinct_api_keys() {
        let first = User::new("a@example.com");
        let second = User::new("b@example.com");
        assert_ne!(first.api_key, second.api_key);
        assert_eq!(first.api_key.len(), 32);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let user = User::new("a@example.com");
        let device = Device {
            user_id: user.id,
            token: "device-secret".to_string(),
            registered_at: 1,
        };

        assert!(!format!("{user:?}").contains(&user.api_key));
        assert!(!format!("{device:?}").contains("device-secret"));
    }
}
