//! Channel and user records held by the directory cache

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Well-known ID of Slack's built-in bot, never returned by `users.list`
pub const SLACKBOT_ID: &str = "USLACKBOT";

/// A channel as returned by `channels.list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Channel ID (e.g., C09NU1KFXHT)
    pub id: String,

    /// Channel name without # (e.g., "engineering")
    pub name: String,

    /// Everything else Slack sent (is_archived, topic, purpose, num_members, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChannelRecord {
    /// Create a record with no extra attributes
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// Channel name with a leading #
    pub fn display_name(&self) -> String {
        format!("#{}", self.name)
    }

    /// Check the `is_archived` attribute (false when absent)
    pub fn is_archived(&self) -> bool {
        self.extra
            .get("is_archived")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn topic(&self) -> Option<&str> {
        self.extra
            .get("topic")
            .and_then(|t| t.get("value"))
            .and_then(Value::as_str)
    }

    pub fn member_count(&self) -> Option<u64> {
        self.extra.get("num_members").and_then(Value::as_u64)
    }
}

/// A user as returned by `users.list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID (e.g., U09JDBT2MCM)
    pub id: String,

    /// Username/handle (e.g., "john.doe")
    pub name: String,

    /// Everything else Slack sent (profile, real_name, is_bot, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// Stand-in record for Slackbot
    pub fn slackbot() -> Self {
        let mut user = Self::new(SLACKBOT_ID, "Slackbot");
        user.extra.insert("status".into(), Value::Null);
        user.extra.insert("profile".into(), json!({}));
        user
    }

    pub fn real_name(&self) -> Option<&str> {
        self.extra.get("real_name").and_then(Value::as_str)
    }

    /// Get best available name for display
    pub fn best_name(&self) -> &str {
        self.extra
            .get("profile")
            .and_then(|p| p.get("display_name"))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .or(self.real_name())
            .unwrap_or(&self.name)
    }

    /// The full record as a JSON object, as Slack originally sent it
    pub fn to_value(&self) -> Value {
        let mut object = self.extra.clone();
        object.insert("id".into(), Value::String(self.id.clone()));
        object.insert("name".into(), Value::String(self.name.clone()));
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_record_keeps_extra_attributes() {
        let channel: ChannelRecord = serde_json::from_value(json!({
            "id": "C123",
            "name": "engineering",
            "is_archived": false,
            "num_members": 42,
            "topic": {"value": "ship it", "creator": "U1"}
        }))
        .unwrap();

        assert_eq!(channel.display_name(), "#engineering");
        assert!(!channel.is_archived());
        assert_eq!(channel.member_count(), Some(42));
        assert_eq!(channel.topic(), Some("ship it"));
    }

    #[test]
    fn test_user_best_name() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": "U123",
            "name": "john.doe",
            "real_name": "John Doe",
            "profile": {"display_name": "Johnny"}
        }))
        .unwrap();
        assert_eq!(user.best_name(), "Johnny");

        let user = UserRecord::new("U123", "john.doe");
        assert_eq!(user.best_name(), "john.doe");
    }

    #[test]
    fn test_user_to_value_is_full_record() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": "U1",
            "name": "alice",
            "profile": {"email": "alice@example.com"}
        }))
        .unwrap();

        let value = user.to_value();
        assert_eq!(value["id"], "U1");
        assert_eq!(value["name"], "alice");
        assert_eq!(value["profile"]["email"], "alice@example.com");
    }

    #[test]
    fn test_slackbot_record() {
        let bot = UserRecord::slackbot();
        assert_eq!(bot.id, SLACKBOT_ID);
        assert_eq!(bot.name, "Slackbot");
        assert_eq!(bot.to_value()["status"], Value::Null);
    }
}
