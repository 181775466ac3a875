use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Variant discriminator, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_generating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_error: false,
            kind: None,
            prompt: None,
            is_generating: false,
            image_data: None,
            model: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Assistant image message shown while the image is still being generated.
    pub fn image_placeholder(prompt: impl Into<String>) -> Self {
        Self {
            kind: Some(MessageKind::Image),
            prompt: Some(prompt.into()),
            is_generating: true,
            ..Self::new(Role::Assistant, "")
        }
    }

    pub fn image(
        prompt: impl Into<String>,
        image_data: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some(MessageKind::Image),
            prompt: Some(prompt.into()),
            image_data: Some(image_data.into()),
            model: Some(model.into()),
            ..Self::new(Role::Assistant, "")
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == Some(MessageKind::Image)
    }
}

pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_omits_image_fields() {
        let msg = Message::user("hello there");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello there");
        assert!(json.get("type").is_none());
        assert!(json.get("isError").is_none());
        assert!(json.get("imageData").is_none());
    }

    #[test]
    fn test_image_message_uses_type_discriminator() {
        let msg = Message::image("a red fox", "aGVsbG8=", "stabilityai/stable-diffusion-xl-base-1.0");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "image");
        assert_eq!(json["prompt"], "a red fox");
        assert_eq!(json["imageData"], "aGVsbG8=");
        assert_eq!(json["role"], "assistant");
        assert!(msg.is_image());
        assert!(!msg.is_generating);
    }

    #[test]
    fn test_deserialize_message_without_id() {
        let msg: Message = serde_json::from_str(
            r#"{"role":"assistant","content":"oops","timestamp":"2025-01-01T00:00:00Z","isError":true}"#,
        )
        .unwrap();

        assert!(!msg.id.is_empty());
        assert!(msg.is_error);
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Assistant] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("model"), None);
    }
}
