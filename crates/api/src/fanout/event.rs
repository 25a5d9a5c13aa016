//! Message events routed by the fanout path

use clipsync_shared::{Message, MessageId};
use serde::{Deserialize, Serialize};

/// A created/deleted notification for one account's connections
///
/// Serialized as `{"kind":"created","message":{...}}` or
/// `{"kind":"deleted","message":"<id>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MessageEvent {
    Created(Message),
    Deleted(MessageId),
}

impl MessageEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageEvent::Created(_) => "created",
            MessageEvent::Deleted(_) => "deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipsync_shared::AccountId;

    #[test]
    fn test_created_event_shape() {
        let message = Message::new(AccountId::new(), "x");
        let json = serde_json::to_value(MessageEvent::Created(message.clone())).unwrap();

        assert_eq!(json["kind"], "created");
        assert_eq!(json["message"]["id"], message.id.to_string());
        assert_eq!(json["message"]["text"], "x");
    }

    #[test]
    fn test_deleted_event_shape() {
        let id = MessageId::new();
        let json = serde_json::to_string(&MessageEvent::Deleted(id)).unwrap();
        assert_eq!(json, format!(r#"{{"kind":"deleted","message":"{id}"}}"#));
    }
}
