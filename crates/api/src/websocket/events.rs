//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types
//! with type-safe serde serialization.

use clipsync_shared::AccountId;
use serde::{Deserialize, Serialize};

use crate::fanout::MessageEvent;
use crate::presence::ConnectionHandle;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to the account named by the token
    Register { token: String },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection accepted, not yet bound to an account
    Connected { handle: ConnectionHandle },

    /// Connection registered for the account's message fanout
    Registered { account_id: AccountId },

    /// Token rejected; the connection stays unregistered and may retry
    RegistrationError { message: String },

    /// A message was created or deleted for this account
    Event(MessageEvent),

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipsync_shared::{Message, MessageId};

    #[test]
    fn test_client_event_deserialization() {
        let json = r#"{"type":"register","token":"abc.def.ghi"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::Register { token } => assert_eq!(token, "abc.def.ghi"),
            _ => panic!("Expected Register event"),
        }

        let event: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::Pong;
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_message_event_is_flattened_into_frame() {
        let message = Message::new(AccountId::new(), "copied text");
        let json = serde_json::to_value(ServerEvent::Event(MessageEvent::Created(message.clone())))
            .unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["kind"], "created");
        assert_eq!(json["message"]["text"], "copied text");

        let id = MessageId::new();
        let json = serde_json::to_value(ServerEvent::Event(MessageEvent::Deleted(id))).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["kind"], "deleted");
        assert_eq!(json["message"], id.to_string());
    }

    #[test]
    fn test_registration_error_serialization() {
        let event = ServerEvent::RegistrationError {
            message: "Token has expired".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("registration_error"));
        assert!(json.contains("Token has expired"));
    }
}
