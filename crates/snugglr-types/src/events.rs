use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Notification, RevealedUser};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A message was posted to a chat the connection has joined
    MessageReceived { chat_id: Uuid, message: ChatMessage },

    /// A participant recorded (or replaced) their guess
    GuessSubmitted { chat_id: Uuid, user_id: Uuid },

    /// Both participants guessed, at least one of them wrong
    GuessIncorrect { chat_id: Uuid, message: String },

    /// Both guesses were correct; the chat is now revealed
    RevealIdentity {
        chat_id: Uuid,
        revealed: bool,
        users: Vec<RevealedUser>,
        message: String,
    },

    UserTyping { chat_id: Uuid, user_id: Uuid },

    UserStopTyping { chat_id: Uuid, user_id: Uuid },

    /// Pushed to the recipient's notification room
    NewNotification(Notification),

    NotificationRoomJoined { user_id: Uuid, message: String },

    NotificationMarkedRead { notification_id: Uuid, success: bool },

    /// Command rejected; the connection stays open
    Error { message: String },
}

impl ServerEvent {
    /// Wire name of the event, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MessageReceived { .. } => "message_received",
            Self::GuessSubmitted { .. } => "guess_submitted",
            Self::GuessIncorrect { .. } => "guess_incorrect",
            Self::RevealIdentity { .. } => "reveal_identity",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStopTyping { .. } => "user_stop_typing",
            Self::NewNotification(_) => "new_notification",
            Self::NotificationRoomJoined { .. } => "notification_room_joined",
            Self::NotificationMarkedRead { .. } => "notification_marked_read",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    JoinChat(Uuid),

    LeaveChat(Uuid),

    NewMessage { chat_id: Uuid, text: String, sender_id: Uuid },

    GuessSubmit { chat_id: Uuid, guess: String, user_id: Uuid },

    Typing { chat_id: Uuid, user_id: Uuid },

    StopTyping { chat_id: Uuid, user_id: Uuid },

    JoinNotifications(Uuid),

    LeaveNotifications(Uuid),

    MarkNotificationRead { notification_id: Uuid, user_id: Uuid },
}
