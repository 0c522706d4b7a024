use tracing::{debug, warn};
use uuid::Uuid;

use snugglr_db::models::NewNotification;
use snugglr_types::api::MessageList;
use snugglr_types::events::ServerEvent;
use snugglr_types::models::{ChatMessage, NotificationKind};

use crate::channels::Channel;
use crate::convert::chat_message;
use crate::error::{EngineError, EngineResult};
use crate::Engine;

pub const MAX_MESSAGE_LEN: usize = 2000;

impl Engine {
    /// Post a message to a chat. Used by both the REST endpoint and the
    /// socket `new_message` event.
    pub fn send_message(&self, chat_id: Uuid, sender: Uuid, text: &str) -> EngineResult<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::validation("Message text is required"));
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(EngineError::validation(format!(
                "Message cannot exceed {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let channel = self.participant_channel(chat_id, sender)?;

        let row = self.db.insert_message(
            &Uuid::new_v4().to_string(),
            &chat_id.to_string(),
            &sender.to_string(),
            text,
        )?;
        let message = chat_message(&row)?;
        debug!("message {} posted in chat {} by {}", message.id, chat_id, sender);

        self.outbox.to_chat(
            chat_id,
            ServerEvent::MessageReceived { chat_id, message: message.clone() },
        );
        self.notify_recipient(&channel, &message);

        Ok(message)
    }

    fn notify_recipient(&self, channel: &Channel, message: &ChatMessage) {
        let Some(recipient) = channel.other(message.sender_id) else {
            return;
        };

        // Before the reveal the recipient only knows the sender's handle.
        let display = if channel.revealed {
            match self.require_user(message.sender_id) {
                Ok(user) => user.name,
                Err(e) => {
                    warn!("Sender {} lookup failed: {}", message.sender_id, e);
                    message.sender_username.clone()
                }
            }
        } else {
            message.sender_username.clone()
        };

        self.notify(NewNotification {
            recipient: recipient.to_string(),
            sender: Some(message.sender_id.to_string()),
            kind: NotificationKind::NewMessage.as_str().to_string(),
            title: "New Message".to_string(),
            message: format!("{} sent you a message", display),
            related_chat: Some(channel.id.to_string()),
            related_match: None,
            related_message: Some(message.id.to_string()),
            action_url: Some(format!("/chat/{}", channel.id)),
        });
    }

    pub fn messages(&self, chat_id: Uuid, user_id: Uuid) -> EngineResult<MessageList> {
        let channel = self.participant_channel(chat_id, user_id)?;
        let messages = self
            .db
            .get_messages(&chat_id.to_string())?
            .iter()
            .map(chat_message)
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(MessageList { messages, revealed: channel.revealed })
    }
}
