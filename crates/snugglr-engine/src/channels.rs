use uuid::Uuid;

use snugglr_db::models::ChatRow;
use snugglr_types::api::{ChatPartner, ChatSummary, RevealStatusResponse};
use snugglr_types::models::RevealedUser;

use crate::convert::{parse_id, parse_timestamp, revealed_user};
use crate::error::{EngineError, EngineResult};
use crate::Engine;

/// An anonymous chat between exactly two matched users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Uuid,
    pub match_id: Uuid,
    pub participants: [Uuid; 2],
    pub revealed: bool,
}

impl Channel {
    fn from_row(row: &ChatRow) -> EngineResult<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            match_id: parse_id(&row.match_id)?,
            participants: [parse_id(&row.user1)?, parse_id(&row.user2)?],
            revealed: row.revealed,
        })
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        match self.participants {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}

impl Engine {
    pub fn get_channel(&self, chat_id: Uuid) -> EngineResult<Channel> {
        let row = self
            .db
            .get_chat(&chat_id.to_string())?
            .ok_or_else(|| EngineError::not_found("Chat not found"))?;
        Channel::from_row(&row)
    }

    pub fn is_participant(&self, chat_id: Uuid, user_id: Uuid) -> EngineResult<bool> {
        Ok(self.get_channel(chat_id)?.has_participant(user_id))
    }

    /// Flip the chat to revealed. Idempotent; returns whether this call flipped it.
    pub fn mark_revealed(&self, chat_id: Uuid) -> EngineResult<bool> {
        Ok(self.db.mark_revealed(&chat_id.to_string())?)
    }

    /// The channel, provided `user_id` takes part in it.
    pub(crate) fn participant_channel(&self, chat_id: Uuid, user_id: Uuid) -> EngineResult<Channel> {
        let channel = self.get_channel(chat_id)?;
        if !channel.has_participant(user_id) {
            return Err(EngineError::forbidden("You are not a participant in this chat"));
        }
        Ok(channel)
    }

    pub(crate) fn revealed_users(&self, channel: &Channel) -> EngineResult<Vec<RevealedUser>> {
        channel
            .participants
            .iter()
            .map(|id| revealed_user(&self.require_user(*id)?))
            .collect()
    }

    pub fn reveal_status(&self, chat_id: Uuid, user_id: Uuid) -> EngineResult<RevealStatusResponse> {
        let channel = self.participant_channel(chat_id, user_id)?;
        let users = if channel.revealed {
            Some(self.revealed_users(&channel)?)
        } else {
            None
        };
        Ok(RevealStatusResponse { revealed: channel.revealed, users })
    }

    /// Chats of `user_id`, most recently active first. The partner's real name
    /// is included only once the chat is revealed.
    pub fn chats(&self, user_id: Uuid) -> EngineResult<Vec<ChatSummary>> {
        let me = user_id.to_string();
        self.db
            .chats_for_user(&me)?
            .iter()
            .map(|row| -> EngineResult<ChatSummary> {
                let other_id = row
                    .other_participant(&me)
                    .ok_or_else(|| anyhow::anyhow!("chat {} listed for non-participant", row.id))?;
                let other = self.require_user(parse_id(other_id)?)?;
                Ok(ChatSummary {
                    chat_id: parse_id(&row.id)?,
                    revealed: row.revealed,
                    other_user: ChatPartner {
                        id: parse_id(&other.id)?,
                        username: other.username.clone(),
                        name: row.revealed.then(|| other.name.clone()),
                    },
                    updated_at: parse_timestamp(&row.updated_at)?,
                })
            })
            .collect()
    }
}
