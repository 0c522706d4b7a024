/// Database row types. These map directly to SQLite rows.
/// Distinct from snugglr-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: Option<String>,
    pub community: String,
    pub created_at: String,
}

pub struct NewUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Option<String>,
    pub community: String,
}

#[derive(Debug, Clone)]
pub struct MatchRow {
    pub id: String,
    pub user1: String,
    pub user2: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A matched edge as seen from one participant.
#[derive(Debug, Clone)]
pub struct MatchedPartnerRow {
    pub match_id: String,
    pub chat_id: Option<String>,
    pub matched_at: String,
    pub partner: UserRow,
}

/// Result of recording a like inside one write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeOutcome {
    /// No reciprocal like yet; the actor's edge is pending.
    Pending { match_id: String },
    /// This like promoted the reciprocal edge and created the chat.
    Matched { match_id: String, chat_id: String },
    /// The pair was already matched before this like.
    AlreadyMatched { match_id: String, chat_id: String },
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: String,
    pub match_id: String,
    pub user1: String,
    pub user2: String,
    pub revealed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ChatRow {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user1 == user_id || self.user2 == user_id
    }

    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if self.user1 == user_id {
            Some(&self.user2)
        } else if self.user2 == user_id {
            Some(&self.user1)
        } else {
            None
        }
    }
}

/// Both sides of a chat's guessing state, read in the same transaction that
/// stored the guesser's latest guess.
#[derive(Debug, Clone)]
pub struct GuessSnapshot {
    pub chat_id: String,
    pub guesser_id: String,
    pub guesser_name: String,
    pub guess: String,
    pub other_id: String,
    pub other_name: String,
    pub other_guess: Option<String>,
}

/// A stored guess and whether the same transaction revealed the chat.
#[derive(Debug, Clone)]
pub struct GuessOutcome {
    pub snapshot: GuessSnapshot,
    pub revealed: bool,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub recipient: String,
    pub sender: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub related_chat: Option<String>,
    pub related_match: Option<String>,
    pub related_message: Option<String>,
    pub action_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub recipient: String,
    pub sender: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_chat: Option<String>,
    pub related_match: Option<String>,
    pub related_message: Option<String>,
    pub action_url: Option<String>,
}
