use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, Row, TransactionBehavior};

use crate::models::{ChatRow, GuessOutcome, GuessSnapshot, MessageRow};
use crate::{Database, OptionalExt, now_timestamp, pair_key};

const CHAT_COLUMNS: &str = "id, match_id, user1, user2, revealed, created_at, updated_at";

impl Database {
    // -- Chats --

    pub fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat(conn, id))
    }

    pub fn chat_for_pair(&self, a: &str, b: &str) -> Result<Option<ChatRow>> {
        let (lo, hi) = pair_key(a, b);
        self.with_conn(|conn| {
            let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE pair_lo = ?1 AND pair_hi = ?2");
            let row = conn.query_row(&sql, [lo, hi], chat_from_row).optional()?;
            Ok(row)
        })
    }

    /// Chats `user_id` takes part in, most recently active first.
    pub fn chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CHAT_COLUMNS} FROM chats
                 WHERE user1 = ?1 OR user2 = ?1
                 ORDER BY updated_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], chat_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip a chat to revealed. Returns true only for the call that flipped it;
    /// an already revealed chat is left untouched.
    pub fn mark_revealed(&self, chat_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE chats SET revealed = 1, updated_at = ?2 WHERE id = ?1 AND revealed = 0",
                rusqlite::params![chat_id, now_timestamp()],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Guesses --

    /// Store `user_id`'s guess for the chat (replacing any earlier one), read
    /// both participants' current state, and flip the chat to revealed when
    /// `reveals` accepts that state. All of it happens in one write
    /// transaction, so the decision always sees the latest pair of guesses.
    ///
    /// Returns `None` when the chat is already revealed; nothing is written then.
    pub fn record_guess<F>(&self, chat_id: &str, user_id: &str, guess: &str, reveals: F) -> Result<Option<GuessOutcome>>
    where
        F: FnOnce(&GuessSnapshot) -> bool,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let chat = query_chat(&tx, chat_id)?.ok_or_else(|| anyhow!("chat {} not found", chat_id))?;
            if chat.revealed {
                return Ok(None);
            }
            let other_id = match chat.other_participant(user_id) {
                Some(id) => id.to_string(),
                None => bail!("user {} is not a participant of chat {}", user_id, chat_id),
            };

            tx.execute(
                "INSERT INTO guesses (chat_id, user_id, guess, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (chat_id, user_id) DO UPDATE SET guess = excluded.guess, updated_at = excluded.updated_at",
                rusqlite::params![chat_id, user_id, guess, now_timestamp()],
            )?;

            let snapshot = GuessSnapshot {
                chat_id: chat_id.to_string(),
                guesser_id: user_id.to_string(),
                guesser_name: query_name(&tx, user_id)?,
                guess: guess.to_string(),
                other_name: query_name(&tx, &other_id)?,
                other_guess: query_guess(&tx, chat_id, &other_id)?,
                other_id,
            };

            let revealed = reveals(&snapshot)
                && tx.execute(
                    "UPDATE chats SET revealed = 1, updated_at = ?2 WHERE id = ?1 AND revealed = 0",
                    rusqlite::params![chat_id, now_timestamp()],
                )? == 1;

            tx.commit()?;

            Ok(Some(GuessOutcome { snapshot, revealed }))
        })
    }

    pub fn get_guess(&self, chat_id: &str, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_guess(conn, chat_id, user_id))
    }

    // -- Messages --

    pub fn insert_message(&self, id: &str, chat_id: &str, sender_id: &str, text: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();

            tx.execute(
                "INSERT INTO messages (id, chat_id, sender_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, chat_id, sender_id, text, now],
            )?;
            tx.execute(
                "UPDATE chats SET updated_at = ?2 WHERE id = ?1",
                rusqlite::params![chat_id, now],
            )?;

            let sender_username: String =
                tx.query_row("SELECT username FROM users WHERE id = ?1", [sender_id], |row| row.get(0))?;

            tx.commit()?;

            Ok(MessageRow {
                id: id.to_string(),
                chat_id: chat_id.to_string(),
                sender_id: sender_id.to_string(),
                sender_username,
                text: text.to_string(),
                created_at: now,
            })
        })
    }

    /// Messages of a chat, oldest first.
    pub fn get_messages(&self, chat_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the sender's handle in a single query
            let mut stmt = conn.prepare(
                "SELECT m.id, m.chat_id, m.sender_id, u.username, m.text, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.chat_id = ?1
                 ORDER BY m.created_at ASC, m.rowid ASC",
            )?;

            let rows = stmt
                .query_map([chat_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_chat(conn: &Connection, id: &str) -> Result<Option<ChatRow>> {
    let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1");
    let row = conn.query_row(&sql, [id], chat_from_row).optional()?;
    Ok(row)
}

fn query_guess(conn: &Connection, chat_id: &str, user_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT guess FROM guesses WHERE chat_id = ?1 AND user_id = ?2",
        [chat_id, user_id],
        |row| row.get(0),
    )
    .optional()
}

fn query_name(conn: &Connection, user_id: &str) -> Result<String> {
    conn.query_row("SELECT name FROM users WHERE id = ?1", [user_id], |row| row.get(0))
        .map_err(|_| anyhow!("User not found: {}", user_id))
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
        user1: row.get(2)?,
        user2: row.get(3)?,
        revealed: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::{GuessSnapshot, LikeOutcome};
    use crate::testing;
    use crate::Database;

    fn matched_pair(db: &Database) -> (String, String, String) {
        let alex = testing::user(db, "Alex", Some("male"));
        let sam = testing::user(db, "Sam", Some("female"));
        db.record_like(&alex, &sam).unwrap();
        let LikeOutcome::Matched { chat_id, .. } = db.record_like(&sam, &alex).unwrap() else {
            panic!("expected matched");
        };
        (alex, sam, chat_id)
    }

    #[test]
    fn test_guess_upsert_keeps_latest() {
        let db = testing::db();
        let (alex, sam, chat_id) = matched_pair(&db);

        let snap = db.record_guess(&chat_id, &alex, "Samantha", |_| false).unwrap().unwrap().snapshot;
        assert_eq!(snap.other_id, sam);
        assert_eq!(snap.other_name, "Sam");
        assert_eq!(snap.guesser_name, "Alex");
        assert!(snap.other_guess.is_none());

        db.record_guess(&chat_id, &alex, "Sam", |_| false).unwrap().unwrap();
        assert_eq!(db.get_guess(&chat_id, &alex).unwrap().as_deref(), Some("Sam"));

        let snap = db.record_guess(&chat_id, &sam, "Alex", |_| false).unwrap().unwrap().snapshot;
        assert_eq!(snap.other_guess.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_revealed_chat_rejects_guesses() {
        let db = testing::db();
        let (alex, _sam, chat_id) = matched_pair(&db);

        assert!(db.mark_revealed(&chat_id).unwrap());
        assert!(!db.mark_revealed(&chat_id).unwrap());
        assert!(db.get_chat(&chat_id).unwrap().unwrap().revealed);

        assert!(db.record_guess(&chat_id, &alex, "Sam", |_| true).unwrap().is_none());
        assert!(db.get_guess(&chat_id, &alex).unwrap().is_none());
    }

    #[test]
    fn test_reveal_decided_on_latest_guesses() {
        let db = testing::db();
        let (alex, sam, chat_id) = matched_pair(&db);
        let both_right = |snap: &GuessSnapshot| {
            snap.other_guess.as_deref() == Some(snap.guesser_name.as_str()) && snap.guess == snap.other_name
        };

        db.record_guess(&chat_id, &alex, "Sam", both_right).unwrap().unwrap();
        db.record_guess(&chat_id, &alex, "Wrong", both_right).unwrap().unwrap();

        // Sam's decision sees Alex's replacement guess, not the earlier one
        let outcome = db.record_guess(&chat_id, &sam, "Alex", both_right).unwrap().unwrap();
        assert_eq!(outcome.snapshot.other_guess.as_deref(), Some("Wrong"));
        assert!(!outcome.revealed);
        assert!(!db.get_chat(&chat_id).unwrap().unwrap().revealed);

        let outcome = db.record_guess(&chat_id, &alex, "Sam", both_right).unwrap().unwrap();
        assert!(outcome.revealed);
        assert!(db.get_chat(&chat_id).unwrap().unwrap().revealed);
    }

    #[test]
    fn test_outsider_guess_is_an_error() {
        let db = testing::db();
        let (_alex, _sam, chat_id) = matched_pair(&db);
        let kim = testing::user(&db, "Kim", Some("female"));

        assert!(db.record_guess(&chat_id, &kim, "Sam", |_| true).is_err());
        assert!(db.get_guess(&chat_id, &kim).unwrap().is_none());
    }

    #[test]
    fn test_messages_in_order() {
        let db = testing::db();
        let (alex, sam, chat_id) = matched_pair(&db);

        db.insert_message("m1", &chat_id, &alex, "hey").unwrap();
        let row = db.insert_message("m2", &chat_id, &sam, "hi!").unwrap();
        assert!(row.sender_username.starts_with("anon-"));

        let texts: Vec<String> = db.get_messages(&chat_id).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["hey", "hi!"]);

        let chats = db.chats_for_user(&alex).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, chat_id);
    }
}
