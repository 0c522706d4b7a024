use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                gender      TEXT CHECK (gender IN ('male', 'female', 'other')),
                community   TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_users_community ON users(community);

            -- One edge per unordered pair; user1 is always the first liker.
            CREATE TABLE matches (
                id          TEXT PRIMARY KEY,
                user1       TEXT NOT NULL REFERENCES users(id),
                user2       TEXT NOT NULL REFERENCES users(id),
                pair_lo     TEXT NOT NULL,
                pair_hi     TEXT NOT NULL,
                status      TEXT NOT NULL CHECK (status IN ('pending', 'matched')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                CHECK (user1 <> user2),
                UNIQUE (pair_lo, pair_hi)
            );

            CREATE INDEX idx_matches_user1 ON matches(user1, status);
            CREATE INDEX idx_matches_user2 ON matches(user2, status);

            -- One chat per unordered pair; revealed only ever goes 0 -> 1.
            CREATE TABLE chats (
                id          TEXT PRIMARY KEY,
                match_id    TEXT NOT NULL UNIQUE REFERENCES matches(id),
                user1       TEXT NOT NULL REFERENCES users(id),
                user2       TEXT NOT NULL REFERENCES users(id),
                pair_lo     TEXT NOT NULL,
                pair_hi     TEXT NOT NULL,
                revealed    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE (pair_lo, pair_hi)
            );

            CREATE INDEX idx_chats_user1 ON chats(user1);
            CREATE INDEX idx_chats_user2 ON chats(user2);

            -- Latest guess only, per user per chat.
            CREATE TABLE guesses (
                chat_id     TEXT NOT NULL REFERENCES chats(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                guess       TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                chat_id     TEXT NOT NULL REFERENCES chats(id),
                sender_id   TEXT NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_chat ON messages(chat_id, created_at);

            CREATE TABLE notifications (
                id               TEXT PRIMARY KEY,
                recipient        TEXT NOT NULL REFERENCES users(id),
                sender           TEXT,
                kind             TEXT NOT NULL,
                title            TEXT NOT NULL,
                message          TEXT NOT NULL,
                read             INTEGER NOT NULL DEFAULT 0,
                related_chat     TEXT,
                related_match    TEXT,
                related_message  TEXT,
                action_url       TEXT,
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_recipient
                ON notifications(recipient, read, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
