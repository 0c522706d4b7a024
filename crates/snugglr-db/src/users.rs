use anyhow::Result;
use rusqlite::{Connection, Row};

use crate::models::{NewUser, UserRow};
use crate::{Database, OptionalExt, now_timestamp};

const USER_COLUMNS: &str = "id, name, username, email, password, gender, community, created_at";

impl Database {
    pub fn create_user(&self, user: &NewUser) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, email, password, gender, community, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.id,
                    user.name,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.gender,
                    user.community,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Users in `community` (trimmed, ASCII case-insensitive) that share no
    /// edge (either direction) with `user_id`.
    pub fn unswiped_users(&self, user_id: &str, community: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE lower(trim(u.community)) = lower(trim(?2))
                   AND u.id <> ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM matches m
                       WHERE (m.user1 = ?1 AND m.user2 = u.id)
                          OR (m.user2 = ?1 AND m.user1 = u.id)
                   )
                 ORDER BY u.created_at DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, community, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

/// Maps a row selected with `USER_COLUMNS` (in that order) starting at `offset`.
pub(crate) fn user_from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        username: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        password: row.get(offset + 4)?,
        gender: row.get(offset + 5)?,
        community: row.get(offset + 6)?,
        created_at: row.get(offset + 7)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    user_from_row_at(row, 0)
}
