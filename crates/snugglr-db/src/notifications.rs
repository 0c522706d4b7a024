use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use crate::models::{NewNotification, NotificationRow};
use crate::{Database, OptionalExt, now_timestamp};

const NOTIFICATION_COLUMNS: &str = "id, recipient, sender, kind, title, message, read, \
     related_chat, related_match, related_message, action_url, created_at";

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, new: &NewNotification) -> Result<NotificationRow> {
        self.with_conn_mut(|conn| {
            let row = NotificationRow {
                id: Uuid::new_v4().to_string(),
                recipient: new.recipient.clone(),
                sender: new.sender.clone(),
                kind: new.kind.clone(),
                title: new.title.clone(),
                message: new.message.clone(),
                read: false,
                related_chat: new.related_chat.clone(),
                related_match: new.related_match.clone(),
                related_message: new.related_message.clone(),
                action_url: new.action_url.clone(),
                created_at: now_timestamp(),
            };

            conn.execute(
                &format!(
                    "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11)"
                ),
                rusqlite::params![
                    row.id,
                    row.recipient,
                    row.sender,
                    row.kind,
                    row.title,
                    row.message,
                    row.related_chat,
                    row.related_match,
                    row.related_message,
                    row.action_url,
                    row.created_at,
                ],
            )?;

            Ok(row)
        })
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        recipient: &str,
        unread_only: bool,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE recipient = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![recipient, unread_only, limit, offset as i64],
                    notification_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_notifications(&self, recipient: &str, unread_only: bool) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE recipient = ?1 AND (?2 = 0 OR read = 0)",
                rusqlite::params![recipient, unread_only],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Returns `None` if the notification does not exist or belongs to someone else.
    pub fn mark_notification_read(&self, id: &str, recipient: &str) -> Result<Option<NotificationRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient = ?2",
                [id, recipient],
            )?;
            let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 AND recipient = ?2");
            let row = conn.query_row(&sql, [id, recipient], notification_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn mark_all_notifications_read(&self, recipient: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE recipient = ?1 AND read = 0",
                [recipient],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_notification(&self, id: &str, recipient: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND recipient = ?2",
                [id, recipient],
            )?;
            Ok(deleted == 1)
        })
    }

    pub fn clear_read_notifications(&self, recipient: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE recipient = ?1 AND read = 1",
                [recipient],
            )?;
            Ok(deleted)
        })
    }
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient: row.get(1)?,
        sender: row.get(2)?,
        kind: row.get(3)?,
        title: row.get(4)?,
        message: row.get(5)?,
        read: row.get(6)?,
        related_chat: row.get(7)?,
        related_match: row.get(8)?,
        related_message: row.get(9)?,
        action_url: row.get(10)?,
        created_at: row.get(11)?,
    })
}
