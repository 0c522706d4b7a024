//! Row -> wire model conversions. Corrupt ids or timestamps coming out of the
//! database are internal errors, never silently defaulted.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use snugglr_db::models::{MessageRow, NotificationRow, UserRow};
use snugglr_types::models::{ChatMessage, Gender, Notification, Profile, PublicUser, RevealedUser};

use crate::error::EngineResult;

pub(crate) fn parse_id(raw: &str) -> EngineResult<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|e| anyhow!("corrupt id '{}': {}", raw, e).into())
}

pub(crate) fn parse_opt_id(raw: Option<&str>) -> EngineResult<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub(crate) fn parse_timestamp(raw: &str) -> EngineResult<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format has no timezone; treat as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", raw, e).into())
}

/// Unknown values read as "unset", which the eligibility rule rejects.
pub(crate) fn parse_gender(raw: Option<&str>) -> Option<Gender> {
    raw.and_then(|g| {
        g.parse()
            .map_err(|e| warn!("ignoring stored gender: {}", e))
            .ok()
    })
}

pub(crate) fn public_user(row: &UserRow) -> EngineResult<PublicUser> {
    Ok(PublicUser {
        id: parse_id(&row.id)?,
        username: row.username.clone(),
        gender: parse_gender(row.gender.as_deref()),
        community: row.community.clone(),
    })
}

pub(crate) fn revealed_user(row: &UserRow) -> EngineResult<RevealedUser> {
    Ok(RevealedUser {
        id: parse_id(&row.id)?,
        name: row.name.clone(),
        username: row.username.clone(),
    })
}

pub(crate) fn profile(row: &UserRow) -> EngineResult<Profile> {
    Ok(Profile {
        id: parse_id(&row.id)?,
        name: row.name.clone(),
        username: row.username.clone(),
        email: row.email.clone(),
        gender: parse_gender(row.gender.as_deref()),
        community: row.community.clone(),
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub(crate) fn chat_message(row: &MessageRow) -> EngineResult<ChatMessage> {
    Ok(ChatMessage {
        id: parse_id(&row.id)?,
        chat_id: parse_id(&row.chat_id)?,
        sender_id: parse_id(&row.sender_id)?,
        sender_username: row.sender_username.clone(),
        text: row.text.clone(),
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub(crate) fn notification(row: &NotificationRow) -> EngineResult<Notification> {
    Ok(Notification {
        id: parse_id(&row.id)?,
        recipient: parse_id(&row.recipient)?,
        sender: parse_opt_id(row.sender.as_deref())?,
        kind: row.kind.parse().map_err(|e: String| anyhow!(e))?,
        title: row.title.clone(),
        message: row.message.clone(),
        read: row.read,
        related_chat: parse_opt_id(row.related_chat.as_deref())?,
        related_match: parse_opt_id(row.related_match.as_deref())?,
        related_message: parse_opt_id(row.related_message.as_deref())?,
        action_url: row.action_url.clone(),
        created_at: parse_timestamp(&row.created_at)?,
    })
}
