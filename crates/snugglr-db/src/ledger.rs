use anyhow::{Result, bail};
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::models::{LikeOutcome, MatchRow, MatchedPartnerRow};
use crate::users::user_from_row_at;
use crate::{Database, OptionalExt, now_timestamp, pair_key};

impl Database {
    // -- Match ledger --

    /// Record `actor` liking `target` and, if `target` already liked `actor`,
    /// promote that edge and create the pair's chat.
    ///
    /// Runs as one IMMEDIATE transaction on the writer connection. The pair
    /// unique indexes on `matches` and `chats` back this up, so two
    /// reciprocal likes can never produce two edges or two chats.
    pub fn record_like(&self, actor: &str, target: &str) -> Result<LikeOutcome> {
        if actor == target {
            bail!("cannot like self");
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = now_timestamp();
            let (lo, hi) = pair_key(actor, target);

            let existing = query_edge_by_pair(&tx, lo, hi)?;

            let outcome = match existing {
                None => {
                    let match_id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO matches (id, user1, user2, pair_lo, pair_hi, status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
                        rusqlite::params![match_id, actor, target, lo, hi, now],
                    )?;
                    LikeOutcome::Pending { match_id }
                }
                Some(edge) if edge.status == "pending" && edge.user1 == target => {
                    // Compare-and-swap on status: only a pending edge is promoted.
                    let changed = tx.execute(
                        "UPDATE matches SET status = 'matched', updated_at = ?2
                         WHERE id = ?1 AND status = 'pending'",
                        rusqlite::params![edge.id, now],
                    )?;
                    if changed != 1 {
                        bail!("match {} was promoted concurrently", edge.id);
                    }

                    let chat_id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO chats (id, match_id, user1, user2, pair_lo, pair_hi, revealed, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
                        rusqlite::params![chat_id, edge.id, actor, target, lo, hi, now],
                    )?;
                    LikeOutcome::Matched { match_id: edge.id, chat_id }
                }
                Some(edge) if edge.status == "pending" => {
                    debug!("repeat like {} -> {}, keeping edge {}", actor, target, edge.id);
                    LikeOutcome::Pending { match_id: edge.id }
                }
                Some(edge) => {
                    let chat_id: String = tx.query_row(
                        "SELECT id FROM chats WHERE match_id = ?1",
                        [&edge.id],
                        |row| row.get(0),
                    )?;
                    LikeOutcome::AlreadyMatched { match_id: edge.id, chat_id }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// The edge between two users, whichever direction it was created in.
    pub fn edge_between(&self, a: &str, b: &str) -> Result<Option<MatchRow>> {
        let (lo, hi) = pair_key(a, b);
        self.with_conn(|conn| query_edge_by_pair(conn, lo, hi))
    }

    /// Matched edges involving `user_id`, most recently matched first.
    pub fn matched_partners(&self, user_id: &str) -> Result<Vec<MatchedPartnerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, c.id, m.updated_at,
                        u.id, u.name, u.username, u.email, u.password, u.gender, u.community, u.created_at
                 FROM matches m
                 JOIN users u ON u.id = CASE WHEN m.user1 = ?1 THEN m.user2 ELSE m.user1 END
                 LEFT JOIN chats c ON c.match_id = m.id
                 WHERE (m.user1 = ?1 OR m.user2 = ?1) AND m.status = 'matched'
                 ORDER BY m.updated_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(MatchedPartnerRow {
                        match_id: row.get(0)?,
                        chat_id: row.get(1)?,
                        matched_at: row.get(2)?,
                        partner: user_from_row_at(row, 3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_edge_by_pair(conn: &Connection, lo: &str, hi: &str) -> Result<Option<MatchRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user1, user2, status, created_at, updated_at
         FROM matches WHERE pair_lo = ?1 AND pair_hi = ?2",
    )?;

    let row = stmt
        .query_row([lo, hi], |row| {
            Ok(MatchRow {
                id: row.get(0)?,
                user1: row.get(1)?,
                user2: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}
