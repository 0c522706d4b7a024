//! The match / chat / reveal core.
//!
//! Every operation here is synchronous and writes through `snugglr-db`; the
//! REST handlers and the WebSocket gateway call the same methods (off the
//! async runtime) so both transports see identical semantics. Real-time side
//! effects are queued on the [`Outbox`] only after the storage write commits.

pub mod channels;
pub mod chat;
mod convert;
pub mod eligibility;
pub mod error;
pub mod notifications;
pub mod outbox;
pub mod reconcile;
pub mod swipe;
pub mod users;

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use snugglr_db::Database;
use snugglr_db::models::{NewNotification, UserRow};
use snugglr_types::events::ServerEvent;

pub use error::{EngineError, EngineResult};
pub use outbox::{Outbound, Outbox, OutboxReceiver};

#[derive(Clone)]
pub struct Engine {
    db: Arc<Database>,
    outbox: Outbox,
}

impl Engine {
    pub fn new(db: Arc<Database>, outbox: Outbox) -> Self {
        Self { db, outbox }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run a core operation off the async runtime.
    pub async fn blocking<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> EngineResult<T> + Send + 'static,
    {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                EngineError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
            })?
    }

    fn require_user(&self, id: Uuid) -> EngineResult<UserRow> {
        self.db
            .get_user_by_id(&id.to_string())?
            .ok_or_else(|| EngineError::not_found("User not found"))
    }

    /// Persist a notification and push it to the recipient's room.
    /// Failures are logged and swallowed.
    fn notify(&self, new: NewNotification) {
        let recipient = new.recipient.clone();
        let row = match self.db.insert_notification(&new) {
            Ok(row) => row,
            Err(e) => {
                warn!("Failed to create {} notification for {}: {:#}", new.kind, recipient, e);
                return;
            }
        };

        match (convert::parse_id(&row.recipient), convert::notification(&row)) {
            (Ok(user_id), Ok(notification)) => {
                self.outbox.to_user(user_id, ServerEvent::NewNotification(notification));
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Notification {} stored but not pushed: {}", row.id, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use snugglr_db::models::NewUser;
    use snugglr_types::models::SwipeAction;

    pub struct Harness {
        pub engine: Engine,
        pub rx: OutboxReceiver,
    }

    impl Harness {
        pub fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let (outbox, rx) = Outbox::new();
            Self { engine: Engine::new(db, outbox), rx }
        }

        pub fn user(&self, name: &str, gender: &str) -> Uuid {
            self.user_in(name, gender, "campus")
        }

        pub fn user_in(&self, name: &str, gender: &str, community: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.engine
                .db()
                .create_user(&NewUser {
                    id: id.to_string(),
                    name: name.to_string(),
                    username: format!("Mystic{}", &id.to_string()[..6]),
                    email: format!("{}@campus.edu", id),
                    password_hash: "x".to_string(),
                    gender: Some(gender.to_string()),
                    community: community.to_string(),
                })
                .unwrap();
            id
        }

        /// Mutual like between `a` and `b`; returns the chat id.
        pub fn matched(&self, a: Uuid, b: Uuid) -> Uuid {
            self.engine.swipe(a, b, SwipeAction::Like).unwrap();
            let res = self.engine.swipe(b, a, SwipeAction::Like).unwrap();
            res.chat_id.unwrap()
        }

        pub fn drain(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(o) = self.rx.try_recv() {
                out.push(o);
            }
            out
        }
    }
}
