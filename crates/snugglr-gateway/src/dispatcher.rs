use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, trace};
use uuid::Uuid;

use snugglr_engine::{Outbound, OutboxReceiver};
use snugglr_types::events::ServerEvent;

/// Room membership of one live connection.
struct ConnectionEntry {
    user_id: Uuid,
    chats: HashSet<Uuid>,
    /// Joined its user's notification room
    notifications: bool,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Delivery bus: tracks connected sockets and the rooms they joined, and
/// fans events out to them. Delivery is best-effort; nothing is queued for
/// users who are offline.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// conn_id -> membership + send channel
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a connection for `user_id`. Returns (conn_id, receiver).
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(
            conn_id,
            ConnectionEntry {
                user_id,
                chats: HashSet::new(),
                notifications: false,
                tx,
            },
        );
        (conn_id, rx)
    }

    /// Drop a connection and all of its room memberships.
    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    pub async fn join_chat_room(&self, conn_id: Uuid, chat_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get_mut(&conn_id) {
            Some(entry) => {
                entry.chats.insert(chat_id);
                true
            }
            None => false,
        }
    }

    pub async fn leave_chat_room(&self, conn_id: Uuid, chat_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;
        connections
            .get_mut(&conn_id)
            .is_some_and(|entry| entry.chats.remove(&chat_id))
    }

    pub async fn in_chat_room(&self, conn_id: Uuid, chat_id: Uuid) -> bool {
        self.inner
            .connections
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|entry| entry.chats.contains(&chat_id))
    }

    pub async fn join_notifications(&self, conn_id: Uuid) -> bool {
        self.set_notifications(conn_id, true).await
    }

    pub async fn leave_notifications(&self, conn_id: Uuid) -> bool {
        self.set_notifications(conn_id, false).await
    }

    async fn set_notifications(&self, conn_id: Uuid, joined: bool) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get_mut(&conn_id) {
            Some(entry) => {
                entry.notifications = joined;
                true
            }
            None => false,
        }
    }

    /// Send to every connection in the chat room, optionally skipping one.
    /// Returns how many connections accepted the event.
    pub async fn publish_to_chat(&self, chat_id: Uuid, event: ServerEvent, except: Option<Uuid>) -> usize {
        let connections = self.inner.connections.read().await;
        let delivered = connections
            .iter()
            .filter(|(conn_id, entry)| entry.chats.contains(&chat_id) && Some(**conn_id) != except)
            .filter(|(_, entry)| entry.tx.send(event.clone()).is_ok())
            .count();
        trace!("{} -> chat {} ({} connections)", event.name(), chat_id, delivered);
        delivered
    }

    /// Send to every connection that joined `user_id`'s notification room.
    pub async fn publish_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let connections = self.inner.connections.read().await;
        let delivered = connections
            .values()
            .filter(|entry| entry.notifications && entry.user_id == user_id)
            .filter(|entry| entry.tx.send(event.clone()).is_ok())
            .count();
        trace!("{} -> user {} ({} connections)", event.name(), user_id, delivered);
        delivered
    }

    /// Reply to a single connection.
    pub async fn send_to_connection(&self, conn_id: Uuid, event: ServerEvent) {
        if let Some(entry) = self.inner.connections.read().await.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    pub async fn deliver(&self, outbound: Outbound) -> usize {
        match outbound {
            Outbound::Chat { chat_id, event } => self.publish_to_chat(chat_id, event, None).await,
            Outbound::User { user_id, event } => self.publish_to_user(user_id, event).await,
        }
    }

    /// Drain the core's outbox until every sender is gone.
    pub async fn run_outbox(self, mut rx: OutboxReceiver) {
        info!("Delivery bus started");
        while let Some(outbound) = rx.recv().await {
            let name = outbound.event().name();
            let delivered = self.deliver(outbound).await;
            if delivered == 0 {
                debug!("{} had no connected recipients", name);
            }
        }
        info!("Delivery bus stopped");
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snugglr_engine::Outbox;

    fn typing(chat_id: Uuid, user_id: Uuid) -> ServerEvent {
        ServerEvent::UserTyping { chat_id, user_id }
    }

    #[tokio::test]
    async fn test_chat_room_fanout() {
        let dispatcher = Dispatcher::new();
        let chat = Uuid::new_v4();
        let alex = Uuid::new_v4();
        let sam = Uuid::new_v4();

        let (conn_a, mut rx_a) = dispatcher.register(alex).await;
        let (conn_b, mut rx_b) = dispatcher.register(sam).await;
        let (_conn_c, mut rx_c) = dispatcher.register(Uuid::new_v4()).await;

        assert!(dispatcher.join_chat_room(conn_a, chat).await);
        assert!(dispatcher.join_chat_room(conn_b, chat).await);

        assert_eq!(dispatcher.publish_to_chat(chat, typing(chat, alex), None).await, 2);
        assert_eq!(rx_a.try_recv().unwrap(), typing(chat, alex));
        assert_eq!(rx_b.try_recv().unwrap(), typing(chat, alex));
        assert!(rx_c.try_recv().is_err());

        // The sender is skipped for typing signals
        assert_eq!(dispatcher.publish_to_chat(chat, typing(chat, alex), Some(conn_a)).await, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());

        assert!(dispatcher.leave_chat_room(conn_b, chat).await);
        assert!(!dispatcher.leave_chat_room(conn_b, chat).await);
        assert!(!dispatcher.in_chat_room(conn_b, chat).await);
        assert_eq!(dispatcher.publish_to_chat(chat, typing(chat, alex), None).await, 1);
    }

    #[tokio::test]
    async fn test_user_room_needs_join() {
        let dispatcher = Dispatcher::new();
        let alex = Uuid::new_v4();
        let (conn, mut rx) = dispatcher.register(alex).await;
        let event = ServerEvent::error("ping");

        assert_eq!(dispatcher.publish_to_user(alex, event.clone()).await, 0);

        dispatcher.join_notifications(conn).await;
        assert_eq!(dispatcher.publish_to_user(alex, event.clone()).await, 1);
        assert_eq!(rx.try_recv().unwrap(), event);

        // Every joined tab of the same user receives it
        let (second, mut rx2) = dispatcher.register(alex).await;
        dispatcher.join_notifications(second).await;
        assert_eq!(dispatcher.publish_to_user(alex, event.clone()).await, 2);
        assert!(rx2.try_recv().is_ok());

        dispatcher.leave_notifications(conn).await;
        assert_eq!(dispatcher.publish_to_user(alex, event).await, 1);
    }

    #[tokio::test]
    async fn test_unregister_drops_membership() {
        let dispatcher = Dispatcher::new();
        let chat = Uuid::new_v4();
        let (conn, _rx) = dispatcher.register(Uuid::new_v4()).await;
        dispatcher.join_chat_room(conn, chat).await;
        assert_eq!(dispatcher.connection_count().await, 1);

        dispatcher.unregister(conn).await;
        assert_eq!(dispatcher.connection_count().await, 0);
        assert!(!dispatcher.join_chat_room(conn, chat).await);
        assert_eq!(dispatcher.publish_to_chat(chat, ServerEvent::error("x"), None).await, 0);
    }

    #[tokio::test]
    async fn test_outbox_pump_delivers() {
        let dispatcher = Dispatcher::new();
        let chat = Uuid::new_v4();
        let (conn, mut rx) = dispatcher.register(Uuid::new_v4()).await;
        dispatcher.join_chat_room(conn, chat).await;

        let (outbox, outbox_rx) = Outbox::new();
        let pump = tokio::spawn(dispatcher.clone().run_outbox(outbox_rx));

        let event = ServerEvent::GuessIncorrect { chat_id: chat, message: "try again".into() };
        outbox.to_chat(chat, event.clone());
        drop(outbox);
        pump.await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
