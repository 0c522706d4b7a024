use tokio::sync::mpsc;
use tracing::{trace, warn};
use uuid::Uuid;

use snugglr_types::events::ServerEvent;

/// A real-time event produced by the core, addressed to a chat room or to a
/// user's notification room.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Chat { chat_id: Uuid, event: ServerEvent },
    User { user_id: Uuid, event: ServerEvent },
}

impl Outbound {
    pub fn event(&self) -> &ServerEvent {
        match self {
            Self::Chat { event, .. } | Self::User { event, .. } => event,
        }
    }
}

pub type OutboxReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Outbound queue between the core and the delivery bus.
///
/// Pushing never blocks and never fails the caller: the state change that
/// produced an event is already committed when the event is queued.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn new() -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn to_chat(&self, chat_id: Uuid, event: ServerEvent) {
        self.push(Outbound::Chat { chat_id, event });
    }

    pub fn to_user(&self, user_id: Uuid, event: ServerEvent) {
        self.push(Outbound::User { user_id, event });
    }

    fn push(&self, outbound: Outbound) {
        trace!("queueing {} event", outbound.event().name());
        if let Err(e) = self.tx.send(outbound) {
            warn!("Delivery bus gone, dropping {} event", e.0.event().name());
        }
    }
}
