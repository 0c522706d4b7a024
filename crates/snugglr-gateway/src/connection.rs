use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use snugglr_engine::{Engine, EngineError};
use snugglr_types::events::{ClientCommand, ServerEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// The authenticated identity behind one socket.
#[derive(Debug, Clone)]
pub struct Session {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
}

/// Handle a WebSocket whose token was already validated at the HTTP upgrade.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    engine: Engine,
    user_id: Uuid,
    username: String,
) {
    info!("{} ({}) connected to gateway (pre-authenticated)", username, user_id);
    run_connection_loop(socket, dispatcher, engine, user_id, username).await;
}

/// Handle a WebSocket that must authenticate with an `identify` command first.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, engine: Engine, jwt_secret: String) {
    let mut socket = socket;

    let (user_id, username) = match wait_for_identify(&mut socket, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);
    run_connection_loop(socket, dispatcher, engine, user_id, username).await;
}

async fn wait_for_identify(socket: &mut WebSocket, jwt_secret: &str) -> Option<(Uuid, String)> {
    let identify = async {
        while let Some(Ok(msg)) = socket.recv().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientCommand::Identify { token }) = serde_json::from_str::<ClientCommand>(&text) {
                    let claims = crate::verify_token(&token, jwt_secret)?;
                    return Some((claims.sub, claims.username));
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

async fn run_connection_loop(
    socket: WebSocket,
    dispatcher: Dispatcher,
    engine: Engine,
    user_id: Uuid,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut events_rx) = dispatcher.register(user_id).await;

    let session = Session { conn_id, user_id, username };

    let ready = ServerEvent::Ready { user_id, username: session.username.clone() };
    if send_event(&mut sender, &ready).await.is_err() {
        dispatcher.unregister(conn_id).await;
        return;
    }

    // Set by the reader on every Pong
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward room events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_dispatcher = dispatcher.clone();
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_dispatcher, &engine, &recv_session, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_session.username,
                            recv_session.user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        recv_dispatcher
                            .send_to_connection(
                                recv_session.conn_id,
                                ServerEvent::error(format!("Missing or malformed fields: {}", e)),
                            )
                            .await;
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id).await;
    info!("{} ({}) disconnected from gateway", session.username, session.user_id);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize {} event: {}", event.name(), e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Text for an `error` event. Internal failures are logged, not leaked.
fn error_text(err: &EngineError, fallback: &str) -> String {
    match err {
        EngineError::Internal(e) => {
            error!("{}: {:#}", fallback, e);
            fallback.to_string()
        }
        EngineError::AlreadyRevealed => "Chat already revealed".to_string(),
        other => other.to_string(),
    }
}

/// Payload ids must name the socket's own user.
fn claims_self(session: &Session, claimed: Uuid) -> bool {
    if claimed != session.user_id {
        warn!(
            "{} ({}) sent a command on behalf of {}",
            session.username, session.user_id, claimed
        );
        return false;
    }
    true
}

/// Apply one client command. Rejections become an `error` event on this
/// connection only; the socket stays open.
pub async fn handle_command(dispatcher: &Dispatcher, engine: &Engine, session: &Session, cmd: ClientCommand) {
    let reply = move |event: ServerEvent| dispatcher.send_to_connection(session.conn_id, event);

    match cmd {
        ClientCommand::Identify { .. } => {} // Already handled

        ClientCommand::JoinChat(chat_id) => {
            let user_id = session.user_id;
            match engine.blocking(move |e| e.is_participant(chat_id, user_id)).await {
                Ok(true) => {
                    dispatcher.join_chat_room(session.conn_id, chat_id).await;
                    info!("{} ({}) joined chat {}", session.username, session.user_id, chat_id);
                }
                Ok(false) => reply(ServerEvent::error("You are not a participant in this chat")).await,
                Err(e) => reply(ServerEvent::error(error_text(&e, "Failed to join chat"))).await,
            }
        }

        ClientCommand::LeaveChat(chat_id) => {
            dispatcher.leave_chat_room(session.conn_id, chat_id).await;
            info!("{} ({}) left chat {}", session.username, session.user_id, chat_id);
        }

        ClientCommand::NewMessage { chat_id, text, sender_id } => {
            if !claims_self(session, sender_id) {
                return reply(ServerEvent::error("Sender does not match this connection")).await;
            }
            if let Err(e) = engine.blocking(move |e| e.send_message(chat_id, sender_id, &text)).await {
                reply(ServerEvent::error(error_text(&e, "Failed to send message"))).await;
            }
        }

        ClientCommand::GuessSubmit { chat_id, guess, user_id } => {
            if !claims_self(session, user_id) {
                return reply(ServerEvent::error("User does not match this connection")).await;
            }
            if let Err(e) = engine.blocking(move |e| e.submit_guess(chat_id, user_id, &guess)).await {
                reply(ServerEvent::error(error_text(&e, "Failed to submit guess"))).await;
            }
        }

        ClientCommand::Typing { user_id, .. } | ClientCommand::StopTyping { user_id, .. }
            if !claims_self(session, user_id) =>
        {
            reply(ServerEvent::error("User does not match this connection")).await
        }

        ClientCommand::Typing { chat_id, user_id } => {
            if dispatcher.in_chat_room(session.conn_id, chat_id).await {
                let event = ServerEvent::UserTyping { chat_id, user_id };
                dispatcher.publish_to_chat(chat_id, event, Some(session.conn_id)).await;
            }
        }

        ClientCommand::StopTyping { chat_id, user_id } => {
            if dispatcher.in_chat_room(session.conn_id, chat_id).await {
                let event = ServerEvent::UserStopTyping { chat_id, user_id };
                dispatcher.publish_to_chat(chat_id, event, Some(session.conn_id)).await;
            }
        }

        ClientCommand::JoinNotifications(user_id) => {
            if !claims_self(session, user_id) {
                return reply(ServerEvent::error("Cannot join another user's notifications")).await;
            }
            dispatcher.join_notifications(session.conn_id).await;
            info!("{} ({}) joined notification room", session.username, user_id);
            reply(ServerEvent::NotificationRoomJoined {
                user_id,
                message: "Successfully joined notification room".to_string(),
            })
            .await;
        }

        ClientCommand::LeaveNotifications(user_id) => {
            if claims_self(session, user_id) {
                dispatcher.leave_notifications(session.conn_id).await;
            }
        }

        ClientCommand::MarkNotificationRead { notification_id, user_id } => {
            if !claims_self(session, user_id) {
                return reply(ServerEvent::error("Notification not found")).await;
            }
            match engine
                .blocking(move |e| e.mark_notification_read(notification_id, user_id))
                .await
            {
                Ok(_) => {
                    reply(ServerEvent::NotificationMarkedRead { notification_id, success: true }).await
                }
                Err(e) => {
                    reply(ServerEvent::error(error_text(&e, "Failed to mark notification as read"))).await
                }
            }
        }
    }
}
