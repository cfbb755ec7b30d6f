//! Message dispatch table: one handler per client-originated message.
//!

use std::sync::Arc;

use anyhow::Result;

use crate::error::DaemonError;
use crate::ids::PtyId;
use crate::session::SessionHints;
use crate::wire::framing::{decode_raw_pty_payload, RawFrame};
use crate::wire::message::{message_type, Message, PtySummary};

use super::connection::ConnectionState;
use super::{ClientHandle, Daemon};

/// Decode one frame into a [`Message`] and run its handler.
pub async fn handle_frame(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    frame: RawFrame,
) -> Result<()> {
    let msg = if frame.msg_type == message_type::INPUT {
        let (pty_id, data) = decode_raw_pty_payload(&frame.payload)?;
        Message::Input { pty_id, data: data.to_vec() }
    } else if frame.msg_type == message_type::PTY_OUTPUT {
        reply_error(daemon, handle, DaemonError::Protocol).await;
        return Ok(());
    } else {
        handle.codec.decode(&frame.payload)?
    };
    handle_message(daemon, handle, conn, msg).await
}

async fn reply(daemon: &Daemon, handle: &ClientHandle, msg: Message) {
    if let Err(e) = daemon.send_to(handle, &msg).await {
        log::warn!("failed to send {:?} reply: {e}", msg.wire_type());
    }
}

async fn reply_error(daemon: &Daemon, handle: &ClientHandle, err: DaemonError) {
    reply(daemon, handle, Message::Error { code: err.code().to_string(), message: err.to_string() }).await;
}

/// The connection's attached session, or `None` if it was killed out from
/// under this connection by another client. `handle.session_id` is cleared
/// by `handle_kill` for every client attached to the killed session, but
/// only the killer's own `ConnectionState` is reachable from that call, so
/// every other handler re-checks the shared flag here before trusting its
/// locally cached `Arc<Session>`.
fn current_session(handle: &ClientHandle, conn: &mut ConnectionState) -> Option<Arc<crate::session::Session>> {
    if let Some(session) = conn.session.as_ref() {
        if handle.attached_session() != Some(session.id()) {
            conn.session = None;
        }
    }
    conn.session.clone()
}

async fn handle_message(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    msg: Message,
) -> Result<()> {
    match msg {
        Message::Attach { name, create_new, width, height } => {
            handle_attach(daemon, handle, conn, name, create_new, width, height).await;
        }
        Message::Detach => handle_detach(daemon, handle, conn).await,
        Message::New { name, width, height } => {
            handle_new(daemon, handle, name, width, height).await;
        }
        Message::List => {
            let sessions = daemon.sessions.list().into_iter().map(Into::into).collect();
            reply(daemon, handle, Message::SessionList { sessions }).await;
        }
        Message::Kill { name } => handle_kill(daemon, handle, conn, name).await,
        Message::CreatePTY { title, width, height } => {
            handle_create_pty(daemon, handle, conn, title, width, height).await;
        }
        Message::ClosePTY { pty_id } => handle_close_pty(daemon, handle, conn, pty_id).await,
        Message::ListPTYs => handle_list_ptys(daemon, handle, conn).await,
        Message::SubscribePTY { pty_id } => handle_subscribe_pty(daemon, handle, conn, pty_id).await,
        Message::GetTerminalState { pty_id, include_scrollback } => {
            handle_get_terminal_state(daemon, handle, conn, pty_id, include_scrollback).await;
        }
        Message::Input { pty_id, data } => handle_input(daemon, handle, conn, &pty_id, &data).await,
        Message::Resize { pty_id: _, width, height } => handle_resize(daemon, handle, conn, width, height).await,
        Message::GetState => handle_get_state(daemon, handle, conn).await,
        Message::UpdateState { state, .. } => handle_update_state(daemon, handle, conn, state).await,
        Message::Ping => reply(daemon, handle, Message::Pong).await,
        Message::ForceRefresh => handle_force_refresh(daemon, handle, conn).await,

        // Server-only-originated messages received from a client are a
        // protocol violation.
        Message::Hello { .. }
        | Message::Welcome { .. }
        | Message::Attached { .. }
        | Message::Detached
        | Message::SessionList { .. }
        | Message::SessionEnded { .. }
        | Message::PTYCreated { .. }
        | Message::PTYClosed { .. }
        | Message::PTYList { .. }
        | Message::TerminalState { .. }
        | Message::PTYOutput { .. }
        | Message::StateData { .. }
        | Message::Pong
        | Message::Error { .. }
        | Message::ClientJoined { .. }
        | Message::ClientLeft { .. }
        | Message::SessionResize { .. } => {
            reply_error(daemon, handle, DaemonError::Protocol).await;
        }
    }
    Ok(())
}

async fn handle_attach(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    name: String,
    create_new: bool,
    width: u16,
    height: u16,
) {
    let hints = SessionHints::default();
    let session = if name.is_empty() {
        daemon.sessions.default_session(hints, width, height)
    } else if create_new {
        match daemon.sessions.create(name.clone(), hints, width, height) {
            Ok(session) => session,
            Err(e) => return reply_error(daemon, handle, e).await,
        }
    } else {
        daemon.sessions.get_or_create(&name, hints, width, height)
    };

    let session_id = session.id();
    let session_name = session.name().to_string();
    let before = session.effective_size();
    let after = session.set_client_size(conn.client_id.clone(), width, height);
    *handle.session_id.lock().expect("session_id lock poisoned") = Some(session_id);
    let state = session.get_state();
    conn.session = Some(session);

    reply(daemon, handle, Message::Attached { session_id, session_name, state }).await;
    daemon
        .broadcast_to_session(session_id, Some(&conn.client_id), Message::ClientJoined { client_id: conn.client_id.clone() })
        .await;
    if before != after {
        daemon
            .broadcast_to_session(session_id, None, Message::SessionResize { width: after.0, height: after.1 })
            .await;
    }
}

/// Create a session (failing on name collision) and echo the updated
/// session list. Unlike `Attach`, this never binds the connection to the
/// created session — a client that wants to use it sends a follow-up
/// `Attach` by name.
async fn handle_new(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, name: Option<String>, width: u16, height: u16) {
    let name = name.unwrap_or_else(|| daemon.sessions.generate_name());
    let hints = SessionHints::default();
    if let Err(e) = daemon.sessions.create(name, hints, width, height) {
        return reply_error(daemon, handle, e).await;
    }
    let sessions = daemon.sessions.list().into_iter().map(Into::into).collect();
    reply(daemon, handle, Message::SessionList { sessions }).await;
}

async fn handle_detach(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState) {
    let Some(session) = conn.session.take() else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    for (pty_id, task) in conn.subscriptions.drain() {
        task.abort();
        if let Some(channel) = session.get_pty(&pty_id) {
            channel.unsubscribe(&conn.client_id).await;
        }
    }
    let before = session.effective_size();
    let after = session.remove_client_size(&conn.client_id);
    *handle.session_id.lock().expect("session_id lock poisoned") = None;
    reply(daemon, handle, Message::Detached).await;
    daemon
        .broadcast_to_session(session.id(), Some(&conn.client_id), Message::ClientLeft { client_id: conn.client_id.clone() })
        .await;
    if before != after {
        daemon
            .broadcast_to_session(session.id(), None, Message::SessionResize { width: after.0, height: after.1 })
            .await;
    }
}

async fn handle_kill(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState, name: String) {
    let Some(session) = daemon.sessions.get(&name) else {
        return reply_error(daemon, handle, DaemonError::SessionNotFound).await;
    };
    let session_id = session.id();
    drop(session);

    daemon
        .broadcast_to_session(session_id, Some(&conn.client_id), Message::SessionEnded { name: name.clone() })
        .await;
    reply(daemon, handle, Message::SessionEnded { name: name.clone() }).await;

    {
        let clients = daemon.clients.lock().await;
        for other in clients.values() {
            if other.attached_session() == Some(session_id) {
                *other.session_id.lock().expect("session_id lock poisoned") = None;
            }
        }
    }
    if conn.session.as_ref().map(|s| s.id()) == Some(session_id) {
        conn.session = None;
    }

    if let Err(e) = daemon.sessions.delete(&name) {
        log::warn!("kill: delete race for session {name}: {e}");
    }
}

async fn handle_create_pty(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    _title: Option<String>,
    _width: u16,
    _height: u16,
) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    let pty_id = match session.create_pty(None) {
        Ok(id) => id,
        Err(e) => {
            log::warn!("CreatePTY failed: {e}");
            return reply_error(daemon, handle, DaemonError::Internal).await;
        }
    };

    if let Some(channel) = session.get_pty(&pty_id) {
        let daemon_for_exit = Arc::clone(daemon);
        let session_id = session.id();
        channel.set_on_exit(Box::new(move |pty_id, exit_code| {
            let daemon_for_exit = Arc::clone(&daemon_for_exit);
            let pty_id = pty_id.clone();
            tokio::spawn(async move {
                daemon_for_exit.broadcast_to_session(session_id, None, Message::PTYClosed { pty_id, exit_code }).await;
            });
        }));
    }

    reply(daemon, handle, Message::PTYCreated { pty_id }).await;
}

async fn handle_close_pty(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState, pty_id: PtyId) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    if let Err(e) = session.close_pty(&pty_id) {
        return reply_error(daemon, handle, e).await;
    }
    conn.subscriptions.remove(&pty_id).map(|task| task.abort());
    daemon
        .broadcast_to_session(session.id(), None, Message::PTYClosed { pty_id, exit_code: None })
        .await;
}

async fn handle_list_ptys(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    let ptys = session
        .list_pty_ids()
        .into_iter()
        .filter_map(|id| {
            let channel = session.get_pty(&id)?;
            let (width, height) = channel.dims();
            Some(PtySummary { id, exited: channel.has_exited(), width, height })
        })
        .collect();
    reply(daemon, handle, Message::PTYList { ptys }).await;
}

async fn handle_subscribe_pty(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState, pty_id: PtyId) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    let Some(channel) = session.get_pty(&pty_id) else {
        return reply_error(daemon, handle, DaemonError::PtyNotFound).await;
    };

    if let Some(old_task) = conn.subscriptions.remove(&pty_id) {
        old_task.abort();
    }

    let mut receiver = channel.subscribe(conn.client_id.clone()).await;
    let daemon_for_task = Arc::clone(daemon);
    let handle_for_task = Arc::clone(handle);
    let task_pty_id = pty_id.clone();
    let task = tokio::spawn(async move {
        while let Some(chunk) = receiver.recv().await {
            if daemon_for_task.send_raw_pty(&handle_for_task, &task_pty_id, &chunk).await.is_err() {
                break;
            }
        }
    });
    conn.subscriptions.insert(pty_id, task);
}

async fn handle_get_terminal_state(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    pty_id: PtyId,
    include_scrollback: bool,
) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    let Some(channel) = session.get_pty(&pty_id) else {
        return reply_error(daemon, handle, DaemonError::PtyNotFound).await;
    };
    let state = channel.get_terminal_state(include_scrollback);
    reply(daemon, handle, Message::TerminalState { pty_id, state }).await;
}

async fn handle_input(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState, pty_id: &PtyId, data: &[u8]) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    let Some(channel) = session.get_pty(pty_id) else {
        return reply_error(daemon, handle, DaemonError::PtyNotFound).await;
    };
    if let Err(e) = channel.write(data) {
        log::warn!("PTY write failed for {pty_id}: {e}");
        reply_error(daemon, handle, DaemonError::Internal).await;
    }
}

/// No direct reply: a client's advertised viewport feeds the same
/// elementwise-minimum negotiation `Attach` does (`Session::set_client_size`),
/// and every PTY in the session is resized to the recomputed effective size
/// rather than to this client's raw request. `SessionResize` is broadcast
/// only when the effective size actually changes.
async fn handle_resize(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState, width: u16, height: u16) {
    let Some(session) = current_session(handle, conn) else {
        return;
    };
    let before = session.effective_size();
    let after = session.set_client_size(conn.client_id.clone(), width, height);
    if before != after {
        daemon
            .broadcast_to_session(session.id(), None, Message::SessionResize { width: after.0, height: after.1 })
            .await;
    }
}

async fn handle_get_state(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState) {
    let Some(session) = current_session(handle, conn) else {
        return reply_error(daemon, handle, DaemonError::NotAttached).await;
    };
    reply(daemon, handle, Message::StateData { state: session.get_state() }).await;
}

async fn handle_update_state(
    daemon: &Arc<Daemon>,
    handle: &Arc<ClientHandle>,
    conn: &mut ConnectionState,
    state: crate::session::state::SessionState,
) {
    let Some(session) = current_session(handle, conn) else {
        return;
    };
    let applied = session.update_state(state);
    daemon
        .broadcast_to_session(session.id(), Some(&conn.client_id), Message::StateData { state: applied })
        .await;
}

async fn handle_force_refresh(daemon: &Arc<Daemon>, handle: &Arc<ClientHandle>, conn: &mut ConnectionState) {
    let Some(session) = current_session(handle, conn) else {
        return;
    };
    daemon.broadcast_to_session(session.id(), Some(&conn.client_id), Message::ForceRefresh).await;
}

/// Run on connection teardown: unsubscribe from every PTY, drop the
/// client's advertised size from its session, and notify the rest of the
/// session.
pub async fn handle_disconnect(daemon: &Arc<Daemon>, conn: &mut ConnectionState) {
    let Some(session) = conn.session.take() else {
        return;
    };
    for (pty_id, task) in conn.subscriptions.drain() {
        task.abort();
        if let Some(channel) = session.get_pty(&pty_id) {
            channel.unsubscribe(&conn.client_id).await;
        }
    }
    let before = session.effective_size();
    let after = session.remove_client_size(&conn.client_id);
    daemon
        .broadcast_to_session(session.id(), None, Message::ClientLeft { client_id: conn.client_id.clone() })
        .await;
    if before != after {
        daemon
            .broadcast_to_session(session.id(), None, Message::SessionResize { width: after.0, height: after.1 })
            .await;
    }
}
