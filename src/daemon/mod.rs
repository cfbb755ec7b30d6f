//! Daemon Server: runs the wire protocol over a local stream socket, routes
//! messages, and fans PTY output to subscribed clients.
//!
//! Grounded on the teacher's `socket::server::SocketServer` for the
//! bind/accept-loop/chmod/stale-socket shape, generalized to a
//! connect-probe stale-socket check (attempt a connection before deleting,
//! rather than always removing) and its own dual reader/writer connection
//! lifecycle.

pub mod connection;
pub mod dispatch;

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::ids::{ClientId, SessionId};
use crate::session::manager::SessionManager;
use crate::wire::codec::Codec;
use crate::wire::framing::RawFrame;
use crate::wire::message::Message;

/// What the daemon knows about one live connection for cross-connection
/// notification fan-out (`ClientJoined`/`ClientLeft`/`SessionResize`/
/// `PTYClosed`). Owned by the daemon's client registry, not the connection
/// task itself — the connection task holds the read half and its own
/// mutable dispatch state.
pub struct ClientHandle {
    pub codec: Arc<dyn Codec>,
    pub writer: Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    pub session_id: StdMutex<Option<SessionId>>,
}

impl ClientHandle {
    #[must_use]
    pub fn attached_session(&self) -> Option<SessionId> {
        *self.session_id.lock().expect("session_id lock poisoned")
    }
}

/// Top-level daemon state: session registry, client registry, and the
/// cancellation signal every task honors.
pub struct Daemon {
    pub config: Config,
    pub sessions: SessionManager,
    pub clients: AsyncMutex<HashMap<ClientId, Arc<ClientHandle>>>,
    pub cancel: CancellationToken,
}

impl Daemon {
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        let sessions = SessionManager::new(config.scrollback_max_lines, config.subscriber_channel_depth);
        Arc::new(Self { config, sessions, clients: AsyncMutex::new(HashMap::new()), cancel: CancellationToken::new() })
    }

    /// Encode and write one message to a single client, enforcing the write
    /// deadline. A write failure or timeout is reported to
    /// the caller, who is expected to tear the connection down.
    pub async fn send_to(&self, handle: &ClientHandle, msg: &Message) -> Result<()> {
        let payload = handle.codec.encode(msg)?;
        let frame = RawFrame::new(handle.codec.tag(), msg.wire_type(), payload);
        let bytes = frame.encode()?;
        write_framed(&handle.writer, &bytes).await
    }

    /// Send `msg` to every client currently attached to `session_id`,
    /// except `exclude` if given. Each send runs on its own task so one
    /// slow client cannot delay delivery to the others.
    pub async fn broadcast_to_session(
        self: &Arc<Self>,
        session_id: SessionId,
        exclude: Option<&ClientId>,
        msg: Message,
    ) {
        let targets: Vec<Arc<ClientHandle>> = {
            let clients = self.clients.lock().await;
            clients
                .iter()
                .filter(|(id, handle)| handle.attached_session() == Some(session_id) && Some(id) != exclude)
                .map(|(_, handle)| Arc::clone(handle))
                .collect()
        };
        for handle in targets {
            let daemon = Arc::clone(self);
            let msg = msg.clone();
            tokio::spawn(async move {
                if let Err(e) = daemon.send_to(&handle, &msg).await {
                    log::warn!("broadcast send failed: {e}");
                }
            });
        }
    }

    /// Run the accept loop until the cancellation token fires, then run the
    /// shutdown sequence.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = bind_listener(&self.config.socket_path)?;
        write_pid_file(&self.config.pid_file)?;
        install_signal_handlers(Arc::clone(&self));

        let cleanup_daemon = Arc::clone(&self);
        let cleanup_cancel = self.cancel.clone();
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(crate::config::CLEANUP_INTERVAL_SECS);
            loop {
                tokio::select! {
                    () = cleanup_cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        log::debug!("cleanup tick: {} sessions", cleanup_daemon.sessions.list().len());
                    }
                }
            }
        });

        log::info!("daemon listening on {}", self.config.socket_path.display());

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let daemon = Arc::clone(&self);
                            tokio::spawn(async move { connection::handle_connection(daemon, stream).await });
                        }
                        Err(e) => log::error!("accept error: {e}"),
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close every connection, tear down the session registry, and remove
    /// the socket/pid files.
    async fn shutdown(&self) {
        log::info!("daemon shutting down");
        {
            let mut clients = self.clients.lock().await;
            for (_, handle) in clients.drain() {
                let mut writer = handle.writer.lock().await;
                let _ = tokio::io::AsyncWriteExt::shutdown(&mut *writer).await;
            }
        }
        self.sessions.shutdown();
        let _ = std::fs::remove_file(&self.config.socket_path);
        let _ = std::fs::remove_file(&self.config.pid_file);
    }
}

/// Resolve, probe, and bind the listener socket. If a socket file exists
/// and accepts a connection, another daemon is live and startup fails;
/// otherwise the stale file is removed.
fn bind_listener(socket_path: &Path) -> Result<UnixListener> {
    if socket_path.exists() {
        match std::os::unix::net::UnixStream::connect(socket_path) {
            Ok(_) => anyhow::bail!("another daemon is already listening on {}", socket_path.display()),
            Err(_) => {
                std::fs::remove_file(socket_path)
                    .with_context(|| format!("failed to remove stale socket {}", socket_path.display()))?;
            }
        }
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create socket directory {}", parent.display()))?;
    }
    let std_listener = std::os::unix::net::UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind socket {}", socket_path.display()))?;
    std_listener.set_nonblocking(true)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    UnixListener::from_std(std_listener).context("failed to adopt socket into tokio runtime")
}

fn write_pid_file(pid_file: &Path) -> Result<()> {
    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(pid_file, std::process::id().to_string())
        .with_context(|| format!("failed to write pid file {}", pid_file.display()))
}

fn install_signal_handlers(daemon: Arc<Daemon>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = term.recv() => log::info!("received SIGTERM"),
            _ = int.recv() => log::info!("received SIGINT"),
        }
        daemon.cancel.cancel();
    });
}

impl Daemon {
    /// Encode and send a `PTYOutput` frame using the raw sub-format
    /// regardless of the client's negotiated codec —
    /// `Input`/`PTYOutput` payloads always bypass the codec.
    pub async fn send_raw_pty(&self, handle: &ClientHandle, pty_id: &crate::ids::PtyId, data: &[u8]) -> Result<()> {
        let payload = crate::wire::framing::encode_raw_pty_payload(pty_id, data);
        let frame = RawFrame::new(handle.codec.tag(), crate::wire::message::message_type::PTY_OUTPUT, payload);
        let bytes = frame.encode()?;
        write_framed(&handle.writer, &bytes).await
    }
}

async fn write_framed(writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>, bytes: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut guard = writer.lock().await;
    tokio::time::timeout(
        std::time::Duration::from_secs(crate::config::WRITE_DEADLINE_SECS),
        guard.write_all(bytes),
    )
    .await
    .context("write deadline exceeded")??;
    Ok(())
}

