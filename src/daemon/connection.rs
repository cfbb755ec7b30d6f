//! Per-connection lifecycle: `Hello`/`Welcome` handshake, codec negotiation,
//! the frame-read loop, and cleanup on disconnect.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::config::READ_DEADLINE_MS;
use crate::ids::{ClientId, PtyId};
use crate::session::Session;
use crate::wire::codec::{codec_for_tag, negotiate, BinaryCodec, Codec};
use crate::wire::framing::{FrameDecoder, RawFrame};
use crate::wire::message::{message_type, Message};

use super::{ClientHandle, Daemon};
use super::dispatch;

/// Mutable per-connection dispatch state, owned by the connection task
/// alone — never shared across tasks; connection state is mutated only
/// from the reader task.
pub struct ConnectionState {
    pub client_id: ClientId,
    pub session: Option<Arc<Session>>,
    pub subscriptions: HashMap<PtyId, JoinHandle<()>>,
}

impl ConnectionState {
    fn new(client_id: ClientId) -> Self {
        Self { client_id, session: None, subscriptions: HashMap::new() }
    }
}

/// Reads frames off a socket, honoring the daemon's read deadline and
/// cancellation token for liveness
struct FrameReader {
    decoder: FrameDecoder,
    pending: VecDeque<RawFrame>,
}

impl FrameReader {
    fn new() -> Self {
        Self { decoder: FrameDecoder::new(), pending: VecDeque::new() }
    }

    /// Returns the next frame, `None` on clean EOF or daemon shutdown.
    async fn next(
        &mut self,
        reader: &mut OwnedReadHalf,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<Option<RawFrame>> {
        let mut buf = [0u8; 16 * 1024];
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            tokio::select! {
                () = cancel.cancelled() => return Ok(None),
                read_result = tokio::time::timeout(Duration::from_millis(READ_DEADLINE_MS), reader.read(&mut buf)) => {
                    match read_result {
                        Err(_elapsed) => continue,
                        Ok(Ok(0)) => return Ok(None),
                        Ok(Ok(n)) => {
                            let frames = self.decoder.feed(&buf[..n])?;
                            self.pending.extend(frames);
                        }
                        Ok(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }
}

/// Handle one accepted connection end to end: handshake, dispatch loop,
/// cleanup.
pub async fn handle_connection(daemon: Arc<Daemon>, stream: UnixStream) {
    let client_id = ClientId::generate();
    let (mut read_half, write_half) = stream.into_split();
    let writer = Arc::new(AsyncMutex::new(write_half));
    let mut reader = FrameReader::new();

    let Ok(Some(hello_frame)) = reader.next(&mut read_half, &daemon.cancel).await else {
        log::debug!("[{client_id}] disconnected before Hello");
        return;
    };
    if hello_frame.msg_type != message_type::HELLO {
        log::warn!("[{client_id}] first message was not Hello, closing");
        return;
    }

    let handshake_codec = codec_for_tag(hello_frame.codec).unwrap_or_else(|| Box::new(BinaryCodec));
    let preferred = match handshake_codec.decode(&hello_frame.payload) {
        Ok(Message::Hello { preferred_codec, .. }) => preferred_codec,
        _ => {
            log::warn!("[{client_id}] malformed Hello payload, closing");
            return;
        }
    };
    let codec: Arc<dyn Codec> = Arc::from(negotiate(&preferred));

    let handle = Arc::new(ClientHandle {
        codec: Arc::clone(&codec),
        writer: Arc::clone(&writer),
        session_id: StdMutex::new(None),
    });
    daemon.clients.lock().await.insert(client_id.clone(), Arc::clone(&handle));
    log::info!("[{client_id}] connected, codec={}", codec.name());

    let welcome = Message::Welcome {
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: daemon.sessions.list().into_iter().map(Into::into).collect(),
        codec: codec.name().to_string(),
    };
    if daemon.send_to(&handle, &welcome).await.is_err() {
        daemon.clients.lock().await.remove(&client_id);
        return;
    }

    let mut conn = ConnectionState::new(client_id.clone());

    loop {
        let frame = match reader.next(&mut read_half, &daemon.cancel).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::warn!("[{client_id}] frame read error: {e}");
                break;
            }
        };
        if let Err(e) = dispatch::handle_frame(&daemon, &handle, &mut conn, frame).await {
            log::warn!("[{client_id}] dispatch error: {e}");
        }
    }

    dispatch::handle_disconnect(&daemon, &mut conn).await;
    daemon.clients.lock().await.remove(&client_id);
    log::info!("[{client_id}] disconnected");
}
