//! End-to-end protocol scenarios, exercised over a real `UnixListener`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use tuios_daemon::wire::codec::{codec_tag, BinaryCodec, Codec};
use tuios_daemon::wire::framing::{decode_raw_pty_payload, encode_raw_pty_payload, FrameDecoder, RawFrame};
use tuios_daemon::wire::message::{message_type, Message};
use tuios_daemon::{Config, Daemon};

const TIMEOUT: Duration = Duration::from_secs(5);

/// A thin test client: owns a socket and a frame decoder, and knows how to
/// speak the binary codec (the negotiated default).
struct TestClient {
    stream: UnixStream,
    decoder: FrameDecoder,
    codec: BinaryCodec,
    pending: VecDeque<RawFrame>,
}

impl TestClient {
    async fn connect(socket_path: &PathBuf) -> Self {
        let stream = tokio::time::timeout(TIMEOUT, async {
            loop {
                if let Ok(stream) = UnixStream::connect(socket_path).await {
                    return stream;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("daemon never started listening");
        Self { stream, decoder: FrameDecoder::new(), codec: BinaryCodec, pending: VecDeque::new() }
    }

    async fn send(&mut self, msg: &Message) {
        let payload = self.codec.encode(msg).expect("encode");
        let frame = RawFrame::new(codec_tag::BINARY, msg.wire_type(), payload);
        let bytes = frame.encode().expect("frame encode");
        self.stream.write_all(&bytes).await.expect("write");
    }

    async fn send_input(&mut self, pty_id: &tuios_daemon::PtyId, data: &[u8]) {
        let payload = encode_raw_pty_payload(pty_id, data);
        let frame = RawFrame::new(codec_tag::BINARY, message_type::INPUT, payload);
        let bytes = frame.encode().expect("frame encode");
        self.stream.write_all(&bytes).await.expect("write");
    }

    /// Read and decode the next frame, waiting up to `TIMEOUT`.
    async fn recv(&mut self) -> Message {
        tokio::time::timeout(TIMEOUT, self.recv_raw()).await.expect("timed out waiting for a frame")
    }

    /// Read frames until `pred` matches one, ignoring everything else
    /// (used to skip unrelated broadcast frames like `ClientJoined`).
    async fn recv_matching(&mut self, pred: impl Fn(&Message) -> bool) -> Message {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let msg = self.recv_raw().await;
                if pred(&msg) {
                    return msg;
                }
            }
        })
        .await
        .expect("timed out waiting for a matching frame")
    }

    async fn recv_raw(&mut self) -> Message {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                if frame.msg_type == message_type::PTY_OUTPUT {
                    let (pty_id, data) = decode_raw_pty_payload(&frame.payload).expect("raw payload");
                    return Message::PTYOutput { pty_id, data: data.to_vec() };
                }
                return self.codec.decode(&frame.payload).expect("decode");
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await.expect("read");
            assert!(n > 0, "socket closed unexpectedly");
            let frames = self.decoder.feed(&buf[..n]).expect("frame decode");
            self.pending.extend(frames);
        }
    }
}

async fn spawn_daemon() -> PathBuf {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("daemon.sock");
    let pid_file = dir.path().join("daemon.pid");
    let mut config = Config::resolve(Some(socket_path.clone()), true, None);
    config.pid_file = pid_file;
    config.scrollback_max_lines = 200;
    config.subscriber_channel_depth = 64;

    let daemon = Daemon::new(config);
    tokio::spawn(async move {
        let _ = daemon.run().await;
    });
    // Keep the tempdir alive for the process lifetime of the test by
    // leaking it; each test gets its own directory so this is bounded.
    std::mem::forget(dir);
    socket_path
}

async fn hello(client: &mut TestClient) -> Message {
    client
        .send(&Message::Hello { preferred_codec: "binary".to_string(), client_version: "t".to_string() })
        .await;
    client.recv().await
}

#[tokio::test]
async fn attach_creates_a_session() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;

    let welcome = hello(&mut a).await;
    match welcome {
        Message::Welcome { sessions, .. } => assert!(sessions.is_empty()),
        other => panic!("expected Welcome, got {other:?}"),
    }

    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 80, height: 24 }).await;
    match a.recv().await {
        Message::Attached { session_id: _, session_name: _, state } => assert!(state.windows.is_empty()),
        other => panic!("expected Attached, got {other:?}"),
    }
}

#[tokio::test]
async fn pty_echoes_input() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;
    hello(&mut a).await;
    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 80, height: 24 }).await;
    a.recv().await;

    a.send(&Message::CreatePTY { title: Some("t".to_string()), width: 80, height: 24 }).await;
    let pty_id = match a.recv().await {
        Message::PTYCreated { pty_id } => pty_id,
        other => panic!("expected PTYCreated, got {other:?}"),
    };

    a.send(&Message::SubscribePTY { pty_id: pty_id.clone() }).await;
    a.send_input(&pty_id, b"echo hi\n").await;

    let mut seen = Vec::new();
    let found = tokio::time::timeout(TIMEOUT, async {
        loop {
            if let Message::PTYOutput { data, .. } = a.recv().await {
                seen.extend_from_slice(&data);
                if String::from_utf8_lossy(&seen).contains("hi") {
                    return true;
                }
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(found, "expected PTYOutput containing \"hi\", saw: {:?}", String::from_utf8_lossy(&seen));
}

#[tokio::test]
async fn second_client_sees_state_sync() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;
    hello(&mut a).await;
    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 80, height: 24 }).await;
    let session_id = match a.recv().await {
        Message::Attached { session_id, .. } => session_id,
        other => panic!("expected Attached, got {other:?}"),
    };

    a.send(&Message::CreatePTY { title: None, width: 80, height: 24 }).await;
    let pty_id = match a.recv().await {
        Message::PTYCreated { pty_id } => pty_id,
        other => panic!("expected PTYCreated, got {other:?}"),
    };

    let window = tuios_daemon::session::state::Window {
        window_id: "w1".to_string(),
        pty_id,
        title: None,
        x: 10,
        y: 5,
        width: 80,
        height: 24,
        z_order: 0,
        workspace: 1,
        minimized: false,
        snapped: false,
    };
    a.send(&Message::UpdateState {
        state: tuios_daemon::session::state::SessionState { windows: vec![window.clone()], workspace: Default::default() },
        source_client_id: None,
    })
    .await;
    // `UpdateState` only broadcasts to *other* attached clients, so round
    // trip through `GetState` on `a` itself as a synchronization point
    // before a second client attaches.
    a.send(&Message::GetState).await;
    match a.recv_matching(|m| matches!(m, Message::StateData { .. })).await {
        Message::StateData { state } => assert_eq!(state.windows.len(), 1),
        _ => unreachable!(),
    }

    let mut b = TestClient::connect(&socket_path).await;
    hello(&mut b).await;
    b.send(&Message::Attach { name: "work".to_string(), create_new: false, width: 80, height: 24 }).await;
    let state = match b.recv_matching(|m| matches!(m, Message::Attached { .. })).await {
        Message::Attached { session_id: attached_session_id, session_name: _, state } => {
            assert_eq!(attached_session_id, session_id);
            state
        }
        _ => unreachable!(),
    };
    assert_eq!(state.windows.len(), 1);
    assert_eq!(state.windows[0].x, 10);
    assert_eq!(state.windows[0].y, 5);
}

#[tokio::test]
async fn effective_size_is_elementwise_minimum() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;
    hello(&mut a).await;
    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 120, height: 40 }).await;
    a.recv().await;

    let mut b = TestClient::connect(&socket_path).await;
    hello(&mut b).await;
    b.send(&Message::Attach { name: "work".to_string(), create_new: false, width: 80, height: 24 }).await;
    b.recv_matching(|m| matches!(m, Message::Attached { .. })).await;

    let resize_a = a.recv_matching(|m| matches!(m, Message::SessionResize { .. })).await;
    let resize_b = b.recv_matching(|m| matches!(m, Message::SessionResize { .. })).await;
    for resize in [resize_a, resize_b] {
        match resize {
            Message::SessionResize { width, height } => {
                assert_eq!(width, 80);
                assert_eq!(height, 24);
            }
            _ => unreachable!(),
        }
    }
}

#[tokio::test]
async fn pty_exit_notifies_subscribers() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;
    hello(&mut a).await;
    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 80, height: 24 }).await;
    a.recv().await;

    a.send(&Message::CreatePTY { title: None, width: 80, height: 24 }).await;
    let pty_id = match a.recv().await {
        Message::PTYCreated { pty_id } => pty_id,
        other => panic!("expected PTYCreated, got {other:?}"),
    };
    a.send(&Message::SubscribePTY { pty_id: pty_id.clone() }).await;
    a.send_input(&pty_id, b"exit\n").await;

    let closed = a.recv_matching(|m| matches!(m, Message::PTYClosed { .. })).await;
    match closed {
        Message::PTYClosed { pty_id: closed_id, .. } => assert_eq!(closed_id, pty_id),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn kill_session_disconnects_subscribers() {
    let socket_path = spawn_daemon().await;
    let mut a = TestClient::connect(&socket_path).await;
    hello(&mut a).await;
    a.send(&Message::Attach { name: "work".to_string(), create_new: true, width: 80, height: 24 }).await;
    a.recv().await;

    let mut b = TestClient::connect(&socket_path).await;
    hello(&mut b).await;
    b.send(&Message::Attach { name: "work".to_string(), create_new: false, width: 80, height: 24 }).await;
    b.recv_matching(|m| matches!(m, Message::Attached { .. })).await;

    let mut c = TestClient::connect(&socket_path).await;
    hello(&mut c).await;
    c.send(&Message::Kill { name: "work".to_string() }).await;
    c.recv_matching(|m| matches!(m, Message::SessionEnded { .. })).await;

    a.recv_matching(|m| matches!(m, Message::SessionEnded { .. })).await;
    b.recv_matching(|m| matches!(m, Message::SessionEnded { .. })).await;

    a.send(&Message::CreatePTY { title: None, width: 80, height: 24 }).await;
    match a.recv().await {
        Message::Error { code, .. } => assert_eq!(code, "NotAttached"),
        other => panic!("expected Error{{NotAttached}}, got {other:?}"),
    }
}
