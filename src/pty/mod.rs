//! PTY Channel: owns one spawned shell process, its PTY, the VT emulator
//! wrapped around it, and the subscriber fan-out bus.
//!
//! Grounded on the teacher's `agent::pty` family (`PtySession`,
//! `agent::pty::server::spawn_server_pty`, `agent::pty::events`), replaced
//! with the spec's bounded-channel-with-drop-counter fan-out
//! (`pty::subscriber`) instead of `tokio::sync::broadcast`, and a real
//! `vte`-backed VT emulator instead of the `vt100` crate the teacher wraps.

pub mod spawn;
pub mod subscriber;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use portable_pty::{Child, MasterPty, PtySize};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::ids::{ClientId, PtyId};
use crate::vt::cell::Cell;
use crate::vt::VtEmulator;
use subscriber::{Subscriber, SubscriberReceiver};

/// Maximum bytes read from the PTY per producer iteration.
const READ_CHUNK_SIZE: usize = 32 * 1024;

/// Poll interval for the VT→PTY reply-forwarding task.
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Callback invoked once the owning process exits and cleanup has run.
pub type OnExit = Box<dyn Fn(&PtyId, Option<i32>) + Send + Sync>;

/// Serializable snapshot of a PTY's VT state, for `GetTerminalState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalState {
    pub width: u16,
    pub height: u16,
    pub cursor_x: u16,
    pub cursor_y: u16,
    pub cursor_hidden: bool,
    pub alt_screen: bool,
    pub modes: Vec<u16>,
    pub rows: Vec<Vec<Cell>>,
    pub scrollback: Option<Vec<Vec<Cell>>>,
}

struct Inner {
    id: PtyId,
    vt: StdMutex<VtEmulator>,
    writer: StdMutex<Box<dyn std::io::Write + Send>>,
    master: StdMutex<Box<dyn MasterPty + Send>>,
    child: StdMutex<Box<dyn Child + Send>>,
    dims: StdMutex<(u16, u16)>,
    exited: AtomicBool,
    subscribers: AsyncMutex<HashMap<ClientId, Subscriber>>,
    on_exit: StdMutex<Option<OnExit>>,
    subscriber_channel_depth: usize,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

/// A PTY Channel: spawned shell + PTY + VT emulator + subscriber fan-out.
#[derive(Clone)]
pub struct PtyChannel {
    inner: Arc<Inner>,
}

impl PtyChannel {
    /// Spawn a shell with a controlling terminal and start the producer,
    /// reply-forwarding, and process-wait tasks.
    pub fn open(
        shell: &str,
        cwd: PathBuf,
        env: HashMap<String, String>,
        width: u16,
        height: u16,
        scrollback_max_lines: usize,
        subscriber_channel_depth: usize,
    ) -> Result<Self> {
        let id = PtyId::generate();
        let pair = spawn::open_pty(height, width)?;
        let cmd = spawn::build_shell_command(shell, &cwd, &env, &id);
        let child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn shell in PTY")?;
        let writer = pair.master.take_writer().context("failed to take PTY writer")?;
        let reader = pair
            .master
            .try_clone_reader()
            .context("failed to clone PTY reader")?;

        let vt = VtEmulator::new(width, height, scrollback_max_lines);

        let inner = Arc::new(Inner {
            id: id.clone(),
            vt: StdMutex::new(vt),
            writer: StdMutex::new(writer),
            master: StdMutex::new(pair.master),
            child: StdMutex::new(child),
            dims: StdMutex::new((width, height)),
            exited: AtomicBool::new(false),
            subscribers: AsyncMutex::new(HashMap::new()),
            on_exit: StdMutex::new(None),
            subscriber_channel_depth: subscriber_channel_depth.max(1),
            tasks: StdMutex::new(Vec::new()),
        });

        let channel = Self { inner };
        channel.spawn_producer(reader);
        channel.spawn_reply_forwarder();
        channel.spawn_wait_task();
        Ok(channel)
    }

    #[must_use]
    pub fn id(&self) -> &PtyId {
        &self.inner.id
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.inner.exited.load(Ordering::Acquire)
    }

    /// One producer task: read the PTY, feed the VT emulator, fan out the
    /// same bytes to every subscriber. Runs on a dedicated OS thread because
    /// `portable_pty`'s reader is a blocking `Read`.
    fn spawn_producer(&self, mut reader: Box<dyn std::io::Read + Send>) {
        let inner = Arc::clone(&self.inner);
        let (chunk_tx, mut chunk_rx) = tokio::sync::mpsc::unbounded_channel::<Bytes>();

        let fanout_inner = Arc::clone(&inner);
        let fanout = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                let subs = fanout_inner.subscribers.lock().await;
                for sub in subs.values() {
                    sub.enqueue(chunk.clone()).await;
                }
            }
        });
        self.inner.tasks.lock().expect("tasks lock poisoned").push(fanout);

        std::thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        {
                            let mut vt = inner.vt.lock().expect("vt lock poisoned");
                            vt.write(&buf[..n]);
                        }
                        let _ = chunk_tx.send(Bytes::copy_from_slice(&buf[..n]));
                    }
                    Err(e) => {
                        log::warn!("[pty:{}] reader error: {e}", inner.id);
                        break;
                    }
                }
            }
            log::debug!("[pty:{}] producer thread exiting", inner.id);
        });
    }

    /// One task that continuously drains bytes the VT emulator wants to
    /// send upstream (device query responses, mouse encodings) and forwards
    /// them to the PTY master.
    fn spawn_reply_forwarder(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                if inner.exited.load(Ordering::Acquire) {
                    break;
                }
                let n = {
                    let mut vt = inner.vt.lock().expect("vt lock poisoned");
                    vt.read(&mut buf)
                };
                if n > 0 {
                    let mut writer = inner.writer.lock().expect("writer lock poisoned");
                    if let Err(e) = std::io::Write::write_all(&mut *writer, &buf[..n]) {
                        log::warn!("[pty:{}] failed to forward VT reply: {e}", inner.id);
                        break;
                    }
                } else {
                    tokio::time::sleep(REPLY_POLL_INTERVAL).await;
                }
            }
        });
        self.inner.tasks.lock().expect("tasks lock poisoned").push(handle);
    }

    /// One task that waits for the child process, then runs the exit path:
    /// mark exited, invoke the on-exit callback, close all subscribers.
    fn spawn_wait_task(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let wait_inner = Arc::clone(&inner);
            let exit_code = tokio::task::spawn_blocking(move || {
                let mut child = wait_inner.child.lock().expect("child lock poisoned");
                match child.wait() {
                    Ok(status) => {
                        if status.success() {
                            Some(0)
                        } else {
                            Some(status.exit_code() as i32)
                        }
                    }
                    Err(e) => {
                        log::warn!("[pty] wait() failed: {e}");
                        None
                    }
                }
            })
            .await
            .unwrap_or(None);

            inner.exited.store(true, Ordering::Release);

            {
                let subs = inner.subscribers.lock().await;
                for sub in subs.values() {
                    sub.close();
                }
            }

            if let Some(cb) = inner.on_exit.lock().expect("on_exit lock poisoned").as_ref() {
                cb(&inner.id, exit_code);
            }
            log::info!("[pty:{}] process exited, code={:?}", inner.id, exit_code);
        });
        self.inner.tasks.lock().expect("tasks lock poisoned").push(handle);
    }

    /// Write bytes straight to the PTY master, retrying on short writes via
    /// `write_all`.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.inner.writer.lock().expect("writer lock poisoned");
        std::io::Write::write_all(&mut *writer, bytes).context("PTY write failed")
    }

    /// Resize the kernel PTY and the VT emulator. The kernel's `TIOCSWINSZ`
    /// ioctl (performed by `portable_pty`) delivers `SIGWINCH` to the
    /// foreground process group itself, satisfying the resize notification
    /// requirement without an explicit signal call.
    pub fn resize(&self, width: u16, height: u16) {
        let width = width.max(1);
        let height = height.max(1);
        {
            let master = self.inner.master.lock().expect("master lock poisoned");
            if let Err(e) = master.resize(PtySize { rows: height, cols: width, pixel_width: 0, pixel_height: 0 }) {
                log::warn!("[pty:{}] kernel resize failed: {e}", self.inner.id);
            }
        }
        self.inner.vt.lock().expect("vt lock poisoned").resize(width, height);
        *self.inner.dims.lock().expect("dims lock poisoned") = (width, height);
    }

    #[must_use]
    pub fn dims(&self) -> (u16, u16) {
        *self.inner.dims.lock().expect("dims lock poisoned")
    }

    /// Register a subscriber. Idempotent: re-subscribing the same client
    /// closes the prior registration and issues a fresh receiver.
    pub async fn subscribe(&self, client_id: ClientId) -> SubscriberReceiver {
        let (sub, recv) = Subscriber::new(client_id.clone(), self.inner.subscriber_channel_depth);
        let mut subs = self.inner.subscribers.lock().await;
        if let Some(old) = subs.insert(client_id, sub) {
            old.close();
        }
        recv
    }

    pub async fn unsubscribe(&self, client_id: &ClientId) {
        let mut subs = self.inner.subscribers.lock().await;
        if let Some(sub) = subs.remove(client_id) {
            sub.close();
        }
    }

    /// Register the on-exit callback. Intended to be called exactly once,
    /// by the owning `Session`.
    pub fn set_on_exit(&self, callback: OnExit) {
        *self.inner.on_exit.lock().expect("on_exit lock poisoned") = Some(callback);
    }

    #[must_use]
    pub fn get_terminal_state(&self, include_scrollback: bool) -> TerminalState {
        let vt = self.inner.vt.lock().expect("vt lock poisoned");
        let (width, height) = (vt.width(), vt.height());
        let rows = vt.screen_rows();
        let (cursor_x, cursor_y) = vt.cursor_position();

        let scrollback = if include_scrollback {
            Some(
                (0..vt.scrollback_len())
                    .filter_map(|i| vt.scrollback_line(i).map(<[Cell]>::to_vec))
                    .collect(),
            )
        } else {
            None
        };

        TerminalState {
            width,
            height,
            cursor_x,
            cursor_y,
            cursor_hidden: vt.is_cursor_hidden(),
            alt_screen: vt.is_alt_screen(),
            modes: vt.get_modes().into_iter().collect(),
            rows,
            scrollback,
        }
    }

    /// Grace window between asking the shell to exit and force-killing it.
    const CLOSE_GRACE: Duration = Duration::from_millis(200);

    /// Close the PTY: give the shell a short grace window to exit on its
    /// own, then kill it if it is still running, and abort the PTY's tasks.
    /// Runs off-thread so callers never block on the grace window.
    pub fn close(&self) {
        self.inner.exited.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        std::thread::spawn(move || {
            std::thread::sleep(Self::CLOSE_GRACE);
            let mut child = inner.child.lock().expect("child lock poisoned");
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.kill();
                }
            }
        });

        for handle in self.inner.tasks.lock().expect("tasks lock poisoned").drain(..) {
            handle.abort();
        }
    }
}
