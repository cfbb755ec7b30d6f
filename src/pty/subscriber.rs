//! Per-subscriber bounded output channel with drop-oldest backpressure.
//!
//! Grounded on the teacher's broadcast-based `PtyEvent` fan-out
//! (`agent::pty::events`), replaced with an explicit bounded mailbox per
//! subscriber so the producer can drop the oldest pending chunk instead of
//! blocking — a slow consumer can never stall the producer or other
//! consumers, which a `tokio::sync::broadcast` lagging receiver does not by
//! itself expose as a per-subscriber counter.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::ids::ClientId;

/// Handle a `PtyChannel` holds for one subscriber. Cheap to clone; the
/// queue and drop counter are shared.
#[derive(Clone)]
pub struct Subscriber {
    pub client_id: ClientId,
    inner: Arc<SubscriberInner>,
}

struct SubscriberInner {
    queue: Mutex<VecDeque<Bytes>>,
    depth: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: mpsc::UnboundedSender<()>,
}

/// Receive half returned by [`Subscriber::new`], used by the per-subscriber
/// stream-forward task to drain chunks.
pub struct SubscriberReceiver {
    inner: Arc<SubscriberInner>,
    notify_rx: mpsc::UnboundedReceiver<()>,
}

impl Subscriber {
    /// Create a subscriber with a bounded queue of `depth` chunks.
    #[must_use]
    pub fn new(client_id: ClientId, depth: usize) -> (Self, SubscriberReceiver) {
        let (notify, notify_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SubscriberInner {
            queue: Mutex::new(VecDeque::with_capacity(depth.min(256))),
            depth: depth.max(1),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify,
        });
        let sub = Self { client_id, inner: Arc::clone(&inner) };
        let recv = SubscriberReceiver { inner, notify_rx };
        (sub, recv)
    }

    /// Enqueue a chunk, dropping the oldest pending chunk if the queue is
    /// full. Never blocks the caller — this runs on the PTY producer task.
    pub async fn enqueue(&self, chunk: Bytes) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let mut queue = self.inner.queue.lock().await;
        if queue.len() >= self.inner.depth {
            queue.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(chunk);
        let _ = self.inner.notify.send(());
    }

    /// Mark this subscriber closed (PTY exited or explicit unsubscribe).
    /// Wakes a blocked `recv()` so it observes end-of-stream.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let _ = self.inner.notify.send(());
    }

    /// Number of chunks dropped for this subscriber due to backpressure.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl SubscriberReceiver {
    /// Wait for and return the next chunk, or `None` once the subscriber
    /// channel has been closed and fully drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            if let Some(chunk) = self.inner.queue.lock().await.pop_front() {
                return Some(chunk);
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            let _ = self.notify_rx.recv().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid() -> ClientId {
        ClientId::generate()
    }

    #[tokio::test]
    async fn test_enqueue_then_recv_in_order() {
        let (sub, mut recv) = Subscriber::new(cid(), 4);
        sub.enqueue(Bytes::from_static(b"a")).await;
        sub.enqueue(Bytes::from_static(b"b")).await;
        assert_eq!(recv.recv().await.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(recv.recv().await.unwrap(), Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_and_counts() {
        let (sub, mut recv) = Subscriber::new(cid(), 2);
        sub.enqueue(Bytes::from_static(b"1")).await;
        sub.enqueue(Bytes::from_static(b"2")).await;
        sub.enqueue(Bytes::from_static(b"3")).await; // drops "1"
        assert_eq!(sub.dropped_count(), 1);
        assert_eq!(recv.recv().await.unwrap(), Bytes::from_static(b"2"));
        assert_eq!(recv.recv().await.unwrap(), Bytes::from_static(b"3"));
    }

    #[tokio::test]
    async fn test_recv_drains_queue_before_reporting_closed() {
        let (sub, mut recv) = Subscriber::new(cid(), 4);
        sub.enqueue(Bytes::from_static(b"x")).await;
        sub.close();
        assert_eq!(recv.recv().await.unwrap(), Bytes::from_static(b"x"));
        assert!(recv.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_close_with_empty_queue() {
        let (sub, mut recv) = Subscriber::new(cid(), 2);
        sub.close();
        assert!(recv.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_noop() {
        let (sub, mut recv) = Subscriber::new(cid(), 2);
        sub.close();
        sub.enqueue(Bytes::from_static(b"late")).await;
        assert!(recv.recv().await.is_none());
    }
}
