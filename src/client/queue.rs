use std::collections::VecDeque;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify};

/// Addresses waiting for a free worker slot.
///
/// Filled by the tracker loop, drained by every worker. `in_flight` counts addresses
/// handed out whose connection has not been torn down yet.
#[derive(Debug, Default)]
pub struct PeerQueue {
    addresses: Mutex<VecDeque<SocketAddrV4>>,
    available: Notify,
    in_flight: AtomicUsize,
}

impl PeerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops whatever is still queued and enqueues a fresh tracker list.
    pub async fn replace(&self, addresses: impl IntoIterator<Item = SocketAddrV4>) {
        {
            let mut queue = self.addresses.lock().await;
            queue.clear();
            queue.extend(addresses);
        }
        self.available.notify_waiters();
    }

    /// Takes the next address, waiting until one is queued.
    pub async fn acquire(&self) -> SocketAddrV4 {
        loop {
            // Register interest before looking so a refill between the check and the
            // await still wakes us
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(addr) = self.addresses.lock().await.pop_front() {
                self.in_flight.fetch_add(1, Ordering::Relaxed);
                return addr;
            }

            notified.await;
        }
    }

    /// Marks an acquired address as finished with.
    pub fn task_done(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub async fn len(&self) -> usize {
        self.addresses.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}
