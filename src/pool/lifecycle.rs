use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Checkout accounting shared by every lease of one connection source.
///
/// Every `checkout` is matched by exactly one `checkin`, which the lease
/// performs when it is dropped, so failed jobs return capacity too.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    closed: AtomicBool,
    checked_out: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
    drained: Notify,
}

impl Lifecycle {
    pub(crate) fn checkout(&self) {
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn checkin(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.checked_out.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    pub(crate) fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }

    pub(crate) fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop new checkouts. Returns true for the call that actually closed.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Resolve once nothing is checked out.
    pub(crate) async fn wait_drained(&self) {
        loop {
            // Registered before the check so a checkin in between is not missed.
            let notified = self.drained.notified();
            if self.checked_out() == 0 {
                return;
            }
            notified.await;
        }
    }
}
