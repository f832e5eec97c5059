//! Outbound command writer.
//!
//! Frames are split into MTU-sized chunks at enqueue time and drained one
//! transport write at a time. A drain pass pops up to two queued chunks whose
//! combined size fits the MTU and issues them as a single payload; the
//! two-chunk cap is specified device behavior and is kept even when more
//! headroom remains. The in-flight flag guarantees a single outstanding
//! write per session; it is released 25 ms after the write acknowledgment to
//! absorb transport-internal notification reordering.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, error, warn};

use super::SessionShared;
use crate::core::constants::MAX_COALESCED_CHUNKS;
use crate::gatt::Channel;

fn hex_str(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SessionShared {
    /// Split `frame` into MTU-sized chunks, append them to the pending
    /// queue in order, and attempt a drain.
    pub(crate) fn enqueue_frame(self: &Arc<Self>, frame: &[u8]) {
        if frame.is_empty() {
            return;
        }
        let mtu = self.mtu.load(Ordering::Acquire).max(1);
        {
            let mut queue = self.queue.lock().unwrap();
            for chunk in frame.chunks(mtu) {
                queue.push_back(chunk.to_vec());
            }
        }
        self.pump_writes();
    }

    /// One drain pass.
    ///
    /// No-op unless the peer permits sending, the queue is non-empty, and
    /// the in-flight flag can be acquired. Re-invoked after every write
    /// settles, after a flow-control resume, and after every enqueue, so the
    /// queue keeps draining until empty or blocked.
    pub(crate) fn pump_writes(self: &Arc<Self>) {
        let can_send = self.flow.can_send();
        let queued = self.queue.lock().unwrap().len();

        if can_send
            && queued > 0
            && self
                .writing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            let payload = self.pop_payload();
            if payload.is_empty() {
                // Raced with a concurrent drain; nothing left to carry.
                self.writing.store(false, Ordering::Release);
                self.queue_drained.notify_waiters();
                return;
            }
            debug!("[{}] write rx: {}", self.address, hex_str(&payload));
            let shared = Arc::clone(self);
            self.runtime.spawn(async move {
                shared.send_payload(payload).await;
            });
        } else {
            debug!("[{}] stacking, {queued} chunk(s) pending", self.address);
            if !can_send {
                debug!("[{}] flow control busy", self.address);
            }
            if queued == 0 {
                self.queue_drained.notify_waiters();
            }
        }
    }

    /// Pop up to [`MAX_COALESCED_CHUNKS`] chunks whose combined size fits
    /// the MTU and concatenate them into one payload.
    fn pop_payload(&self) -> Vec<u8> {
        let mtu = self.mtu.load(Ordering::Acquire);
        let mut queue = self.queue.lock().unwrap();
        let mut payload = Vec::new();
        let mut taken = 0;
        while taken < MAX_COALESCED_CHUNKS {
            match queue.front() {
                Some(front) if payload.len() + front.len() <= mtu => {
                    payload.extend_from_slice(front);
                    queue.pop_front();
                    taken += 1;
                }
                _ => break,
            }
        }
        if queue.is_empty() {
            self.queue_drained.notify_waiters();
        }
        payload
    }

    /// Issue one transport write, retrying on synchronous rejection.
    ///
    /// On success the next drain is driven by the write-completion event.
    /// On exhaustion the payload is dropped (not re-queued) and the writer
    /// is released so the rest of the queue can still drain.
    async fn send_payload(self: Arc<Self>, payload: Vec<u8>) {
        let limit = self.config.write_retry_limit;
        for attempt in 1..=limit {
            if self
                .transport
                .write_characteristic(Channel::CommandRx, &payload)
            {
                return;
            }
            warn!(
                "[{}] transport rejected command write ({attempt}/{limit}): {}",
                self.address,
                hex_str(&payload)
            );
            if attempt < limit {
                tokio::time::sleep(self.config.write_retry_delay).await;
            }
        }
        error!(
            "[{}] abandoning payload after {limit} attempts: {}",
            self.address,
            hex_str(&payload)
        );
        self.writing.store(false, Ordering::Release);
        self.pump_writes();
    }

    /// Write-completion handling: settle, release the in-flight flag, and
    /// drain again.
    pub(crate) fn on_command_write_complete(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(shared.config.settle_delay).await;
            shared.writing.store(false, Ordering::Release);
            shared.pump_writes();
        });
    }

    /// Wait until the queue is empty and no write is in flight.
    ///
    /// Each wait iteration is bounded by the configured flush timeout;
    /// timing out returns without error, a best-effort wait rather than a
    /// guarantee.
    pub(crate) async fn flush_writes(&self) {
        loop {
            let drained = self.queue_drained.notified();
            if self.is_drained() {
                return;
            }
            if tokio::time::timeout(self.config.flush_timeout, drained)
                .await
                .is_err()
            {
                warn!(
                    "[{}] timed out waiting for write queue flush",
                    self.address
                );
                return;
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.queue.lock().unwrap().is_empty() && !self.writing.load(Ordering::Acquire)
    }
}
