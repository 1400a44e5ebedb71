// Shared mutable state of the receipt manager.
//
// Everything here is guarded by the single manager lock; nothing in this
// module performs I/O.
use courier_wire::ReadReceipt;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct PendingState {
    // At most one receipt per thread, destined for linked devices.
    pub(crate) linked_device: HashMap<String, ReadReceipt>,
    // Per-sender timestamp batches, append order = event order.
    pub(crate) by_sender: HashMap<String, Vec<u64>>,
    // One timer per debounce window.
    pub(crate) flush_pending: bool,
    // No flush may run before storage indexing completes.
    pub(crate) storage_ready: bool,
    // A flush was requested before readiness; replay it when ready.
    pub(crate) deferred_flush: bool,
    // Cached "sender receipts enabled" setting; None until first load.
    pub(crate) receipts_enabled: Option<bool>,
}

impl PendingState {
    /// Keep only the most relevant receipt per thread: replace unless the
    /// existing timestamp is strictly greater (ties are last-write-wins).
    pub(crate) fn record_linked_device(&mut self, thread_id: &str, receipt: ReadReceipt) {
        match self.linked_device.get(thread_id) {
            Some(existing) if existing.timestamp > receipt.timestamp => {
                // Stale candidate; the newer receipt already covers it.
            }
            _ => {
                self.linked_device.insert(thread_id.to_string(), receipt);
            }
        }
    }

    /// Append a timestamp to the sender's batch, duplicates permitted.
    pub(crate) fn append_sender(&mut self, sender_id: &str, timestamp: u64) {
        self.by_sender
            .entry(sender_id.to_string())
            .or_default()
            .push(timestamp);
    }

    /// Snapshot and clear both pending maps in one step.
    ///
    /// State never outlives a flush cycle; this is not a retry queue.
    pub(crate) fn drain(&mut self) -> (Vec<ReadReceipt>, Vec<(String, Vec<u64>)>) {
        let linked = self.linked_device.drain().map(|(_, r)| r).collect();
        let by_sender = self.by_sender.drain().collect();
        (linked, by_sender)
    }
}
