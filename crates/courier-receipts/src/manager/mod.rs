// Read-receipt aggregation and delivery manager.
//
// One long-lived instance per process. All shared state lives behind a
// single mutex which is never held across I/O: flushes snapshot-and-clear
// under the lock, then hand the batches to the transport on detached tasks.
use std::sync::Arc;

use parking_lot::Mutex;

use courier_storage::SettingsStore;
use courier_wire::{Envelope, Message, ReadReceipt, ReceiptMessage, ReceiptType};

use crate::collaborators::{ReadMarker, ReceiptTransport, ThreadDirectory};
use crate::config::ReceiptConfig;

use self::pending::PendingState;

mod pending;

pub const READ_RECEIPTS_SETTING_KEY: &str = "areReadReceiptsEnabled";
pub const READ_RECEIPTS_SETTING_COLLECTION: &str = "OWSReadReceiptManagerCollection";

/// Aggregates local read events and delivers them as batched receipts.
///
/// Cloning is cheap; all clones share one pending store and one debounce
/// window. Producers call [`record_local_read`](Self::record_local_read)
/// concurrently from any task; nothing they do blocks on the network.
#[derive(Clone)]
pub struct ReadReceiptManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    // Guards both pending maps, the scheduler flags, and the settings cache.
    state: Mutex<PendingState>,
    config: ReceiptConfig,
    settings: Box<dyn SettingsStore>,
    transport: Arc<dyn ReceiptTransport>,
    directory: Arc<dyn ThreadDirectory>,
    read_marker: Arc<dyn ReadMarker>,
}

impl ReadReceiptManager {
    pub fn new(
        config: ReceiptConfig,
        settings: Box<dyn SettingsStore>,
        transport: Arc<dyn ReceiptTransport>,
        directory: Arc<dyn ThreadDirectory>,
        read_marker: Arc<dyn ReadMarker>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(PendingState::default()),
                config,
                settings,
                transport,
                directory,
                read_marker,
            }),
        }
    }

    /// Whether sender-facing receipts are enabled. Cached after the first
    /// store read; absent values default to disabled.
    pub async fn are_read_receipts_enabled(&self) -> bool {
        if let Some(enabled) = self.inner.state.lock().receipts_enabled {
            return enabled;
        }
        // Load outside the lock; the store may suspend.
        let stored = self
            .inner
            .settings
            .get_bool(READ_RECEIPTS_SETTING_COLLECTION, READ_RECEIPTS_SETTING_KEY)
            .await
            .unwrap_or(false);
        let mut state = self.inner.state.lock();
        // A concurrent set may have cached a fresher value while we loaded.
        *state.receipts_enabled.get_or_insert(stored)
    }

    /// Persist the setting, then update the cache so subsequent reads see
    /// the new value without another store round trip.
    pub async fn set_read_receipts_enabled(&self, enabled: bool) {
        self.inner
            .settings
            .set_bool(
                READ_RECEIPTS_SETTING_COLLECTION,
                READ_RECEIPTS_SETTING_KEY,
                enabled,
            )
            .await;
        self.inner.state.lock().receipts_enabled = Some(enabled);
    }

    /// Record that the local user read a message.
    ///
    /// One atomic state transition under the lock: dedup into the
    /// linked-device map, append to the sender batch if the gate is
    /// enabled, request a debounced flush. Never surfaces errors and never
    /// waits on the network.
    pub async fn record_local_read(&self, thread_id: &str, sender_id: &str, timestamp: u64) {
        if thread_id.is_empty() || sender_id.is_empty() {
            debug_assert!(false, "record_local_read requires non-empty ids");
            tracing::error!(thread_id, sender_id, "dropping read event with empty id");
            return;
        }
        // Warm the settings cache before taking the lock; the gate decision
        // itself is made from the cache under the lock.
        self.are_read_receipts_enabled().await;
        let schedule = {
            let mut state = self.inner.state.lock();
            state.record_linked_device(thread_id, ReadReceipt::new(sender_id, timestamp));
            if state.receipts_enabled.unwrap_or(false) {
                state.append_sender(sender_id, timestamp);
            }
            Self::request_flush_locked(&mut state)
        };
        self.schedule_flush_if(schedule);
    }

    /// Signal from the storage-initialization collaborator that persistent
    /// indexes are ready; replays any flush request made before readiness.
    pub fn mark_storage_ready(&self) {
        let deferred = {
            let mut state = self.inner.state.lock();
            state.storage_ready = true;
            std::mem::take(&mut state.deferred_flush)
        };
        if deferred {
            self.request_flush();
        }
    }

    fn request_flush(&self) {
        let schedule = Self::request_flush_locked(&mut self.inner.state.lock());
        self.schedule_flush_if(schedule);
    }

    // Returns true when the caller must start the one-shot timer.
    fn request_flush_locked(state: &mut PendingState) -> bool {
        if !state.storage_ready {
            state.deferred_flush = true;
            return false;
        }
        if state.flush_pending {
            return false;
        }
        state.flush_pending = true;
        true
    }

    fn schedule_flush_if(&self, schedule: bool) {
        if !schedule {
            return;
        }
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(manager.inner.config.flush_delay).await;
            // Clear before draining: a read event landing during this flush
            // starts the next window instead of silently joining this one.
            manager.inner.state.lock().flush_pending = false;
            manager.flush();
        });
    }

    /// Drain the pending store and dispatch batched receipt messages.
    ///
    /// Only the debounce timer runs the dispatcher; the snapshot-and-clear
    /// is atomic with respect to concurrent producers. Sends run on
    /// detached tasks with logged outcomes, no retries. Empty snapshots
    /// send nothing.
    pub(crate) fn flush(&self) {
        let (linked, by_sender) = self.inner.state.lock().drain();

        if !linked.is_empty() {
            let transport = Arc::clone(&self.inner.transport);
            let count = linked.len();
            tokio::spawn(async move {
                let message = Message::LinkedDeviceReadReceipts { receipts: linked };
                match transport.send_to_linked_devices(message).await {
                    Ok(()) => tracing::debug!(count, "sent linked-device read receipts"),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to send linked-device read receipts");
                    }
                }
            });
        }

        for (sender_id, timestamps) in by_sender {
            if timestamps.is_empty() {
                continue;
            }
            let transport = Arc::clone(&self.inner.transport);
            let directory = Arc::clone(&self.inner.directory);
            tokio::spawn(async move {
                let thread = match directory.thread_for_contact(&sender_id).await {
                    Ok(thread) => thread,
                    Err(err) => {
                        tracing::warn!(error = %err, %sender_id, "failed to resolve receipt thread");
                        return;
                    }
                };
                let count = timestamps.len();
                let message = Message::SenderReadReceipts { timestamps };
                match transport.send_to_thread(&thread, message).await {
                    Ok(()) => tracing::debug!(%sender_id, count, "sent read receipts to sender"),
                    Err(err) => {
                        tracing::warn!(error = %err, %sender_id, "failed to send read receipts to sender");
                    }
                }
            });
        }
    }

    /// Consume a decoded read receipt from a peer and forward its
    /// timestamps, in arrival order, to the read-tracking pipeline.
    pub async fn handle_read_receipt(&self, envelope: &Envelope, receipt: &ReceiptMessage) {
        if receipt.receipt_type != ReceiptType::Read {
            debug_assert!(false, "handle_read_receipt requires a read receipt");
            tracing::error!(
                receipt_type = ?receipt.receipt_type,
                "dropping receipt of unexpected type"
            );
            return;
        }
        if !self.are_read_receipts_enabled().await {
            tracing::debug!(
                source = %envelope.source,
                "read receipts disabled; ignoring inbound receipt"
            );
            return;
        }
        for &timestamp in &receipt.timestamps {
            if let Err(err) = self
                .inner
                .read_marker
                .mark_read_by_peer(&envelope.source, timestamp)
                .await
            {
                tracing::warn!(
                    error = %err,
                    source = %envelope.source,
                    timestamp,
                    "failed to record peer read"
                );
            }
        }
    }

    /// Apply read receipts synced from the user's own linked devices.
    ///
    /// Device sync is unconditional: the settings gate only controls
    /// sender-facing receipts.
    pub async fn handle_linked_device_reads(&self, receipts: &[ReadReceipt]) {
        for receipt in receipts {
            if let Err(err) = self
                .inner
                .read_marker
                .mark_read_locally(&receipt.sender_id, receipt.timestamp)
                .await
            {
                tracing::warn!(
                    error = %err,
                    sender_id = %receipt.sender_id,
                    timestamp = receipt.timestamp,
                    "failed to apply linked-device read"
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_linked_device(&self) -> std::collections::HashMap<String, ReadReceipt> {
        self.inner.state.lock().linked_device.clone()
    }

    #[cfg(test)]
    pub(crate) fn pending_by_sender(&self) -> std::collections::HashMap<String, Vec<u64>> {
        self.inner.state.lock().by_sender.clone()
    }

    #[cfg(test)]
    pub(crate) fn flush_pending(&self) -> bool {
        self.inner.state.lock().flush_pending
    }
}
