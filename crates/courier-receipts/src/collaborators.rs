// Seams to the rest of the messaging app.
//
// The manager aggregates; everything else is a collaborator behind a trait:
// the message transport, the thread directory, and the pipeline that marks
// stored messages as read. All results are logged by the dispatcher and
// never surfaced to producers.
use anyhow::Result;
use async_trait::async_trait;
use courier_wire::Message;

/// Handle to a resolved conversation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub id: String,
}

impl ThreadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Outbound message transport with at-most-once semantics.
#[async_trait]
pub trait ReceiptTransport: Send + Sync {
    /// Deliver a sync message to the user's other devices.
    async fn send_to_linked_devices(&self, message: Message) -> Result<()>;

    /// Deliver a message to a resolved conversation thread.
    async fn send_to_thread(&self, thread: &ThreadHandle, message: Message) -> Result<()>;
}

/// Resolves conversation threads by contact.
#[async_trait]
pub trait ThreadDirectory: Send + Sync {
    /// Get-or-create semantics: a missing thread is created, not an error.
    async fn thread_for_contact(&self, contact_id: &str) -> Result<ThreadHandle>;
}

/// Read-tracking pipeline that applies read state to stored messages.
///
/// The marker owns idempotence; the manager forwards timestamps in arrival
/// order without deduplication.
#[async_trait]
pub trait ReadMarker: Send + Sync {
    /// A peer reported reading our outgoing message with this timestamp.
    async fn mark_read_by_peer(&self, reader: &str, timestamp: u64) -> Result<()>;

    /// One of our own linked devices read the incoming message with this
    /// timestamp; mark it read locally.
    async fn mark_read_locally(&self, sender_id: &str, timestamp: u64) -> Result<()>;
}
