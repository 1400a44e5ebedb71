//! Read-receipt aggregation and delivery.
//!
//! Read events arrive in bursts (a user scrolling a conversation marks many
//! messages read in quick succession). Sending one network message per event
//! would flood the transport and leak reading cadence, so the
//! [`ReadReceiptManager`] coalesces events per destination and flushes them
//! as batched messages after a debounce window. Delivery is best-effort:
//! failures are logged, never retried.

pub mod collaborators;
pub mod config;
pub mod manager;


pub use collaborators::{ReadMarker, ReceiptTransport, ThreadDirectory, ThreadHandle};
pub use config::ReceiptConfig;
pub use manager::{
    ReadReceiptManager, READ_RECEIPTS_SETTING_COLLECTION, READ_RECEIPTS_SETTING_KEY,
};
