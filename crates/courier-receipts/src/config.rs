// Tunables for the receipt manager.
use std::time::Duration;

// Long enough to coalesce a scroll burst into one message, short enough
// that an app exit before expiry does not drop too many receipts.
const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(3);

/// Configuration for [`crate::ReadReceiptManager`].
#[derive(Debug, Clone)]
pub struct ReceiptConfig {
    /// Debounce window between the first pending read event and the flush.
    pub flush_delay: Duration,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flush_delay_is_three_seconds() {
        assert_eq!(ReceiptConfig::default().flush_delay, Duration::from_secs(3));
    }
}
