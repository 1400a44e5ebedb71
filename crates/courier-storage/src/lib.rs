// Key-value settings persistence seam.
//
// The receipt manager only ever reads and writes booleans under a fixed
// (collection, key) pair; the trait stays that narrow on purpose.
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Scoped settings key: a collection namespace plus a key within it.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SettingsKey {
    collection: String,
    key: String,
}

impl SettingsKey {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

/// Boolean settings store backed by external persistence.
///
/// `get_bool` returns `None` when the value was never written; callers own
/// the default. The store is assumed always available, so the surface is
/// infallible.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_bool(&self, collection: &str, key: &str) -> Option<bool>;

    async fn set_bool(&self, collection: &str, key: &str, value: bool);
}

/// In-memory settings store for tests and single-process deployments.
///
/// ```
/// use courier_storage::{EphemeralSettings, SettingsStore};
///
/// let store = EphemeralSettings::new();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     assert_eq!(store.get_bool("prefs", "enabled").await, None);
///     store.set_bool("prefs", "enabled", true).await;
///     assert_eq!(store.get_bool("prefs", "enabled").await, Some(true));
/// });
/// ```
#[derive(Debug, Default)]
pub struct EphemeralSettings {
    // RwLock allows concurrent readers while updates take exclusive access.
    inner: RwLock<HashMap<SettingsKey, bool>>,
}

impl EphemeralSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<EphemeralSettings> for Box<dyn SettingsStore> {
    fn from(value: EphemeralSettings) -> Self {
        Box::new(value)
    }
}

#[async_trait]
impl SettingsStore for EphemeralSettings {
    async fn get_bool(&self, collection: &str, key: &str) -> Option<bool> {
        self.inner
            .read()
            .await
            .get(&SettingsKey::new(collection, key))
            .copied()
    }

    async fn set_bool(&self, collection: &str, key: &str, value: bool) {
        self.inner
            .write()
            .await
            .insert(SettingsKey::new(collection, key), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_value_reads_as_none() {
        let store = EphemeralSettings::new();
        assert_eq!(store.get_bool("prefs", "missing").await, None);
    }

    #[tokio::test]
    async fn set_then_get_round_trip() {
        let store = EphemeralSettings::new();
        store.set_bool("prefs", "enabled", true).await;
        assert_eq!(store.get_bool("prefs", "enabled").await, Some(true));
        store.set_bool("prefs", "enabled", false).await;
        assert_eq!(store.get_bool("prefs", "enabled").await, Some(false));
    }

    #[tokio::test]
    async fn collections_do_not_collide() {
        let store = EphemeralSettings::new();
        store.set_bool("a", "flag", true).await;
        assert_eq!(store.get_bool("b", "flag").await, None);
        assert_eq!(store.get_bool("a", "flag").await, Some(true));
    }
}
