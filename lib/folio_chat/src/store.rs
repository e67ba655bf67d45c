//! Session-scoped persistence of the conversation history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::StorageError;
use crate::message::{has_conversation, normalize, ChatMessage, ConversationHistory};

/// Key-value text storage that lives as long as one browsing session.
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: SessionStorage + ?Sized> SessionStorage for &T {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

fn check_quota(quota: Option<usize>, key: &str, value: &str) -> Result<(), StorageError> {
    match quota {
        Some(quota) if value.len() > quota => Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            size: value.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

/// In-process storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the size in bytes of a single stored value.
    #[must_use]
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.quota, key, value)?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Storage backed by one file per key inside a session directory.
///
/// Dropping the directory ends the session.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota: None,
        }
    }

    #[must_use]
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`. Characters outside `[A-Za-z0-9_-]`
    /// are replaced so any key maps into the session directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        self.dir.join(format!("{name}.json"))
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.quota, key, value)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Loads, validates and persists one conversation under a storage key.
#[derive(Debug, Clone)]
pub struct MessageStore<S> {
    storage: S,
    key: String,
    system: Option<String>,
    greeting: Option<String>,
}

impl<S: SessionStorage> MessageStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            system: None,
            greeting: None,
        }
    }

    #[must_use]
    pub fn with_system_message(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The history a fresh session starts with.
    pub fn seed(&self) -> ConversationHistory {
        let mut history = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            history.push(ChatMessage::system(system.clone()));
        }
        if let Some(greeting) = &self.greeting {
            history.push(ChatMessage::assistant(greeting.clone()));
        }
        history
    }

    /// Returns the persisted history when a valid one exists, the seed
    /// otherwise.
    pub fn initialize(&self) -> ConversationHistory {
        match self.load() {
            Some(history) if !history.is_empty() => normalize(history, self.system.as_deref()),
            _ => self.seed(),
        }
    }

    /// Stores the full history, or clears the key when nothing but the
    /// system directive is left. Failures are logged and dropped.
    pub fn persist(&self, history: &[ChatMessage]) {
        if let Err(e) = self.try_persist(history) {
            log::warn!("could not persist chat history under `{}`: {e}", self.key);
        }
    }

    fn try_persist(&self, history: &[ChatMessage]) -> Result<(), StorageError> {
        if has_conversation(history) {
            let value = serde_json::to_string(history)?;
            self.storage.set_item(&self.key, &value)
        } else {
            self.storage.remove_item(&self.key)
        }
    }

    fn load(&self) -> Option<ConversationHistory> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("could not read chat history under `{}`: {e}", self.key);
                return None;
            }
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("discarding stored chat history: {e}");
                return None;
            }
        };

        let history = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<ChatMessage>(entry).ok())
            .collect();

        Some(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    const KEY: &str = "portfolio-chat";

    fn store(storage: &MemoryStorage) -> MessageStore<&MemoryStorage> {
        MessageStore::new(storage, KEY)
            .with_system_message(Some("You answer questions about my research.".into()))
            .with_greeting(Some("Hi! Ask me anything.".into()))
    }

    #[test]
    fn fresh_session_returns_seed() {
        let storage = MemoryStorage::new();

        let history = store(&storage).initialize();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::System);
        assert_eq!(history[1], ChatMessage::assistant("Hi! Ask me anything."));
    }

    #[test]
    fn persisted_history_round_trips() {
        let storage = MemoryStorage::new();
        let store = store(&storage);
        let mut history = store.initialize();
        history.push(ChatMessage::user("What do you work on?"));
        history.push(ChatMessage::assistant("Program analysis."));

        store.persist(&history);

        assert_eq!(store.initialize(), history);
    }

    #[test]
    fn system_only_history_is_not_stored() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let storage = MemoryStorage::new();
        let store = store(&storage);
        store.persist(&[ChatMessage::user("stale")]);

        store.persist(&[ChatMessage::system("directive")]);

        assert_eq!(storage.get_item(KEY)?, None);
        assert_eq!(store.initialize(), store.seed());

        store.persist(&[]);
        assert_eq!(storage.get_item(KEY)?, None);

        Ok(())
    }

    #[test]
    fn invalid_entries_are_dropped_and_system_restored(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let storage = MemoryStorage::new();
        storage.set_item(
            KEY,
            r#"[
                {"role": "user", "content": "first"},
                {"role": "moderator", "content": "nope"},
                {"role": "assistant", "content": 42},
                {"role": "system", "content": "stored directive"},
                {"role": "assistant", "content": "second"}
            ]"#,
        )?;

        let history = store(&storage).initialize();

        assert_eq!(
            history,
            vec![
                ChatMessage::system("stored directive"),
                ChatMessage::user("first"),
                ChatMessage::assistant("second"),
            ]
        );

        Ok(())
    }

    #[test]
    fn missing_system_message_is_prepended() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let storage = MemoryStorage::new();
        storage.set_item(KEY, r#"[{"role": "user", "content": "hello"}]"#)?;

        let history = store(&storage).initialize();

        assert_eq!(
            history[0],
            ChatMessage::system("You answer questions about my research.")
        );
        assert_eq!(history[1], ChatMessage::user("hello"));

        Ok(())
    }

    #[test]
    fn garbage_falls_back_to_seed() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let storage = MemoryStorage::new();
        storage.set_item(KEY, "{not json")?;
        assert_eq!(store(&storage).initialize(), store(&storage).seed());

        storage.set_item(KEY, r#"[{"role": "narrator", "content": "x"}]"#)?;
        assert_eq!(store(&storage).initialize(), store(&storage).seed());

        Ok(())
    }

    #[test]
    fn quota_errors_are_swallowed() {
        let storage = MemoryStorage::new().with_quota(16);
        let store = MessageStore::new(&storage, KEY);

        store.persist(&[ChatMessage::user("a message far longer than sixteen bytes")]);

        assert!(matches!(storage.get_item(KEY), Ok(None)));
    }

    #[test]
    fn file_storage_keeps_one_file_per_key() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path().join("session"));

        storage.set_item("chat/history", "[]")?;

        assert!(storage.path_for("chat/history").ends_with("chat_history.json"));
        assert_eq!(storage.get_item("chat/history")?.as_deref(), Some("[]"));

        storage.remove_item("chat/history")?;
        storage.remove_item("chat/history")?;
        assert_eq!(storage.get_item("chat/history")?, None);

        Ok(())
    }

    #[test]
    fn file_storage_enforces_quota() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let storage = FileStorage::new(dir.path()).with_quota(4);

        let result = storage.set_item("key", "too large");

        assert!(matches!(
            result,
            Err(StorageError::QuotaExceeded { size: 9, quota: 4, .. })
        ));

        Ok(())
    }
}
