use serde::{Deserialize, Serialize};

/// Validation messages keyed by attribute or association path.
///
/// Keys keep the order in which they were first added. Messages under a key
/// keep insertion order and may repeat unless added through
/// [`RecordErrors::add_unique`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl RecordErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        let key = key.into();
        let message = message.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((key, vec![message])),
        }
    }

    /// Adds `message` under `key` unless that exact message is already there.
    pub fn add_unique(&mut self, key: impl Into<String>, message: impl Into<String>) -> bool {
        let key = key.into();
        let message = message.into();
        if self.get(&key).iter().any(|existing| *existing == message) {
            return false;
        }
        self.add(key, message);
        true
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Iterates `(key, message)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, messages)| {
            messages
                .iter()
                .map(move |message| (key.as_str(), message.as_str()))
        })
    }

    /// Total number of messages.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, messages)| messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `"<key> <message>"` for every message, e.g. `"lessons.subject can't be blank"`.
    pub fn full_messages(&self) -> Vec<String> {
        self.iter()
            .map(|(key, message)| format!("{} {}", key, message))
            .collect()
    }
}
