//! Label -> command mapping

use super::label::GestureLabel;
use gesture_bridge_shared::Command;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Association from gesture to command; keys are unique, empty by default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: BTreeMap<GestureLabel, Command>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: GestureLabel) -> Option<Command> {
        self.entries.get(&label).copied()
    }

    /// Map a gesture, returning the command it replaced
    pub fn set(&mut self, label: GestureLabel, command: Command) -> Option<Command> {
        self.entries.insert(label, command)
    }

    /// Apply a batch of edits: `Some` maps the gesture, `None` clears it
    pub fn apply<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (GestureLabel, Option<Command>)>,
    {
        for (label, command) in updates {
            match command {
                Some(command) => {
                    self.entries.insert(label, command);
                }
                None => {
                    self.entries.remove(&label);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GestureLabel, Command)> + '_ {
        self.entries.iter().map(|(l, c)| (*l, *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(GestureLabel, Command)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (GestureLabel, Command)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Mapping shared between the configurator (writer) and the dispatcher (reader)
///
/// Writes take effect on the dispatcher's next considered event.
#[derive(Debug, Clone, Default)]
pub struct SharedMapping {
    inner: Arc<RwLock<Mapping>>,
}

impl SharedMapping {
    pub fn new(mapping: Mapping) -> Self {
        Self {
            inner: Arc::new(RwLock::new(mapping)),
        }
    }

    pub async fn lookup(&self, label: GestureLabel) -> Option<Command> {
        self.inner.read().await.get(label)
    }

    /// Copy of the current mapping
    pub async fn snapshot(&self) -> Mapping {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, mapping: Mapping) {
        *self.inner.write().await = mapping;
    }

    pub async fn update<I>(&self, updates: I)
    where
        I: IntoIterator<Item = (GestureLabel, Option<Command>)>,
    {
        self.inner.write().await.apply(updates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_existing_key() {
        let mut mapping = Mapping::new();
        assert!(mapping.is_empty());

        assert_eq!(mapping.set(GestureLabel::ThumbUp, Command::VolumeUp), None);
        assert_eq!(
            mapping.set(GestureLabel::ThumbUp, Command::PlayPause),
            Some(Command::VolumeUp)
        );
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(GestureLabel::ThumbUp), Some(Command::PlayPause));
    }

    #[test]
    fn test_apply_sets_and_clears() {
        let mut mapping: Mapping = [
            (GestureLabel::ThumbUp, Command::VolumeUp),
            (GestureLabel::ThumbDown, Command::VolumeDown),
        ]
        .into_iter()
        .collect();

        mapping.apply([
            (GestureLabel::ThumbDown, None),
            (GestureLabel::Victory, Some(Command::Screenshot)),
            (GestureLabel::OpenPalm, None),
        ]);

        let entries: Vec<_> = mapping.iter().collect();
        assert_eq!(
            entries,
            vec![
                (GestureLabel::ThumbUp, Command::VolumeUp),
                (GestureLabel::Victory, Command::Screenshot),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_mapping_sees_writes() {
        let shared = SharedMapping::default();
        let reader = shared.clone();
        assert_eq!(reader.lookup(GestureLabel::ClosedFist).await, None);

        shared
            .update([(GestureLabel::ClosedFist, Some(Command::AltTab))])
            .await;
        assert_eq!(
            reader.lookup(GestureLabel::ClosedFist).await,
            Some(Command::AltTab)
        );

        shared.replace(Mapping::new()).await;
        assert!(reader.snapshot().await.is_empty());
    }
}
