//! Linear undo/redo over complete snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::document::Presentation;
use crate::graph::Graph;

/// Everything undo/redo restores.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub graph: Graph,
    pub presentation: Presentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Initial,
    AddEntity,
    RemoveEntity,
    AddColumn,
    RemoveColumn,
    UpdateColumn,
    Connect,
    Reconnect,
    Disconnect,
    ChangeColor,
    ToggleVisibility,
    Import,
    LoadDocument,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HistoryMetadata {
    pub description: String,
    /// Id of the element the action was aimed at, when there is one.
    pub target: Option<String>,
}

impl HistoryMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target: None,
        }
    }

    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub action: ActionType,
    pub snapshot: Arc<Snapshot>,
    pub metadata: HistoryMetadata,
}

/// Snapshot stack with a cursor at the current state.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    capacity: usize,
}

impl HistoryManager {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Appends `snapshot` after the cursor, discarding any redo tail and
    /// evicting the oldest entries beyond capacity.
    pub fn save_state(&mut self, action: ActionType, snapshot: Snapshot, metadata: HistoryMetadata) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(HistoryEntry {
            action,
            snapshot: Arc::new(snapshot),
            metadata,
        });
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.cursor -= 1;
        }
        debug!(?action, cursor = self.cursor, len = self.entries.len(), "saved history state");
    }

    pub fn undo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    pub fn redo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.entries.get(self.cursor).map(|e| Arc::clone(&e.snapshot))
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry and starts over from `snapshot`.
    pub fn reset(&mut self, action: ActionType, snapshot: Snapshot, metadata: HistoryMetadata) {
        self.entries.clear();
        self.cursor = 0;
        self.save_state(action, snapshot, metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use pretty_assertions::assert_eq;

    fn snapshot(n: usize) -> Snapshot {
        let mut graph = Graph::new();
        for i in 0..n {
            graph.entities.push(Entity::new(format!("e{}", i), format!("table_{}", i)));
        }
        Snapshot {
            graph,
            presentation: Presentation::default(),
        }
    }

    fn save(history: &mut HistoryManager, n: usize) {
        history.save_state(ActionType::AddEntity, snapshot(n), HistoryMetadata::new(format!("step {}", n)));
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = HistoryManager::new(50);
        for n in 0..3 {
            save(&mut history, n);
        }
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert_eq!(*history.undo().unwrap(), snapshot(1));
        assert_eq!(*history.undo().unwrap(), snapshot(0));
        assert_eq!(history.undo(), None);
        assert_eq!(*history.redo().unwrap(), snapshot(1));
        assert!(history.can_redo());
    }

    #[test]
    fn test_save_discards_redo_tail() {
        let mut history = HistoryManager::new(50);
        for n in 0..3 {
            save(&mut history, n);
        }
        history.undo();
        history.undo();
        save(&mut history, 7);

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(*history.undo().unwrap(), snapshot(0));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = HistoryManager::new(3);
        for n in 0..5 {
            save(&mut history, n);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);

        assert_eq!(*history.undo().unwrap(), snapshot(3));
        assert_eq!(*history.undo().unwrap(), snapshot(2));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_single_entry_cannot_move() {
        let mut history = HistoryManager::new(0);
        assert_eq!(history.capacity(), 1);
        assert!(!history.can_undo() && !history.can_redo());
        save(&mut history, 1);
        save(&mut history, 2);
        assert_eq!(history.len(), 1);
        assert_eq!(history.undo(), None);
        assert_eq!(*history.current().unwrap(), snapshot(2));
    }

    #[test]
    fn test_reset_keeps_only_initial() {
        let mut history = HistoryManager::new(10);
        save(&mut history, 1);
        save(&mut history, 2);
        history.reset(ActionType::LoadDocument, snapshot(5), HistoryMetadata::new("load"));

        assert_eq!(history.len(), 1);
        assert_eq!(history.current_entry().unwrap().action, ActionType::LoadDocument);
    }
}
