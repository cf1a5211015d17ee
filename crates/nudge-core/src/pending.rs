//! Transient map from (assignee, conversation) to the tasks awaiting that
//! person's answer there.
//!
//! Not a system of record: reminder records are authoritative and the index
//! is rebuilt from them at startup. Entries only let the scheduler skip a
//! follow-up whose answer has just landed, and let free-text answers find
//! their task.

use crate::types::{ConversationId, Task, TaskId, UserHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PendingKey {
    pub assignee: UserHandle,
    pub conversation: ConversationId,
}

impl PendingKey {
    pub fn new(assignee: UserHandle, conversation: ConversationId) -> Self {
        Self {
            assignee,
            conversation,
        }
    }

    pub fn for_task(task: &Task) -> Self {
        Self::new(task.assignee.clone(), task.conversation.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingEntry {
    pub task_id: TaskId,
    pub task: Task,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingResponseIndex {
    inner: Arc<Mutex<HashMap<PendingKey, Vec<PendingEntry>>>>,
}

impl PendingResponseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PendingKey, Vec<PendingEntry>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records `entry` as the most recent task awaiting `key`, replacing an
    /// older entry for the same task.
    pub fn put(&self, key: PendingKey, entry: PendingEntry) {
        let mut map = self.lock();
        let entries = map.entry(key).or_default();
        entries.retain(|existing| existing.task_id != entry.task_id);
        entries.push(entry);
    }

    /// The most recently notified task awaiting `key`.
    pub fn get(&self, key: &PendingKey) -> Option<PendingEntry> {
        self.lock().get(key).and_then(|entries| entries.last().cloned())
    }

    pub fn get_task(&self, key: &PendingKey, task_id: TaskId) -> Option<PendingEntry> {
        self.lock().get(key).and_then(|entries| {
            entries
                .iter()
                .find(|entry| entry.task_id == task_id)
                .cloned()
        })
    }

    pub fn contains(&self, key: &PendingKey, task_id: TaskId) -> bool {
        self.get_task(key, task_id).is_some()
    }

    pub fn remove(&self, key: &PendingKey, task_id: TaskId) -> Option<PendingEntry> {
        let mut map = self.lock();
        let entries = map.get_mut(key)?;
        let position = entries.iter().position(|entry| entry.task_id == task_id)?;
        let removed = entries.remove(position);
        if entries.is_empty() {
            map.remove(key);
        }
        Some(removed)
    }

    /// Drops every entry for `task_id` regardless of key.
    pub fn remove_task(&self, task_id: TaskId) -> usize {
        let mut map = self.lock();
        let mut removed = 0;
        map.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.task_id != task_id);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every live entry, ordered by task id.
    pub fn snapshot(&self) -> Vec<PendingEntry> {
        let map = self.lock();
        let mut rows: Vec<PendingEntry> = map.values().flatten().cloned().collect();
        rows.sort_by_key(|entry| entry.task_id);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Frequency, TaskStatus, TimeOfDay};
    use std::thread;

    fn task(id: i64, assignee: &str, conversation: &str) -> Task {
        Task {
            id: TaskId::new(id),
            description: format!("task {id}"),
            assignee: UserHandle::new(assignee).unwrap(),
            conversation: ConversationId::new(conversation).unwrap(),
            created_by: UserHandle::new("admin").unwrap(),
            time_of_day: TimeOfDay::new(9, 0).unwrap(),
            frequency: Frequency::Once,
            status: TaskStatus::Active,
            created_at: Utc::now(),
            last_run_at: None,
            next_run_at: None,
        }
    }

    fn entry(task: &Task) -> PendingEntry {
        PendingEntry {
            task_id: task.id,
            task: task.clone(),
            since: Utc::now(),
        }
    }

    #[test]
    fn put_get_remove() {
        let index = PendingResponseIndex::new();
        let t = task(1, "amy", "c1");
        let key = PendingKey::for_task(&t);
        index.put(key.clone(), entry(&t));
        assert_eq!(index.get(&key).map(|e| e.task_id), Some(t.id));
        assert!(index.contains(&key, t.id));
        assert!(index.remove(&key, t.id).is_some());
        assert!(index.get(&key).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn two_tasks_for_one_person_do_not_shadow_each_other() {
        let index = PendingResponseIndex::new();
        let first = task(1, "amy", "c1");
        let second = task(2, "amy", "c1");
        let key = PendingKey::for_task(&first);
        index.put(key.clone(), entry(&first));
        index.put(key.clone(), entry(&second));
        assert_eq!(index.get(&key).map(|e| e.task_id), Some(second.id));
        index.remove(&key, second.id);
        assert!(index.contains(&key, first.id));
    }

    #[test]
    fn put_replaces_same_task() {
        let index = PendingResponseIndex::new();
        let t = task(1, "amy", "c1");
        let key = PendingKey::for_task(&t);
        index.put(key.clone(), entry(&t));
        index.put(key, entry(&t));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_task_clears_all_keys() {
        let index = PendingResponseIndex::new();
        let t = task(3, "amy", "c1");
        index.put(PendingKey::for_task(&t), entry(&t));
        assert_eq!(index.remove_task(t.id), 1);
        assert!(index.snapshot().is_empty());
    }

    #[test]
    fn concurrent_access_is_safe() {
        let index = PendingResponseIndex::new();
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let index = index.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let t = task(n * 100 + i, "amy", &format!("c{n}"));
                        let key = PendingKey::for_task(&t);
                        index.put(key.clone(), entry(&t));
                        if i % 2 == 0 {
                            index.remove(&key, t.id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(index.len(), 8 * 25);
    }
}
