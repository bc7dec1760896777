//! In-memory projection of submitted tasks for display.
//!
//! Entries are matched by task id, never by position: the list may be
//! sorted or filtered independently of generation. Once an entry is
//! terminal, later updates for it are ignored, so replayed or late
//! events cannot change a materialized result.

use serde::Serialize;

use crate::assets::MaterializedAsset;
use crate::events::GenerationEvent;
use crate::generation::TaskType;
use crate::progress::COMPLETE_PERCENT;
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Processing,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientResultEntry {
    /// Equal to the task id.
    pub id: TaskId,
    pub task_type: TaskType,
    /// Face-swap reference image.
    pub source: Option<String>,
    /// Face-swap face image.
    pub target: Option<String>,
    pub status: EntryStatus,
    pub progress: u8,
    pub result_url: Option<String>,
    pub system_filename: Option<String>,
    pub user_filename: Option<String>,
    pub error: Option<String>,
}

impl ClientResultEntry {
    pub fn processing(id: TaskId, task_type: TaskType) -> Self {
        Self {
            id,
            task_type,
            source: None,
            target: None,
            status: EntryStatus::Processing,
            progress: 0,
            result_url: None,
            system_filename: None,
            user_filename: None,
            error: None,
        }
    }

    pub fn with_inputs(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source = source;
        self.target = target;
        self
    }

    fn set_progress(&mut self, percent: u8) -> bool {
        if self.status.is_terminal() || percent >= COMPLETE_PERCENT || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    fn complete(&mut self, asset: &MaterializedAsset) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = EntryStatus::Completed;
        self.progress = COMPLETE_PERCENT;
        self.result_url = Some(asset.url.clone());
        self.system_filename = Some(asset.system_filename.clone());
        self.user_filename = asset.user_filename.clone();
        true
    }

    fn fail(&mut self, reason: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = EntryStatus::Failed;
        self.progress = 0;
        self.error = Some(reason);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultList {
    entries: Vec<ClientResultEntry>,
}

impl ResultList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `false` if an entry with the same id exists.
    pub fn insert(&mut self, entry: ClientResultEntry) -> bool {
        if self.get(&entry.id).is_some() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn get(&self, id: &TaskId) -> Option<&ClientResultEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    fn get_mut(&mut self, id: &TaskId) -> Option<&mut ClientResultEntry> {
        self.entries.iter_mut().find(|e| &e.id == id)
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<ClientResultEntry> {
        let idx = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientResultEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retain(&mut self, f: impl FnMut(&ClientResultEntry) -> bool) {
        self.entries.retain(f);
    }

    pub fn sort_by_key<K: Ord>(&mut self, f: impl FnMut(&ClientResultEntry) -> K) {
        self.entries.sort_by_key(f);
    }

    /// Apply a lifecycle event to the matching entry.
    ///
    /// Returns `true` if the entry changed. Events for unknown ids and
    /// updates to terminal entries are ignored.
    pub fn apply(&mut self, event: &GenerationEvent) -> bool {
        let Some(entry) = self.get_mut(event.task_id()) else {
            return false;
        };

        match event {
            GenerationEvent::Submitted { .. } => false,
            GenerationEvent::Progress { percent, .. } => entry.set_progress(*percent),
            GenerationEvent::Completed { asset, .. } => entry.complete(asset),
            GenerationEvent::Failed { error, .. } => entry.fail(error.clone()),
            GenerationEvent::TimedOut { elapsed_secs, .. } => {
                entry.fail(format!("Generation timed out after {elapsed_secs}s"))
            }
            GenerationEvent::Cancelled { .. } => entry.fail("Generation cancelled".to_string()),
        }
    }

    /// True once every listed task has an entry in a terminal state.
    ///
    /// Ids with no entry count as not finished.
    pub fn all_terminal<'a>(&self, ids: impl IntoIterator<Item = &'a TaskId>) -> bool {
        ids.into_iter()
            .all(|id| self.get(id).is_some_and(|e| e.status.is_terminal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(task: &str) -> MaterializedAsset {
        MaterializedAsset {
            task_id: TaskId::new(task),
            asset_id: None,
            url: format!("https://cdn.test/u1/output/r{task}.png"),
            system_filename: format!("r{task}.png"),
            user_filename: None,
            file_path: None,
        }
    }

    fn list_with(ids: &[&str]) -> ResultList {
        let mut list = ResultList::new();
        for id in ids {
            list.insert(ClientResultEntry::processing(TaskId::new(*id), TaskType::Preview));
        }
        list
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut list = list_with(&["1"]);
        assert!(!list.insert(ClientResultEntry::processing(TaskId::new("1"), TaskType::Image)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn completion_updates_matching_entry_only() {
        let mut list = list_with(&["1", "2"]);
        assert!(list.apply(&GenerationEvent::Completed {
            task_id: TaskId::new("2"),
            asset: asset("2"),
        }));

        let done = list.get(&TaskId::new("2")).unwrap();
        assert_eq!(done.status, EntryStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.result_url.as_deref(), Some("https://cdn.test/u1/output/r2.png"));
        assert_eq!(list.get(&TaskId::new("1")).unwrap().status, EntryStatus::Processing);
    }

    #[test]
    fn updates_follow_id_after_reordering() {
        let mut list = list_with(&["1", "2", "3"]);
        list.sort_by_key(|e| std::cmp::Reverse(e.id.clone()));
        list.retain(|e| e.id.as_str() != "2");

        list.apply(&GenerationEvent::Progress {
            task_id: TaskId::new("1"),
            percent: 30,
        });
        assert_eq!(list.get(&TaskId::new("1")).unwrap().progress, 30);
        assert_eq!(list.get(&TaskId::new("3")).unwrap().progress, 0);
    }

    #[test]
    fn progress_never_decreases_or_reaches_hundred() {
        let mut list = list_with(&["1"]);
        let id = TaskId::new("1");
        list.apply(&GenerationEvent::Progress { task_id: id.clone(), percent: 40 });
        assert!(!list.apply(&GenerationEvent::Progress { task_id: id.clone(), percent: 20 }));
        assert!(!list.apply(&GenerationEvent::Progress { task_id: id.clone(), percent: 100 }));
        assert_eq!(list.get(&id).unwrap().progress, 40);
    }

    #[test]
    fn failure_sets_progress_to_zero() {
        let mut list = list_with(&["1"]);
        let id = TaskId::new("1");
        list.apply(&GenerationEvent::Progress { task_id: id.clone(), percent: 60 });
        list.apply(&GenerationEvent::Failed {
            task_id: id.clone(),
            error: "boom".into(),
        });
        let e = list.get(&id).unwrap();
        assert_eq!(e.status, EntryStatus::Failed);
        assert_eq!(e.progress, 0);
        assert_eq!(e.error.as_deref(), Some("boom"));
    }

    #[test]
    fn replayed_terminal_events_do_not_change_result() {
        let mut list = list_with(&["42"]);
        let id = TaskId::new("42");
        let completed = GenerationEvent::Completed {
            task_id: id.clone(),
            asset: asset("42"),
        };
        assert!(list.apply(&completed));
        let snapshot = list.clone();

        assert!(!list.apply(&completed));
        assert!(!list.apply(&GenerationEvent::Failed {
            task_id: id.clone(),
            error: "late".into()
        }));
        assert!(!list.apply(&GenerationEvent::Progress { task_id: id, percent: 10 }));
        assert_eq!(list, snapshot);
    }

    #[test]
    fn batch_is_complete_only_when_all_terminal() {
        let mut list = list_with(&["1", "2", "3"]);
        let ids: Vec<TaskId> = ["1", "2", "3"].iter().map(|s| TaskId::new(*s)).collect();

        list.apply(&GenerationEvent::Completed { task_id: ids[0].clone(), asset: asset("1") });
        assert!(!list.all_terminal(&ids));

        list.apply(&GenerationEvent::Failed { task_id: ids[1].clone(), error: "x".into() });
        assert!(!list.all_terminal(&ids));

        list.apply(&GenerationEvent::Cancelled { task_id: ids[2].clone() });
        assert!(list.all_terminal(&ids));
    }

    #[test]
    fn unknown_ids_are_not_terminal() {
        let list = list_with(&["1"]);
        assert!(!list.all_terminal(&[TaskId::new("missing")]));
    }
}
