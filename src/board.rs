//! Board reconciliation engine.
//!
//! Two-phase state: the authoritative task set from the last live snapshot,
//! plus an optimistic overlay of statuses applied on drop before the
//! persist call settles. Every incoming snapshot is an authoritative
//! replacement and clears the whole overlay (per-document last-write-wins,
//! no field merge). On persist failure the overlay entry is reverted and
//! the error is returned to the caller as the visible failure signal.
//!
//! Transitions are unrestricted: any of the four states is reachable from
//! any other.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Task, TaskStatus};
use crate::tasks::TaskRepository;

/// Where a dragged card was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A column; maps directly to its status.
    Column(TaskStatus),
    /// Another card; resolves to that card's current status.
    Card(String),
    /// No valid target under the pointer.
    Outside,
}

/// Result of a completed drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Status changed and the persist call succeeded.
    Moved(TaskStatus),
    /// Target resolved to the task's current status; nothing written.
    NoChange,
    /// Gesture aborted: unknown task or no valid target.
    Aborted,
}

pub struct BoardEngine {
    repo: TaskRepository,
    tasks: Vec<Task>,
    pending: HashMap<String, TaskStatus>,
}

impl BoardEngine {
    pub fn new(repo: TaskRepository) -> Self {
        Self {
            repo,
            tasks: Vec::new(),
            pending: HashMap::new(),
        }
    }

    /// Replace local state with an authoritative snapshot.
    ///
    /// The last snapshot received always wins; any optimistic state is
    /// discarded, including moves another session may have raced.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.pending.clear();
    }

    /// Current view: authoritative set with the optimistic overlay applied,
    /// in snapshot order.
    pub fn view(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .map(|task| {
                let mut task = task.clone();
                if let Some(status) = self.pending.get(&task.id) {
                    task.status = *status;
                }
                task
            })
            .collect()
    }

    /// A single task as currently viewed.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.tasks.iter().find(|task| task.id == task_id).map(|task| {
            let mut task = task.clone();
            if let Some(status) = self.pending.get(&task.id) {
                task.status = *status;
            }
            task
        })
    }

    /// Tasks in one column of the viewed board.
    pub fn column(&self, status: TaskStatus) -> Vec<Task> {
        self.view()
            .into_iter()
            .filter(|task| task.status == status)
            .collect()
    }

    /// Whether a persist call is still in flight for this task.
    pub fn has_pending(&self, task_id: &str) -> bool {
        self.pending.contains_key(task_id)
    }

    fn resolve_target(&self, target: &DropTarget) -> Option<TaskStatus> {
        match target {
            DropTarget::Column(status) => Some(*status),
            DropTarget::Card(over_id) => self.task(over_id).map(|task| task.status),
            DropTarget::Outside => None,
        }
    }

    /// Complete a drag gesture.
    ///
    /// Same-status and unresolved targets produce no write. Otherwise the
    /// new status is applied optimistically, then persisted; on failure the
    /// optimistic entry is reverted and the error propagates.
    pub async fn drag_end(&mut self, task_id: &str, target: DropTarget) -> Result<DragOutcome> {
        let Some(current) = self.task(task_id) else {
            return Ok(DragOutcome::Aborted);
        };
        let Some(new_status) = self.resolve_target(&target) else {
            return Ok(DragOutcome::Aborted);
        };
        if new_status == current.status {
            return Ok(DragOutcome::NoChange);
        }

        self.pending.insert(task_id.to_string(), new_status);
        match self.repo.set_status(task_id, new_status).await {
            Ok(()) => Ok(DragOutcome::Moved(new_status)),
            Err(err) => {
                self.pending.remove(task_id);
                Err(err)
            }
        }
    }
}
