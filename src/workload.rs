//! Pure derivations over the workspace task set.
//!
//! Recomputed on every task-set change; no side effects. Ordering inside
//! buckets and in the recent view is snapshot order, so derived views stay
//! stable across recomputation.

use serde::Serialize;

use crate::model::{Task, TaskStatus, UserProfile};

/// One member's tasks partitioned by status.
#[derive(Debug, Clone, Serialize)]
pub struct MemberWorkload {
    pub uid: String,
    pub display_name: String,
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub review: Vec<Task>,
    pub done: Vec<Task>,
}

impl MemberWorkload {
    fn new(member: &UserProfile) -> Self {
        Self {
            uid: member.uid.clone(),
            display_name: member.display_name.clone(),
            todo: Vec::new(),
            in_progress: Vec::new(),
            review: Vec::new(),
            done: Vec::new(),
        }
    }

    pub fn bucket(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Review => &self.review,
            TaskStatus::Done => &self.done,
        }
    }

    pub fn total(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.review.len() + self.done.len()
    }

    /// Open (not done) assignments for this member.
    pub fn open(&self) -> usize {
        self.total() - self.done.len()
    }
}

/// Partition the task set per member. A task appears under every member in
/// its assignee list; unassigned tasks appear under nobody.
pub fn member_workloads(tasks: &[Task], members: &[UserProfile]) -> Vec<MemberWorkload> {
    let mut workloads: Vec<MemberWorkload> = members.iter().map(MemberWorkload::new).collect();
    for task in tasks {
        for workload in &mut workloads {
            if !task.is_assigned_to(&workload.uid) {
                continue;
            }
            match task.status {
                TaskStatus::Todo => workload.todo.push(task.clone()),
                TaskStatus::InProgress => workload.in_progress.push(task.clone()),
                TaskStatus::Review => workload.review.push(task.clone()),
                TaskStatus::Done => workload.done.push(task.clone()),
            }
        }
    }
    workloads
}

/// Workspace-wide counts for the dashboard summary cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkspaceSummary {
    /// Tasks with status other than done.
    pub pending: usize,
    /// Tasks with status done.
    pub completed: usize,
}

pub fn summarize(tasks: &[Task]) -> WorkspaceSummary {
    let completed = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Done)
        .count();
    WorkspaceSummary {
        pending: tasks.len() - completed,
        completed,
    }
}

/// Most recently created tasks, newest first, at most `limit` entries.
///
/// Ties and missing timestamps keep snapshot order; tasks without a
/// creation timestamp sort last.
pub fn recent_tasks(tasks: &[Task], limit: usize) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|left, right| match (&left.created_at, &right.created_at) {
        (Some(l), Some(r)) => r.cmp(l),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted.truncate(limit);
    sorted
}
