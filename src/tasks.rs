//! Task repository: CRUD, comments, and the live workspace subscription.
//!
//! Every task belongs to exactly one workspace; the workspace and creator
//! of an existing task are never mutated. Assignee data is denormalized at
//! assignment time. Writes go through the bounded-retry helper so a single
//! transient store failure does not surface to the caller.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{task_comments, Assignee, Comment, Task, TaskPriority, TaskStatus, TASKS};
use crate::notify;
use crate::session::CurrentUser;
use crate::store::{self, Document, Filter, MemoryStore, Subscription};

/// Input for a new task. Status defaults to todo, priority to medium.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignees: Vec<Assignee>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update: only `Some` fields are written. The workspace id,
/// creator, and creation timestamp are not expressible here.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignees: Option<Vec<Assignee>>,
}

impl TaskChanges {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.deadline.is_none()
            && self.assignees.is_none()
    }
}

#[derive(Clone)]
pub struct TaskRepository {
    store: MemoryStore,
    config: Config,
}

impl TaskRepository {
    pub fn new(store: MemoryStore, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Create a task in the given workspace. Returns the new task id.
    ///
    /// Side effect: one `task_assigned` notification per assignee other
    /// than the actor.
    pub async fn create_task(
        &self,
        input: NewTask,
        company_id: &str,
        actor: &CurrentUser,
    ) -> Result<String> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(Error::EmptyTitle);
        }

        let mut fields = Map::new();
        fields.insert("title".to_string(), json!(title));
        if let Some(description) = &input.description {
            fields.insert("description".to_string(), json!(description));
        }
        let status = input.status.unwrap_or(TaskStatus::Todo);
        fields.insert("status".to_string(), json!(status));
        let priority = input.priority.unwrap_or(TaskPriority::Medium);
        fields.insert("priority".to_string(), json!(priority));
        fields.insert("deadline".to_string(), json!(input.deadline));
        fields.insert("assignees".to_string(), serde_json::to_value(&input.assignees)?);
        fields.insert("createdBy".to_string(), json!(actor.uid));
        fields.insert("companyId".to_string(), json!(company_id));
        fields.insert("createdAt".to_string(), MemoryStore::server_timestamp());

        let payload = Value::Object(fields);
        let task_id = store::with_retry(&self.config.retry, || {
            self.store.create(TASKS, payload.clone())
        })
        .await?;

        let recipients: Vec<String> = input
            .assignees
            .iter()
            .map(|assignee| assignee.uid.clone())
            .collect();
        notify::notify_assignment(&self.store, actor, &task_id, title, &recipients).await;

        Ok(task_id)
    }

    /// Merge a subset of mutable fields into a task.
    ///
    /// Assignees added by this update (relative to the stored record) other
    /// than the actor each get a `task_assigned` notification.
    pub async fn update_task(
        &self,
        task_id: &str,
        changes: TaskChanges,
        actor: &CurrentUser,
    ) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(Error::EmptyTitle);
            }
        }

        let current = self.get_task(task_id).await?.ok_or_else(|| {
            Error::DocumentNotFound {
                collection: TASKS.to_string(),
                id: task_id.to_string(),
            }
        })?;

        let mut fields = Map::new();
        if let Some(title) = &changes.title {
            fields.insert("title".to_string(), json!(title.trim()));
        }
        if let Some(description) = &changes.description {
            fields.insert("description".to_string(), json!(description));
        }
        if let Some(status) = changes.status {
            fields.insert("status".to_string(), json!(status));
        }
        if let Some(priority) = changes.priority {
            fields.insert("priority".to_string(), json!(priority));
        }
        if let Some(deadline) = changes.deadline {
            fields.insert("deadline".to_string(), json!(deadline));
        }
        if let Some(assignees) = &changes.assignees {
            fields.insert("assignees".to_string(), serde_json::to_value(assignees)?);
        }

        let payload = Value::Object(fields);
        store::with_retry(&self.config.retry, || {
            self.store.update(TASKS, task_id, payload.clone())
        })
        .await?;

        if let Some(assignees) = &changes.assignees {
            let added: Vec<String> = assignees
                .iter()
                .filter(|assignee| !current.is_assigned_to(&assignee.uid))
                .map(|assignee| assignee.uid.clone())
                .collect();
            if !added.is_empty() {
                let title = changes.title.as_deref().unwrap_or(&current.title);
                notify::notify_assignment(&self.store, actor, task_id, title, &added).await;
            }
        }

        Ok(())
    }

    /// Persist a single task's status field. Used by the board on drop.
    pub async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        store::with_retry(&self.config.retry, || {
            self.store
                .update(TASKS, task_id, json!({ "status": status }))
        })
        .await
    }

    /// Delete a task and cascade-delete its comment sub-collection.
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        store::with_retry(&self.config.retry, || self.store.delete(TASKS, task_id)).await?;
        self.store.drop_collection(&task_comments(task_id)).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        match self.store.get(TASKS, task_id).await? {
            Some(doc) => Ok(Some(Task::from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Live subscription to all tasks of one workspace. Every delivery is
    /// the full current matching set; malformed documents are skipped.
    pub fn watch(&self, company_id: &str) -> TaskWatch {
        let subscription = self
            .store
            .live_query(TASKS, Filter::field_eq("companyId", company_id));
        TaskWatch { subscription }
    }

    /// Post a comment on a task. Returns the new comment id.
    ///
    /// Side effect: one `comment` notification per current assignee other
    /// than the commenter.
    pub async fn add_comment(
        &self,
        task_id: &str,
        text: &str,
        actor: &CurrentUser,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "comment text cannot be empty".to_string(),
            ));
        }
        let task = self.get_task(task_id).await?.ok_or_else(|| {
            Error::DocumentNotFound {
                collection: TASKS.to_string(),
                id: task_id.to_string(),
            }
        })?;

        let payload = json!({
            "text": text,
            "userId": actor.uid,
            "userDisplayName": actor.display_name,
            "userPhoto": actor.photo_url,
            "createdAt": MemoryStore::server_timestamp(),
        });
        let collection = task_comments(task_id);
        let comment_id = store::with_retry(&self.config.retry, || {
            self.store.create(&collection, payload.clone())
        })
        .await?;

        notify::notify_comment(&self.store, &self.config.notifications, actor, &task, text).await;

        Ok(comment_id)
    }

    /// Comments for a task, newest first.
    pub async fn comments(&self, task_id: &str) -> Result<Vec<Comment>> {
        let docs = self
            .store
            .query(&task_comments(task_id), &Filter::All)
            .await?;
        let mut comments = decode_comments(task_id, &docs);
        sort_newest_first(&mut comments);
        Ok(comments)
    }

    /// Live subscription to a task's comments, newest first.
    pub fn watch_comments(&self, task_id: &str) -> CommentWatch {
        let subscription = self.store.live_query(&task_comments(task_id), Filter::All);
        CommentWatch {
            task_id: task_id.to_string(),
            subscription,
        }
    }
}

/// Cancellable live view over a workspace's tasks.
pub struct TaskWatch {
    subscription: Subscription,
}

impl TaskWatch {
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        let docs = self.subscription.next().await?;
        Some(decode_tasks(&docs))
    }

    pub fn try_next(&mut self) -> Option<Vec<Task>> {
        let docs = self.subscription.try_next()?;
        Some(decode_tasks(&docs))
    }

    pub fn cancel(&mut self) {
        self.subscription.cancel();
    }
}

/// Cancellable live view over one task's comments.
pub struct CommentWatch {
    task_id: String,
    subscription: Subscription,
}

impl CommentWatch {
    pub async fn next(&mut self) -> Option<Vec<Comment>> {
        let docs = self.subscription.next().await?;
        let mut comments = decode_comments(&self.task_id, &docs);
        sort_newest_first(&mut comments);
        Some(comments)
    }

    pub fn cancel(&mut self) {
        self.subscription.cancel();
    }
}

fn decode_tasks(docs: &[Document]) -> Vec<Task> {
    docs.iter()
        .filter_map(|doc| match Task::from_document(doc) {
            Ok(task) => Some(task),
            Err(err) => {
                tracing::warn!(id = %doc.id, error = %err, "skipping malformed task document");
                None
            }
        })
        .collect()
}

fn decode_comments(task_id: &str, docs: &[Document]) -> Vec<Comment> {
    docs.iter()
        .filter_map(|doc| match Comment::from_document(task_id, doc) {
            Ok(comment) => Some(comment),
            Err(err) => {
                tracing::warn!(id = %doc.id, error = %err, "skipping malformed comment document");
                None
            }
        })
        .collect()
}

fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|left, right| match (&left.created_at, &right.created_at) {
        (Some(l), Some(r)) => r.cmp(l),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
