//! Record types for the persisted collections.
//!
//! Documents live on the wire as camelCase JSON matching the store layout
//! (`companies`, `users`, `tasks`, `tasks/{id}/comments`, `notifications`).
//! Deserialization through `from_document` is the schema-validation
//! boundary: documents that do not conform never reach core logic.
//!
//! Assignee entries are a denormalized snapshot of user identity taken at
//! assignment time. Staleness after a rename is tolerated; there is no
//! re-denormalization job.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Document;

pub const COMPANIES: &str = "companies";
pub const USERS: &str = "users";
pub const TASKS: &str = "tasks";
pub const NOTIFICATIONS: &str = "notifications";

/// Sub-collection path for a task's comments.
pub fn task_comments(task_id: &str) -> String {
    format!("{TASKS}/{task_id}/comments")
}

/// Workflow state of a task. No ordering is enforced between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    /// Column title as rendered on the board.
    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

/// Denormalized user identity carried on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub uid: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<Assignee>,
    pub created_by: String,
    pub company_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn from_document(doc: &Document) -> Result<Task> {
        let mut task: Task = decode(TASKS, doc)?;
        task.id = doc.id.clone();
        Ok(task)
    }

    /// Whether the given user appears in the assignee list.
    pub fn is_assigned_to(&self, uid: &str) -> bool {
        self.assignees.iter().any(|assignee| assignee.uid == uid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(skip)]
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub user_display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn from_document(task_id: &str, doc: &Document) -> Result<Comment> {
        let mut comment: Comment = decode(&task_comments(task_id), doc)?;
        comment.id = doc.id.clone();
        Ok(comment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(skip)]
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_preview: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn from_document(doc: &Document) -> Result<Notification> {
        let mut notification: Notification = decode(NOTIFICATIONS, doc)?;
        notification.id = doc.id.clone();
        Ok(notification)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub pending_requests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn from_document(doc: &Document) -> Result<Company> {
        let mut company: Company = decode(COMPANIES, doc)?;
        company.id = doc.id.clone();
        Ok(company)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub current_company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn from_document(doc: &Document) -> Result<UserProfile> {
        decode(USERS, doc)
    }
}

fn decode<T: DeserializeOwned>(collection: &str, doc: &Document) -> Result<T> {
    serde_json::from_value(doc.fields.clone()).map_err(|err| Error::InvalidDocument {
        collection: collection.to_string(),
        reason: format!("{} ({err})", doc.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_spellings_match_the_wire() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        assert_eq!(serde_json::to_value(TaskStatus::Todo).unwrap(), json!("todo"));
        assert_eq!(
            serde_json::to_value(NotificationKind::TaskAssigned).unwrap(),
            json!("task_assigned")
        );
        assert_eq!(
            serde_json::to_value(TaskPriority::High).unwrap(),
            json!("high")
        );
    }

    #[test]
    fn task_decodes_from_camel_case_document() {
        let doc = Document {
            id: "t1".to_string(),
            fields: json!({
                "title": "Fix navigation bug",
                "status": "in-progress",
                "priority": "high",
                "assignees": [
                    { "uid": "u2", "displayName": "Bea", "photoURL": "https://x/a.png" }
                ],
                "createdBy": "u1",
                "companyId": "c1",
                "createdAt": "2025-01-12T12:34:56Z",
                "deadline": null
            }),
        };
        let task = Task::from_document(&doc).expect("decode");
        assert_eq!(task.id, "t1");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assignees[0].display_name, "Bea");
        assert!(task.deadline.is_none());
        assert!(task.is_assigned_to("u2"));
        assert!(!task.is_assigned_to("u1"));
    }

    #[test]
    fn unknown_status_is_rejected_at_the_boundary() {
        let doc = Document {
            id: "t1".to_string(),
            fields: json!({
                "title": "Bad",
                "status": "blocked",
                "createdBy": "u1",
                "companyId": "c1"
            }),
        };
        let err = Task::from_document(&doc).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
    }

    #[test]
    fn priority_defaults_to_medium_when_missing() {
        let doc = Document {
            id: "t1".to_string(),
            fields: json!({
                "title": "Legacy",
                "status": "todo",
                "createdBy": "u1",
                "companyId": "c1"
            }),
        };
        let task = Task::from_document(&doc).expect("decode");
        assert_eq!(task.priority, TaskPriority::Medium);
    }

    #[test]
    fn notification_kind_uses_type_field() {
        let doc = Document {
            id: "n1".to_string(),
            fields: json!({
                "recipientId": "u1",
                "senderId": "u2",
                "senderName": "Bea",
                "type": "comment",
                "taskId": "t1",
                "taskTitle": "Fix navigation bug",
                "commentPreview": "Looks good to me"
            }),
        };
        let notification = Notification::from_document(&doc).expect("decode");
        assert_eq!(notification.kind, NotificationKind::Comment);
        assert!(!notification.read);
    }
}
