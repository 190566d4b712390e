//! Notification fan-out and the per-user live feed.
//!
//! Notifications are created as a side effect of task assignment and
//! comment creation: one document per recipient. Each recipient's write is
//! independent; a failed write is logged and skipped so the remaining
//! recipients still get theirs. The actor never notifies themselves.

use serde_json::{json, Value};

use crate::config::NotificationsConfig;
use crate::error::Result;
use crate::model::{Notification, Task, NOTIFICATIONS};
use crate::session::CurrentUser;
use crate::store::{Filter, MemoryStore, Subscription};

/// Fan out `task_assigned` notifications to every recipient uid except the
/// actor. Returns the number of notifications actually written.
pub async fn notify_assignment(
    store: &MemoryStore,
    actor: &CurrentUser,
    task_id: &str,
    task_title: &str,
    recipient_uids: &[String],
) -> usize {
    let docs: Vec<Value> = dedup_recipients(recipient_uids, &actor.uid)
        .into_iter()
        .map(|uid| {
            json!({
                "recipientId": uid,
                "senderId": actor.uid,
                "senderName": actor.display_name,
                "type": "task_assigned",
                "taskId": task_id,
                "taskTitle": task_title,
                "read": false,
                "createdAt": MemoryStore::server_timestamp(),
            })
        })
        .collect();
    fan_out(store, docs).await
}

/// Fan out `comment` notifications to every current assignee of the task
/// except the commenter. Returns the number of notifications written.
pub async fn notify_comment(
    store: &MemoryStore,
    config: &NotificationsConfig,
    actor: &CurrentUser,
    task: &Task,
    text: &str,
) -> usize {
    let recipients: Vec<String> = task
        .assignees
        .iter()
        .map(|assignee| assignee.uid.clone())
        .collect();
    let preview = comment_preview(text, config.preview_chars);
    let docs: Vec<Value> = dedup_recipients(&recipients, &actor.uid)
        .into_iter()
        .map(|uid| {
            json!({
                "recipientId": uid,
                "senderId": actor.uid,
                "senderName": actor.display_name,
                "type": "comment",
                "taskId": task.id,
                "taskTitle": task.title,
                "commentPreview": preview,
                "read": false,
                "createdAt": MemoryStore::server_timestamp(),
            })
        })
        .collect();
    fan_out(store, docs).await
}

/// Mark a notification as read.
pub async fn mark_read(store: &MemoryStore, notification_id: &str) -> Result<()> {
    store
        .update(NOTIFICATIONS, notification_id, json!({ "read": true }))
        .await
}

/// Truncate comment text for display inside a notification.
pub fn comment_preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(max_chars).collect();
    preview.push('…');
    preview
}

fn dedup_recipients(uids: &[String], actor_uid: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    uids.iter()
        .filter(|uid| uid.as_str() != actor_uid)
        .filter(|uid| seen.insert(uid.as_str()))
        .cloned()
        .collect()
}

async fn fan_out(store: &MemoryStore, docs: Vec<Value>) -> usize {
    let mut delivered = 0;
    for doc in docs {
        let recipient = doc["recipientId"].as_str().unwrap_or_default().to_string();
        match store.create(NOTIFICATIONS, doc).await {
            Ok(_) => delivered += 1,
            Err(err) => {
                tracing::warn!(recipient, error = %err, "notification write failed, skipping recipient");
            }
        }
    }
    delivered
}

/// Live, bounded notification feed for one user: newest first, at most
/// `window` entries per delivery.
pub struct NotificationFeed {
    window: usize,
    subscription: Subscription,
}

impl NotificationFeed {
    pub fn open(store: &MemoryStore, uid: &str, window: usize) -> Self {
        let subscription = store.live_query(NOTIFICATIONS, Filter::field_eq("recipientId", uid));
        Self {
            window,
            subscription,
        }
    }

    /// Wait for the next feed snapshot.
    pub async fn next(&mut self) -> Option<Vec<Notification>> {
        let docs = self.subscription.next().await?;
        Some(self.project(docs))
    }

    /// Non-blocking read of an already-delivered snapshot.
    pub fn try_next(&mut self) -> Option<Vec<Notification>> {
        let docs = self.subscription.try_next()?;
        Some(self.project(docs))
    }

    pub fn cancel(&mut self) {
        self.subscription.cancel();
    }

    fn project(&self, docs: Vec<crate::store::Document>) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = docs
            .iter()
            .filter_map(|doc| match Notification::from_document(doc) {
                Ok(notification) => Some(notification),
                Err(err) => {
                    tracing::warn!(id = %doc.id, error = %err, "skipping malformed notification");
                    None
                }
            })
            .collect();
        notifications.sort_by(|left, right| match (&left.created_at, &right.created_at) {
            (Some(l), Some(r)) => r.cmp(l),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        notifications.truncate(self.window);
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text_intact() {
        assert_eq!(comment_preview("Looks good", 50), "Looks good");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let text = "é".repeat(60);
        let preview = comment_preview(&text, 50);
        assert_eq!(preview.chars().count(), 51);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn recipients_exclude_actor_and_duplicates() {
        let uids = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
        ];
        assert_eq!(dedup_recipients(&uids, "c"), vec!["a", "b"]);
    }
}
