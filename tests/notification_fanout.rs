mod support;

use serde_json::json;
use support::{assignee, user, TestWorkspace};
use taskflow::model::{NotificationKind, NOTIFICATIONS};
use taskflow::notify::{self, NotificationFeed};
use taskflow::store::Filter;
use taskflow::tasks::{NewTask, TaskChanges};

#[tokio::test]
async fn creating_a_task_notifies_assignees_but_not_the_actor() {
    let ws = TestWorkspace::new();
    let actor = user("ua", "Ada");
    let input = NewTask {
        title: "Shared work".to_string(),
        assignees: vec![assignee("ua", "Ada"), assignee("ub", "Bea")],
        ..NewTask::default()
    };
    let task_id = ws
        .repo
        .create_task(input, "c1", &actor)
        .await
        .expect("create");

    let docs = ws
        .store
        .query(NOTIFICATIONS, &Filter::All)
        .await
        .expect("query");
    assert_eq!(docs.len(), 1, "exactly one notification, none for the actor");
    assert_eq!(docs[0].fields["recipientId"], json!("ub"));
    assert_eq!(docs[0].fields["type"], json!("task_assigned"));
    assert_eq!(docs[0].fields["taskId"], json!(task_id));
    assert_eq!(docs[0].fields["senderName"], json!("Ada"));
}

#[tokio::test]
async fn commenting_notifies_every_assignee_except_the_commenter() {
    let ws = TestWorkspace::new();
    let creator = user("uc", "Cleo");
    let commenter = user("ub", "Bea");
    let input = NewTask {
        title: "Discussed".to_string(),
        assignees: vec![assignee("ua", "Ada"), assignee("ub", "Bea")],
        ..NewTask::default()
    };
    let task_id = ws
        .repo
        .create_task(input, "c1", &creator)
        .await
        .expect("create");

    // Clear the assignment notifications before measuring the comment ones.
    let before = ws.store.query(NOTIFICATIONS, &Filter::All).await.unwrap();
    for doc in &before {
        ws.store.delete(NOTIFICATIONS, &doc.id).await.unwrap();
    }

    ws.repo
        .add_comment(&task_id, "What is the status here?", &commenter)
        .await
        .expect("comment");

    let docs = ws.store.query(NOTIFICATIONS, &Filter::All).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].fields["recipientId"], json!("ua"));
    assert_eq!(docs[0].fields["type"], json!("comment"));
    assert_eq!(
        docs[0].fields["commentPreview"],
        json!("What is the status here?")
    );
}

#[tokio::test]
async fn long_comments_are_previewed() {
    let ws = TestWorkspace::new();
    let actor = user("ua", "Ada");
    let input = NewTask {
        title: "Wordy".to_string(),
        assignees: vec![assignee("ub", "Bea")],
        ..NewTask::default()
    };
    let task_id = ws
        .repo
        .create_task(input, "c1", &actor)
        .await
        .expect("create");

    let text = "x".repeat(120);
    ws.repo
        .add_comment(&task_id, &text, &actor)
        .await
        .expect("comment");

    let mut feed = NotificationFeed::open(&ws.store, "ub", ws.config.notifications.feed_window);
    let snapshot = feed.next().await.expect("feed");
    let comment = snapshot
        .iter()
        .find(|n| n.kind == NotificationKind::Comment)
        .expect("comment notification");
    let preview = comment.comment_preview.as_deref().expect("preview");
    assert_eq!(preview.chars().count(), 51);
    assert!(preview.ends_with('…'));
}

#[tokio::test]
async fn editing_in_new_assignees_notifies_only_the_added() {
    let ws = TestWorkspace::new();
    let actor = user("ua", "Ada");
    let input = NewTask {
        title: "Growing".to_string(),
        assignees: vec![assignee("ub", "Bea")],
        ..NewTask::default()
    };
    let task_id = ws
        .repo
        .create_task(input, "c1", &actor)
        .await
        .expect("create");

    ws.repo
        .update_task(
            &task_id,
            TaskChanges {
                assignees: Some(vec![assignee("ub", "Bea"), assignee("uc", "Cleo")]),
                ..TaskChanges::default()
            },
            &actor,
        )
        .await
        .expect("update");

    let docs = ws
        .store
        .query(NOTIFICATIONS, &Filter::field_eq("recipientId", "uc"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    let docs = ws
        .store
        .query(NOTIFICATIONS, &Filter::field_eq("recipientId", "ub"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1, "existing assignee is not re-notified");
}

#[tokio::test]
async fn feed_is_bounded_and_newest_first() {
    let ws = TestWorkspace::new();
    for i in 0..25 {
        ws.store
            .create(
                NOTIFICATIONS,
                json!({
                    "recipientId": "ua",
                    "senderId": "ub",
                    "senderName": "Bea",
                    "type": "task_assigned",
                    "taskId": format!("t{i}"),
                    "taskTitle": format!("Task {i}"),
                    "createdAt": format!("2025-03-01T10:{:02}:00Z", i),
                }),
            )
            .await
            .expect("seed");
    }

    let mut feed = NotificationFeed::open(&ws.store, "ua", ws.config.notifications.feed_window);
    let snapshot = feed.next().await.expect("initial");
    assert_eq!(snapshot.len(), 20);
    assert_eq!(snapshot[0].task_id, "t24");
    assert_eq!(snapshot[19].task_id, "t5");
}

#[tokio::test]
async fn cancelled_feed_goes_quiet() {
    let ws = TestWorkspace::new();
    let mut feed = NotificationFeed::open(&ws.store, "ua", 20);
    assert!(feed.next().await.expect("initial").is_empty());

    feed.cancel();
    ws.store
        .create(
            NOTIFICATIONS,
            json!({
                "recipientId": "ua",
                "senderId": "ub",
                "senderName": "Bea",
                "type": "comment",
                "taskId": "t1",
                "taskTitle": "Task",
            }),
        )
        .await
        .expect("write");
    assert!(feed.try_next().is_none());
}

#[tokio::test]
async fn mark_read_flips_the_flag() {
    let ws = TestWorkspace::new();
    let id = ws
        .store
        .create(
            NOTIFICATIONS,
            json!({
                "recipientId": "ua",
                "senderId": "ub",
                "senderName": "Bea",
                "type": "comment",
                "taskId": "t1",
                "taskTitle": "Task",
                "read": false,
            }),
        )
        .await
        .expect("write");

    notify::mark_read(&ws.store, &id).await.expect("mark");
    let doc = ws.store.get(NOTIFICATIONS, &id).await.unwrap().unwrap();
    assert_eq!(doc.fields["read"], json!(true));
}
