#![allow(dead_code)]

use std::sync::Once;

use taskflow::config::Config;
use taskflow::model::Assignee;
use taskflow::session::CurrentUser;
use taskflow::store::MemoryStore;
use taskflow::tasks::TaskRepository;

static TRACING: Once = Once::new();

/// Shared fixture: an in-memory store plus a task repository over it with
/// retry delays zeroed out so failure-path tests stay fast.
pub struct TestWorkspace {
    pub store: MemoryStore,
    pub repo: TaskRepository,
    pub config: Config,
}

impl TestWorkspace {
    pub fn new() -> Self {
        TRACING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "warn".into()),
                )
                .with_test_writer()
                .try_init();
        });
        let mut config = Config::default();
        config.retry.delay_ms = 0;
        let store = MemoryStore::new();
        let repo = TaskRepository::new(store.clone(), config.clone());
        Self {
            store,
            repo,
            config,
        }
    }
}

pub fn user(uid: &str, name: &str) -> CurrentUser {
    CurrentUser::new(uid, name, format!("{uid}@example.com"))
}

pub fn assignee(uid: &str, name: &str) -> Assignee {
    Assignee {
        uid: uid.to_string(),
        display_name: name.to_string(),
        photo_url: None,
    }
}
