//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Mutex, Once};
use this_db::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG=this_db=debug` shows pipeline logs
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn params(value: Value) -> Params {
    value.as_object().cloned().expect("params must be an object")
}

/// Records every call before forwarding it
pub struct CountingCaller {
    inner: Arc<dyn ActionCaller>,
    pub calls: Mutex<Vec<(String, Params)>>,
}

impl CountingCaller {
    pub fn new(inner: Arc<dyn ActionCaller>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ActionCaller for CountingCaller {
    async fn call(&self, ctx: &Context, action: &str, params: Params) -> ThisResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), params.clone()));
        self.inner.call(ctx, action, params).await
    }
}

/// Records lifecycle hooks together with the cache size seen at that moment
#[derive(Default)]
pub struct RecordingHooks {
    cacher: Option<MemoryCacher>,
    pub events: Mutex<Vec<(LifecycleEvent, Value, usize)>>,
}

impl RecordingHooks {
    pub fn watching(cacher: MemoryCacher) -> Self {
        Self {
            cacher: Some(cacher),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(LifecycleEvent, Value, usize)> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: LifecycleEvent, json: &Value) {
        let cached = self.cacher.as_ref().map(MemoryCacher::len).unwrap_or(0);
        self.events
            .lock()
            .unwrap()
            .push((event, json.clone(), cached));
    }
}

#[async_trait]
impl EntityLifecycle for RecordingHooks {
    async fn entity_created(&self, json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        self.record(LifecycleEvent::Created, json);
        Ok(())
    }

    async fn entity_updated(&self, json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        self.record(LifecycleEvent::Updated, json);
        Ok(())
    }

    async fn entity_removed(&self, json: &Value, _ctx: &Context) -> anyhow::Result<()> {
        self.record(LifecycleEvent::Removed, json);
        Ok(())
    }
}

/// Users and posts wired through a registry
///
/// Posts populate:
/// - `author`: scalar user id, resolved through `users.get`
/// - `reviewers`: list of user ids, resolved through `users.get`
/// - `writer`: reads `author`, only keeps the user's name
pub struct Fixture {
    pub registry: ServiceRegistry,
    pub users: Arc<DatabaseService<MemoryAdapter>>,
    pub posts: Arc<DatabaseService<MemoryAdapter>>,
    pub caller: Arc<CountingCaller>,
}

pub async fn setup() -> Fixture {
    setup_with(ServiceSettings::new("users")).await
}

pub async fn setup_with(user_settings: ServiceSettings) -> Fixture {
    init_tracing();
    let registry = ServiceRegistry::new();
    let caller = Arc::new(CountingCaller::new(registry.caller()));

    let users = DatabaseService::builder(user_settings, MemoryAdapter::new())
        .build()
        .unwrap();

    let mut writer_params = Params::new();
    writer_params.insert("fields".to_string(), json!(["name"]));
    let posts = DatabaseService::builder(ServiceSettings::new("posts"), MemoryAdapter::new())
        .with_caller(caller.clone())
        .with_populate("author", PopulateRule::Action("users.get".to_string()))
        .with_populate("reviewers", PopulateRule::Action("users.get".to_string()))
        .with_populate(
            "writer",
            PopulateRule::Rule {
                action: "users.get".to_string(),
                field: Some("author".to_string()),
                params: writer_params,
                populate: None,
            },
        )
        .build()
        .unwrap();

    users.started().await;
    posts.started().await;

    let users = Arc::new(users);
    let posts = Arc::new(posts);
    registry.register(users.clone());
    registry.register(posts.clone());

    Fixture {
        registry,
        users,
        posts,
        caller,
    }
}

/// Create users with fixed identities
pub async fn seed_users(users: &DatabaseService<MemoryAdapter>, people: &[(&str, &str)]) {
    let ctx = Context::new();
    for (id, name) in people {
        users
            .create(&ctx, params(json!({"_id": id, "name": name})))
            .await
            .unwrap();
    }
}
