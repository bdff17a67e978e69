//! Relation population across services
//!
//! These tests verify that:
//! - Each requested relation costs at most one call, whatever the document count
//! - Scalar and list relations are remapped onto the related entities
//! - Unmatched identities are dropped, unrequested relations are left alone
//! - A failing relation aborts the whole operation

mod common;

use common::{params, seed_users, setup, setup_with};
use this_db::prelude::*;

#[tokio::test]
async fn test_shared_identity_resolved_with_one_call() {
    let fx = setup().await;
    seed_users(&fx.users, &[("42", "Ada")]).await;
    let ctx = Context::new();
    for title in ["first", "second"] {
        fx.posts
            .create(&ctx, params(json!({"title": title, "author": "42"})))
            .await
            .unwrap();
    }
    fx.caller.reset();

    let posts = fx
        .posts
        .find(&ctx, params(json!({"populate": "author", "sort": "title"})))
        .await
        .unwrap();

    let calls = fx.caller.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "users.get");
    assert_eq!(calls[0].1["id"], json!(["42"]));
    assert_eq!(calls[0].1["mapping"], json!(true));

    assert_eq!(posts[0]["author"]["name"], "Ada");
    assert_eq!(posts[0]["author"], posts[1]["author"]);
}

#[tokio::test]
async fn test_list_relation_drops_unmatched_identities() {
    let fx = setup().await;
    seed_users(&fx.users, &[("1", "Ada"), ("2", "Grace")]).await;
    let ctx = Context::new();
    fx.posts
        .create(
            &ctx,
            params(json!({"title": "review", "reviewers": ["2", "404", "1"]})),
        )
        .await
        .unwrap();

    let posts = fx
        .posts
        .find(&ctx, params(json!({"populate": ["reviewers"]})))
        .await
        .unwrap();

    let names: Vec<&str> = posts[0]["reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Grace", "Ada"]);
}

#[tokio::test]
async fn test_unmatched_scalar_relation_is_removed() {
    let fx = setup().await;
    let ctx = Context::new();
    fx.posts
        .create(&ctx, params(json!({"title": "orphan", "author": "gone"})))
        .await
        .unwrap();

    let posts = fx
        .posts
        .find(&ctx, params(json!({"populate": "author"})))
        .await
        .unwrap();

    assert_eq!(posts[0]["title"], "orphan");
    assert!(posts[0].get("author").is_none());
}

#[tokio::test]
async fn test_unrequested_or_empty_relations_make_no_calls() {
    let fx = setup().await;
    let ctx = Context::new();
    fx.posts
        .create(&ctx, params(json!({"title": "draft", "author": null})))
        .await
        .unwrap();
    fx.caller.reset();

    let plain = fx.posts.find(&ctx, Params::new()).await.unwrap();
    let populated = fx
        .posts
        .find(&ctx, params(json!({"populate": "author"})))
        .await
        .unwrap();

    assert!(fx.caller.calls().is_empty());
    assert_eq!(plain, populated);
    assert_eq!(populated[0]["author"], Value::Null);
}

#[tokio::test]
async fn test_rule_reads_other_field_and_forwards_params() {
    let fx = setup().await;
    fx.users
        .create(
            &Context::new(),
            params(json!({"_id": "7", "name": "Ada", "email": "ada@example.com"})),
        )
        .await
        .unwrap();
    let ctx = Context::new();
    let post = fx
        .posts
        .create(&ctx, params(json!({"title": "notes", "author": "7"})))
        .await
        .unwrap();

    let fetched = fx
        .posts
        .get(
            &ctx,
            params(json!({"id": post["_id"], "populate": "writer,author"})),
        )
        .await
        .unwrap();

    assert_eq!(fetched["writer"], json!({"name": "Ada"}));
    assert_eq!(fetched["author"]["email"], "ada@example.com");
    assert_eq!(fx.caller.calls().len(), 2);
}

#[tokio::test]
async fn test_population_bypasses_soft_delete() {
    let mut settings = ServiceSettings::new("users");
    settings.soft_delete = true;
    let fx = setup_with(settings).await;
    seed_users(&fx.users, &[("1", "Ada")]).await;
    let ctx = Context::new();
    fx.posts
        .create(&ctx, params(json!({"title": "legacy", "author": "1"})))
        .await
        .unwrap();
    fx.users.remove(&ctx, params(json!({"id": "1"}))).await.unwrap();

    let posts = fx
        .posts
        .find(&ctx, params(json!({"populate": "author"})))
        .await
        .unwrap();

    assert_eq!(posts[0]["author"]["name"], "Ada");
    assert!(posts[0]["author"]["deleted_at"].is_string());
    assert_eq!(fx.caller.calls()[0].1["withDeleted"], json!(true));
}

#[tokio::test]
async fn test_population_runs_before_field_filtering() {
    let fx = setup().await;
    seed_users(&fx.users, &[("1", "Ada")]).await;
    let ctx = Context::new();
    fx.posts
        .create(&ctx, params(json!({"title": "t", "author": "1", "body": "long"})))
        .await
        .unwrap();

    let posts = fx
        .posts
        .find(
            &ctx,
            params(json!({"populate": "author", "fields": "title author.name"})),
        )
        .await
        .unwrap();

    assert_eq!(posts[0], json!({"title": "t", "author": {"name": "Ada"}}));
}

#[tokio::test]
async fn test_failing_relation_aborts_operation() {
    let fx = setup().await;
    let registry = fx.registry.clone();
    let comments = DatabaseService::builder(ServiceSettings::new("comments"), MemoryAdapter::new())
        .with_caller(registry.caller())
        .with_populate("post", PopulateRule::Action("posts.get".to_string()))
        .with_populate("ghost", PopulateRule::Action("ghosts.get".to_string()))
        .build()
        .unwrap();
    let ctx = Context::new();
    let post = fx
        .posts
        .create(&ctx, params(json!({"title": "t"})))
        .await
        .unwrap();
    comments
        .create(&ctx, params(json!({"post": post["_id"], "ghost": "x"})))
        .await
        .unwrap();

    let err = comments
        .find(&ctx, params(json!({"populate": "post,ghost"})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ThisError::Call(CallError::ServiceNotFound { ref service }) if service == "ghosts"
    ));
}

#[tokio::test]
async fn test_custom_handler_replaces_values() {
    struct Initials;

    #[async_trait]
    impl PopulateHandler for Initials {
        async fn populate(
            &self,
            ids: &[Value],
            docs: &[Document],
            relation: &str,
            _ctx: &Context,
        ) -> ThisResult<Vec<Option<Value>>> {
            assert_eq!(ids.len(), 2);
            Ok(docs
                .iter()
                .map(|doc| {
                    doc.get(relation)
                        .and_then(Value::as_str)
                        .and_then(|name| name.chars().next())
                        .map(|c| json!(c.to_string()))
                })
                .collect())
        }
    }

    let tags = DatabaseService::builder(ServiceSettings::new("tags"), MemoryAdapter::new())
        .with_populate("label", PopulateRule::Handler(Arc::new(Initials)))
        .build()
        .unwrap();
    let ctx = Context::new();
    tags.insert(
        &ctx,
        params(json!({"entities": [{"label": "rust"}, {"label": "tokio"}, {"label": "rust"}]})),
    )
    .await
    .unwrap();

    let rows = tags
        .find(&ctx, params(json!({"populate": "label", "fields": "label"})))
        .await
        .unwrap();

    assert_eq!(rows, json!([{"label": "r"}, {"label": "t"}, {"label": "r"}]));
}

#[tokio::test]
async fn test_relations_resolve_concurrently() {
    use std::time::Duration;
    use tokio::sync::Barrier;

    struct WaitingHandler(Arc<Barrier>);

    #[async_trait]
    impl PopulateHandler for WaitingHandler {
        async fn populate(
            &self,
            _ids: &[Value],
            docs: &[Document],
            relation: &str,
            _ctx: &Context,
        ) -> ThisResult<Vec<Option<Value>>> {
            self.0.wait().await;
            Ok(docs
                .iter()
                .map(|doc| doc.get(relation).map(|label| json!({"text": label})))
                .collect())
        }
    }

    struct WaitingCaller(Arc<Barrier>);

    #[async_trait]
    impl ActionCaller for WaitingCaller {
        async fn call(&self, _ctx: &Context, _action: &str, params: Params) -> ThisResult<Value> {
            self.0.wait().await;
            let ids = params
                .get("id")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(Value::Object(
                ids.into_iter()
                    .filter_map(|id| {
                        let key = id.as_str()?.to_string();
                        Some((key, json!({"_id": id, "name": "Ada"})))
                    })
                    .collect(),
            ))
        }
    }

    // Both relations must be in flight at once to get past the barrier.
    let barrier = Arc::new(Barrier::new(2));
    let posts = DatabaseService::builder(ServiceSettings::new("posts"), MemoryAdapter::new())
        .with_caller(Arc::new(WaitingCaller(barrier.clone())))
        .with_populate("author", PopulateRule::Action("users.get".to_string()))
        .with_populate("label", PopulateRule::Handler(Arc::new(WaitingHandler(barrier))))
        .build()
        .unwrap();
    let ctx = Context::new();
    posts
        .create(&ctx, params(json!({"_id": "p1", "author": "u1", "label": "draft"})))
        .await
        .unwrap();

    let row = tokio::time::timeout(
        Duration::from_secs(5),
        posts.get(&ctx, params(json!({"id": "p1", "populate": ["author", "label"]}))),
    )
    .await
    .expect("relations were resolved one after the other")
    .unwrap();

    assert_eq!(row["author"], json!({"_id": "u1", "name": "Ada"}));
    assert_eq!(row["label"], json!({"text": "draft"}));
}
