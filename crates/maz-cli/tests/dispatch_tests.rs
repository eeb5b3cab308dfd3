//! Commands dispatched end to end against a mock Azure

use std::sync::Arc;

use maz_cache::ObjectType;
use maz_cli::{AzureContext, CliError, CommandRouter, Commands};
use maz_config::MazConfig;
use maz_sync::SyncError;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn context(server: &MockServer, dir: &TempDir) -> Arc<AzureContext> {
    let config = MazConfig {
        tenant_id: "2f4a9e3c-1b7d-4c6e-8a5f-0d9b3e7c1a24".into(),
        mg_token: Some("graph-token".into()),
        az_token: Some("arm-token".into()),
        cache_dir: dir.path().to_path_buf(),
        graph_url: format!("{}/graph", server.uri()),
        arm_url: format!("{}/arm", server.uri()),
        ..Default::default()
    };
    Arc::new(AzureContext::connect(config).unwrap())
}

async fn mount_group_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/graph/v1.0/groups"))
        .and(query_param("$filter", "displayName eq 'Ops'"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"value": [{"id": "g1", "displayName": "Ops"}]})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn ls_fills_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1.0/groups/delta"))
        .and(header("Authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "g1", "displayName": "Ops"}, {"id": "g2", "displayName": "Dev"}],
            "@odata.deltaLink": format!("{}/graph/v1.0/groups/delta?$deltatoken=x", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let ctx = context(&server, &dir);

    let command = Commands::Ls {
        kind: ObjectType::Group,
        filter: None,
        force: false,
        json: false,
    };
    CommandRouter::dispatch(ctx.clone(), &command).await.unwrap();

    assert_eq!(ctx.engine.count_local(ObjectType::Group).unwrap(), 2);
    let cache = ctx.engine.cache(ObjectType::Group).unwrap();
    assert!(cache.load_delta_link().is_some());
}

#[tokio::test]
async fn ls_with_no_matches_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1.0/groups/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [],
            "@odata.deltaLink": format!("{}/graph/v1.0/groups/delta?$deltatoken=x", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let ctx = context(&server, &dir);

    let command = Commands::Ls {
        kind: ObjectType::Group,
        filter: Some("nothing-here".into()),
        force: false,
        json: false,
    };
    CommandRouter::dispatch(ctx.clone(), &command).await.unwrap();
    assert_eq!(ctx.engine.count_local(ObjectType::Group).unwrap(), 0);
}

#[tokio::test]
async fn rm_without_force_only_shows_target() {
    let server = MockServer::start().await;
    mount_group_lookup(&server).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let command = Commands::Rm {
        kind: ObjectType::Group,
        identifier: "Ops".into(),
        force: false,
    };
    CommandRouter::dispatch(context(&server, &dir), &command)
        .await
        .unwrap();
}

#[tokio::test]
async fn rm_with_force_deletes() {
    let server = MockServer::start().await;
    mount_group_lookup(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/graph/v1.0/groups/g1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let ctx = context(&server, &dir);

    let command = Commands::Rm {
        kind: ObjectType::Group,
        identifier: "Ops".into(),
        force: true,
    };
    CommandRouter::dispatch(ctx.clone(), &command).await.unwrap();
    assert_eq!(ctx.engine.count_local(ObjectType::Group).unwrap(), 0);
}

#[tokio::test]
async fn apply_posts_definition_file() {
    let server = MockServer::start().await;
    let definition = json!({"displayName": "Billing", "signInAudience": "AzureADMyOrg"});
    Mock::given(method("POST"))
        .and(path("/graph/v1.0/applications"))
        .and(body_json(&definition))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "obj-1", "appId": "app-1", "displayName": "Billing"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("app.json");
    std::fs::write(&file, definition.to_string()).unwrap();
    let ctx = context(&server, &dir);

    let command = Commands::Apply {
        kind: ObjectType::Application,
        file,
    };
    CommandRouter::dispatch(ctx.clone(), &command).await.unwrap();

    let cached = ctx
        .engine
        .cache(ObjectType::Application)
        .unwrap()
        .find_by_id("obj-1")
        .unwrap();
    assert_eq!(cached.str_field("appId"), Some("app-1"));
}

#[tokio::test]
async fn get_unknown_name_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let command = Commands::Get {
        kind: ObjectType::User,
        identifier: "nobody".into(),
    };
    let err = CommandRouter::dispatch(context(&server, &dir), &command)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Sync(SyncError::NotFound { .. })));
    assert_eq!(err.user_message(), "No user matches 'nobody'.");
}
