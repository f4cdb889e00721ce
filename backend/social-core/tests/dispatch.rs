//! Change-record routing to the user sync handlers

mod common;

use common::{PushCall, RecordingPushClient, SearchCall, TestEnv};
use doc_store::Item;
use serde_json::json;
use social_core::models::user::UserStatus;
use social_core::stream::{EventName, StreamRecord, SyncHandler, UserSyncDispatcher};

fn record(event_name: EventName, old: Option<Item>, new: Option<Item>) -> StreamRecord {
    let keys = match json!({"partitionKey": "user/u1", "sortKey": "profile"}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    StreamRecord {
        event_name,
        keys,
        old_image: old,
        new_image: new,
    }
}

#[tokio::test]
async fn test_insert_runs_every_handler() {
    let env = TestEnv::new();
    env.create_user("u1", "spock").await;
    let dispatcher = UserSyncDispatcher::new(env.managers.user.clone());

    let item = env.user_item("u1").await;
    let outcome = dispatcher
        .dispatch(&record(EventName::Insert, None, Some(item)))
        .await;
    assert_eq!(outcome.invoked, SyncHandler::ALL.to_vec());
    assert!(outcome.is_ok());
    assert_eq!(
        env.search.calls(),
        vec![SearchCall::Put {
            user_id: "u1".into(),
            username: "spock".into(),
            full_name: None,
        }]
    );
    assert!(env.push.calls().contains(&PushCall::Enable("u1".into())));
}

#[tokio::test]
async fn test_modify_runs_only_watching_handlers() {
    let env = TestEnv::new();
    env.create_user("u1", "spock").await;
    let dispatcher = UserSyncDispatcher::new(env.managers.user.clone());

    let old = env.user_item("u1").await;
    env.managers
        .user
        .set_user_status("u1", UserStatus::Disabled)
        .await
        .unwrap();
    let new = env.user_item("u1").await;

    let outcome = dispatcher
        .dispatch(&record(EventName::Modify, Some(old.clone()), Some(new)))
        .await;
    assert_eq!(outcome.invoked, vec![SyncHandler::PushUserStatus]);
    assert_eq!(env.push.calls(), vec![PushCall::Disable("u1".into())]);
    assert!(env.search.calls().is_empty());

    let outcome = dispatcher
        .dispatch(&record(EventName::Modify, Some(old.clone()), Some(old)))
        .await;
    assert!(outcome.invoked.is_empty());
}

#[tokio::test]
async fn test_remove_cleans_up_external_state() {
    let env = TestEnv::new();
    env.create_user("u1", "spock").await;
    let dispatcher = UserSyncDispatcher::new(env.managers.user.clone());

    let old = env.user_item("u1").await;
    let outcome = dispatcher
        .dispatch(&record(EventName::Remove, Some(old), None))
        .await;
    assert!(outcome.is_ok());
    assert_eq!(
        env.search.calls(),
        vec![SearchCall::Delete { user_id: "u1".into() }]
    );
    let calls = env.push.calls();
    assert!(calls.contains(&PushCall::DeleteAll("u1".into())));
    assert!(calls.contains(&PushCall::DeleteEndpoint {
        user_id: "u1".into(),
        channel: social_core::clients::Channel::Email,
    }));
}

#[tokio::test]
async fn test_handler_failures_do_not_stop_the_rest() {
    let env = TestEnv::with_push(RecordingPushClient::failing());
    env.create_user("u1", "spock").await;
    let dispatcher = UserSyncDispatcher::new(env.managers.user.clone());

    let item = env.user_item("u1").await;
    let outcome = dispatcher
        .dispatch(&record(EventName::Insert, None, Some(item)))
        .await;
    assert_eq!(
        outcome.failed,
        vec![SyncHandler::PushEmail, SyncHandler::PushPhone, SyncHandler::PushUserStatus]
    );
    assert_eq!(outcome.invoked.len(), SyncHandler::ALL.len());
    assert_eq!(env.search.calls().len(), 1);
}

#[tokio::test]
async fn test_non_profile_records_are_skipped() {
    let env = TestEnv::new();
    let dispatcher = UserSyncDispatcher::new(env.managers.user.clone());
    let mut record = record(EventName::Insert, None, None);
    record.keys.insert("sortKey".into(), json!("follower/u2"));

    let outcome = dispatcher.dispatch(&record).await;
    assert!(outcome.invoked.is_empty());
    assert!(env.push.calls().is_empty());
}
