//! Feed rows under both key schemes

mod common;

use common::later;
use doc_store::{get_str, PrimaryKey, StoreClient};
use social_core::models::feed::{FeedDynamo, FeedEntry, KeyScheme};
use social_core::models::post::{PostDynamo, PostItem};

fn post(post_id: &str, user_id: &str, offset: i64) -> PostItem {
    PostDynamo::build_item(post_id, user_id, "", Vec::new(), later(offset), false)
}

#[test]
fn test_build_and_parse_pk() {
    let current = FeedDynamo::build_pk("u1", "p1", KeyScheme::Current);
    assert_eq!(current, PrimaryKey::new("post/p1", "feed/u1"));
    let legacy = FeedDynamo::build_pk("u1", "p1", KeyScheme::Legacy);
    assert_eq!(legacy, PrimaryKey::new("user/u1", "feed/p1"));

    let expected = Some(("u1".to_string(), "p1".to_string()));
    assert_eq!(FeedDynamo::parse_pk(&current), expected);
    assert_eq!(FeedDynamo::parse_pk(&legacy), expected);
    assert_eq!(FeedDynamo::parse_pk(&PrimaryKey::new("user/u1", "profile")), None);
    assert_eq!(FeedDynamo::parse_pk(&PrimaryKey::new("comment/c1", "feed/x")), None);
}

#[test]
fn test_build_item_shapes() {
    let post = post("p1", "author", 0);
    let item = FeedDynamo::build_item("reader", &post, KeyScheme::Current);
    assert_eq!(get_str(&item, "partitionKey"), Some("post/p1"));
    assert_eq!(get_str(&item, "sortKey"), Some("feed/reader"));
    assert_eq!(item.get("schemaVersion").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(get_str(&item, "gsiA1PartitionKey"), Some("feed/reader"));
    assert_eq!(get_str(&item, "gsiA2PartitionKey"), Some("feed/reader"));
    assert_eq!(get_str(&item, "gsiA2SortKey"), Some("author"));
    assert_eq!(get_str(&item, "gsiK2PartitionKey"), Some("feed/reader/author"));
    assert_eq!(get_str(&item, "gsiA1SortKey"), get_str(&item, "postedAt"));

    let entry = FeedEntry::from_item(&item).unwrap();
    assert_eq!(entry.feed_user_id, "reader");
    assert_eq!(entry.post_id, "p1");
    assert_eq!(entry.posted_by_user_id, "author");

    let legacy = FeedDynamo::build_item("reader", &post, KeyScheme::Legacy);
    assert_eq!(get_str(&legacy, "partitionKey"), Some("user/reader"));
    assert!(!legacy.contains_key("gsiA2PartitionKey"));
    assert!(!legacy.contains_key("gsiA2SortKey"));
    assert_eq!(get_str(&legacy, "gsiK2PartitionKey"), Some("feed/reader/author"));
}

#[tokio::test]
async fn test_generate_feed_newest_first_across_schemes() {
    let dynamo = FeedDynamo::new(StoreClient::in_memory());
    let posts = [post("p1", "a", 1), post("p2", "b", 3), post("p3", "a", 2)];
    dynamo
        .add_posts_to_feed("reader", &posts[..2], KeyScheme::Current)
        .await
        .unwrap();
    dynamo
        .add_posts_to_feed("reader", &posts[2..], KeyScheme::Legacy)
        .await
        .unwrap();

    let feed = dynamo.generate_feed("reader").collect_all().await.unwrap();
    let post_ids: Vec<_> = feed
        .iter()
        .filter_map(|item| get_str(item, "postId"))
        .collect();
    assert_eq!(post_ids, vec!["p2", "p3", "p1"]);
}

#[tokio::test]
async fn test_delete_by_post_owner_spans_pages_and_schemes() {
    let dynamo = FeedDynamo::new(StoreClient::in_memory());
    let mine: Vec<_> = (0..130).map(|i| post(&format!("a{i}"), "a", i)).collect();
    let theirs = post("b0", "b", 0);
    dynamo
        .add_posts_to_feed("reader", &mine[..100], KeyScheme::Current)
        .await
        .unwrap();
    dynamo
        .add_posts_to_feed("reader", &mine[100..], KeyScheme::Legacy)
        .await
        .unwrap();
    dynamo
        .add_posts_to_feed("reader", [&theirs], KeyScheme::Current)
        .await
        .unwrap();

    assert_eq!(dynamo.delete_by_post_owner("reader", "a").await.unwrap(), 130);
    let left = dynamo.generate_feed("reader").collect_all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(get_str(&left[0], "postId"), Some("b0"));
}

#[tokio::test]
async fn test_delete_by_post_probes_both_schemes() {
    let client = StoreClient::in_memory();
    let dynamo = FeedDynamo::new(client.clone());
    let shared = post("p1", "a", 0);
    dynamo
        .add_post_to_feeds(["r1", "r2"], &shared, KeyScheme::Current)
        .await
        .unwrap();
    dynamo
        .add_post_to_feeds(["r3"], &shared, KeyScheme::Legacy)
        .await
        .unwrap();

    let requests = dynamo
        .delete_by_post("p1", ["r1", "r2", "r3"])
        .await
        .unwrap();
    assert_eq!(requests, 6);
    for reader in ["r1", "r2", "r3"] {
        for scheme in [KeyScheme::Current, KeyScheme::Legacy] {
            let key = FeedDynamo::build_pk(reader, "p1", scheme);
            assert!(client.get_item(&key, true).await.unwrap().is_none());
        }
    }
}

#[tokio::test]
async fn test_feed_pks_by_posted_by_user_are_keys_only() {
    let dynamo = FeedDynamo::new(StoreClient::in_memory());
    dynamo
        .add_posts_to_feed("reader", &[post("p1", "a", 0), post("p2", "b", 1)], KeyScheme::Current)
        .await
        .unwrap();

    let keys = dynamo
        .generate_feed_pks_by_posted_by_user("reader", "a")
        .collect_all()
        .await
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].len(), 2);
    assert_eq!(
        PrimaryKey::from_item(&keys[0]).unwrap(),
        FeedDynamo::build_pk("reader", "p1", KeyScheme::Current)
    );
}
