//! Comment creation, views, deletion and flagging through the wired managers

mod common;

use common::{capture_logs, later, now, TestEnv};
use doc_store::Update;
use social_core::models::card::CardSpec;
use social_core::models::post::PostDynamo;
use social_core::models::user::{PrivacyStatus, UserDynamo};
use social_core::{CommentError, PostError};
use uuid::Uuid;

async fn env_with_post() -> TestEnv {
    let env = TestEnv::new();
    env.create_user("owner", "kirk").await;
    env.create_user("commenter", "spock").await;
    env.managers
        .post
        .add_post("p1", "owner", "to boldly go", now(), false)
        .await
        .unwrap();
    env
}

#[tokio::test]
async fn test_add_comment_writes_counters_and_activity() {
    let env = env_with_post().await;

    let comment = env
        .managers
        .comment
        .add_comment("c1", "p1", "commenter", "lorem @kirk", later(1))
        .await
        .unwrap();
    assert_eq!(comment.id(), "c1");
    assert_eq!(comment.post_id(), "p1");
    assert_eq!(comment.item.text_tags.len(), 1);
    assert_eq!(comment.item.text_tags[0].user_id, "owner");

    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, Some(1));
    assert_eq!(post.item.comments_unviewed_count, Some(1));
    assert!(post.has_new_comment_activity());

    assert_eq!(env.user("commenter").await.counters.comment_count, Some(1));
    assert_eq!(
        env.user("owner").await.counters.post_has_new_comment_activity_count,
        Some(1)
    );
    let card = env
        .managers
        .card
        .get_card(&CardSpec::comment_activity("owner", "p1").card_id)
        .await
        .unwrap();
    assert!(card.is_some());
}

#[tokio::test]
async fn test_owner_comment_is_not_activity() {
    let env = env_with_post().await;
    env.managers
        .comment
        .add_comment("c1", "p1", "owner", "first", later(1))
        .await
        .unwrap();

    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, Some(1));
    assert_eq!(post.item.comments_unviewed_count, None);
    assert!(!post.has_new_comment_activity());
    assert_eq!(env.user("owner").await.counters.comment_count, Some(1));
}

#[tokio::test]
async fn test_add_comment_rejections() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;

    let err = comments
        .add_comment("c1", "p9", "commenter", "x", now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommentError::PostDoesNotExist(ref id) if id == "p9"));
    assert_eq!(err.to_string(), "Post `p9` does not exist");

    env.managers
        .post
        .add_post("p2", "owner", "quiet", now(), true)
        .await
        .unwrap();
    assert!(matches!(
        comments.add_comment("c1", "p2", "commenter", "x", now()).await,
        Err(CommentError::CommentsDisabled(_))
    ));

    env.managers.block.block("owner", "commenter", now()).await.unwrap();
    let err = comments
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Post owner `owner` has blocked user `commenter`"
    );
    env.managers.block.unblock("owner", "commenter").await.unwrap();

    env.managers.block.block("commenter", "owner", now()).await.unwrap();
    assert!(matches!(
        comments.add_comment("c1", "p1", "commenter", "x", now()).await,
        Err(CommentError::BlockedPostOwner { .. })
    ));
    env.managers.block.unblock("commenter", "owner").await.unwrap();

    // nothing was written by the refused attempts
    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, None);
    assert!(comments.get_comment("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_private_owner_requires_accepted_follow() {
    let env = env_with_post().await;
    env.managers
        .user
        .set_privacy_status("owner", PrivacyStatus::Private)
        .await
        .unwrap();

    let err = env
        .managers
        .comment
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Post owner `owner` is private and user `commenter` is not a follower"
    );

    env.managers
        .follow
        .request_to_follow("commenter", "owner", now())
        .await
        .unwrap();
    assert!(matches!(
        env.managers.comment.add_comment("c1", "p1", "commenter", "x", now()).await,
        Err(CommentError::NotFollower { .. })
    ));

    env.managers
        .follow
        .accept_follower("commenter", "owner")
        .await
        .unwrap();
    env.managers
        .comment
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transaction_failures_map_to_their_item() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap();

    let err = comments
        .add_comment("c1", "p1", "commenter", "again", now())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to add comment with id `c1`... id already used?"
    );

    // a commenter without a profile row fails the user counter item
    let err = comments
        .add_comment("c2", "p1", "ghost", "boo", now())
        .await
        .unwrap_err();
    assert!(matches!(err, CommentError::UserCommentCountIncrement(ref id) if id == "ghost"));
    assert!(comments.get_comment("c2").await.unwrap().is_none());

    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, Some(1));
}

#[tokio::test]
async fn test_record_views_clears_activity_for_owner() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "one", later(1))
        .await
        .unwrap();
    comments
        .add_comment("c2", "p1", "commenter", "two", later(2))
        .await
        .unwrap();

    // the author's own views are not recorded
    comments.record_views(&["c1"], "commenter", later(3)).await.unwrap();
    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert!(post.has_new_comment_activity());

    comments
        .record_views(&["c1", "c2", "c1"], "owner", later(4))
        .await
        .unwrap();
    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert!(!post.has_new_comment_activity());
    assert_eq!(post.item.comments_unviewed_count, Some(0));
    assert_eq!(
        env.user("owner").await.counters.post_has_new_comment_activity_count,
        Some(0)
    );
    let c1 = comments.get_comment("c1").await.unwrap().unwrap();
    assert_eq!(c1.item.viewed_by_count, Some(1));

    let card = env
        .managers
        .card
        .get_card(&CardSpec::comment_activity("owner", "p1").card_id)
        .await
        .unwrap();
    assert!(card.is_none());
}

#[tokio::test]
async fn test_record_views_clears_only_the_viewers_posts() {
    let env = env_with_post().await;
    env.create_user("other", "mccoy").await;
    env.managers
        .post
        .add_post("p2", "other", "sickbay", now(), false)
        .await
        .unwrap();
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "one", later(1))
        .await
        .unwrap();
    comments
        .add_comment("c2", "p2", "commenter", "two", later(2))
        .await
        .unwrap();

    // p2 belongs to someone else and is handled after p1
    comments
        .record_views(&["c2", "c1"], "owner", later(3))
        .await
        .unwrap();

    let p1 = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert!(!p1.has_new_comment_activity());
    let p2 = env.managers.post.get_post("p2", true).await.unwrap().unwrap();
    assert!(p2.has_new_comment_activity());
    assert_eq!(
        env.user("other").await.counters.post_has_new_comment_activity_count,
        Some(1)
    );
}

#[tokio::test]
async fn test_record_views_skips_missing_comments() {
    let env = env_with_post().await;
    let (logs, _guard) = capture_logs();

    let empty: [&str; 0] = [];
    env.managers
        .comment
        .record_views(&empty, "owner", now())
        .await
        .unwrap();
    env.managers
        .comment
        .record_views(&["nope"], "owner", now())
        .await
        .unwrap();

    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("`owner`"));
    assert!(warnings[0].contains("`nope`"));
}

#[tokio::test]
async fn test_delete_comment_authorization() {
    let env = env_with_post().await;
    env.create_user("other", "mccoy").await;
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "x", later(1))
        .await
        .unwrap();
    comments
        .add_comment("c2", "p1", "commenter", "y", later(2))
        .await
        .unwrap();

    assert!(matches!(
        comments.delete_comment("c1", "other", later(3)).await,
        Err(CommentError::NotAuthorizedToDelete { .. })
    ));
    comments.delete_comment("c1", "commenter", later(3)).await.unwrap();
    comments.delete_comment("c2", "owner", later(4)).await.unwrap();
    assert!(matches!(
        comments.delete_comment("c2", "owner", later(5)).await,
        Err(CommentError::CommentDoesNotExist(_))
    ));

    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, Some(0));
    let user = env.user("commenter").await;
    assert_eq!(user.counters.comment_count, Some(0));
    assert_eq!(user.counters.comment_deleted_count, Some(2));
    assert_eq!(user.counters.comment_forced_deletion_count, None);
}

#[tokio::test]
async fn test_flagging_and_forced_delete() {
    let env = env_with_post().await;
    for (id, name) in [("f1", "sulu"), ("f2", "uhura"), ("f3", "chekov"), ("f4", "scotty"), ("f5", "chapel")] {
        env.create_user(id, name).await;
    }
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap();

    assert!(matches!(
        comments.flag_comment("c1", "commenter", now()).await,
        Err(CommentError::CannotFlagOwnComment { .. })
    ));
    comments.flag_comment("c1", "f1", now()).await.unwrap().unwrap();
    assert!(matches!(
        comments.flag_comment("c1", "f1", now()).await,
        Err(CommentError::AlreadyFlagged { .. })
    ));
    let comment = comments.unflag_comment("c1", "f1").await.unwrap();
    assert_eq!(comment.flag_count(), 0);
    assert!(matches!(
        comments.unflag_comment("c1", "f1").await,
        Err(CommentError::NotFlagged { .. })
    ));

    for flagger in ["f1", "f2", "f3", "f4"] {
        let comment = comments.flag_comment("c1", flagger, now()).await.unwrap();
        assert!(comment.is_some());
    }
    assert!(comments.flag_comment("c1", "f5", now()).await.unwrap().is_none());
    assert!(comments.get_comment("c1").await.unwrap().is_none());

    let user = env.user("commenter").await;
    assert_eq!(user.counters.comment_forced_deletion_count, Some(1));
}

#[tokio::test]
async fn test_post_owner_flag_deletes_immediately() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;
    comments
        .add_comment("c1", "p1", "commenter", "x", now())
        .await
        .unwrap();

    assert!(comments.flag_comment("c1", "owner", now()).await.unwrap().is_none());
    assert!(comments.get_comment("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_deletes_and_post_cascade() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;
    env.managers
        .post
        .add_post("p2", "owner", "second", now(), false)
        .await
        .unwrap();
    for (index, post_id) in ["p1", "p1", "p2"].into_iter().enumerate() {
        let comment_id = Uuid::new_v4().to_string();
        comments
            .add_comment(&comment_id, post_id, "commenter", "x", later(index as i64))
            .await
            .unwrap();
    }
    comments
        .add_comment("own", "p1", "owner", "mine", later(9))
        .await
        .unwrap();

    assert_eq!(comments.delete_all_by_user("commenter", later(10)).await.unwrap(), 3);
    assert_eq!(env.user("commenter").await.counters.comment_count, Some(0));

    env.managers.delete_post("p1", later(11)).await.unwrap();
    assert!(comments.get_comment("own").await.unwrap().is_none());
    assert!(env.managers.post.get_post("p1", true).await.unwrap().is_none());
    assert!(matches!(
        env.managers.delete_post("p1", later(12)).await,
        Err(CommentError::Post(PostError::PostDoesNotExist(_)))
    ));
}

#[tokio::test]
async fn test_cascade_tolerates_counters_already_at_zero() {
    let env = env_with_post().await;
    let comments = &env.managers.comment;
    for (index, comment_id) in ["c1", "c2"].into_iter().enumerate() {
        comments
            .add_comment(comment_id, "p1", "commenter", "x", later(index as i64))
            .await
            .unwrap();
    }
    let zero = Update::new().set("commentCount", 0);
    env.store
        .update_item(&UserDynamo::pk("commenter"), &zero, None)
        .await
        .unwrap();
    env.store
        .update_item(&PostDynamo::pk("p1"), &zero, None)
        .await
        .unwrap();

    let (logs, _guard) = capture_logs();
    assert_eq!(comments.delete_all_on_post("p1", later(5)).await.unwrap(), 2);
    assert!(comments.get_comment("c1").await.unwrap().is_none());
    assert!(comments.get_comment("c2").await.unwrap().is_none());
    assert!(logs.warnings().iter().any(|w| w.contains("`commenter`")));

    let user = env.user("commenter").await;
    assert_eq!(user.counters.comment_count, Some(0));
    assert_eq!(user.counters.comment_deleted_count, Some(2));
    let post = env.managers.post.get_post("p1", true).await.unwrap().unwrap();
    assert_eq!(post.item.comment_count, Some(0));
}
