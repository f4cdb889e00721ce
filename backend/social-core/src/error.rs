/// Domain error types for the social managers
///
/// Every variant that concerns a specific row names its id, so callers can
/// surface the message as-is.
use doc_store::StoreError;
use thiserror::Error;

use crate::clients::ClientError;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User `{0}` does not exist")]
    UserDoesNotExist(String),

    #[error("User `{0}` already exists")]
    UserAlreadyExists(String),

    #[error("Username `{0}` is already taken")]
    UsernameTaken(String),

    #[error("Invalid username `{0}`")]
    InvalidUsername(String),

    #[error("Malformed user item: {0}")]
    MalformedItem(String),

    #[error(transparent)]
    Card(#[from] CardError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Card `{0}` does not exist")]
    CardDoesNotExist(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Post `{0}` does not exist")]
    PostDoesNotExist(String),

    #[error("Unable to add post with id `{0}`... id already used?")]
    PostIdTaken(String),

    #[error("User `{user_id}` is not the owner of post `{post_id}`")]
    NotPostOwner { user_id: String, post_id: String },

    #[error("Unable to increment User.postCount for user `{0}`")]
    UserPostCountIncrement(String),

    #[error("Unable to delete post `{0}`")]
    PostDeleteFailed(String),

    #[error("Unable to decrement User.postCount for user `{0}`")]
    UserPostCountDecrement(String),

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Card(#[from] CardError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum FollowError {
    #[error("User `{0}` cannot follow themselves")]
    CannotFollowSelf(String),

    #[error("User `{follower_id}` already follows or requested to follow `{followed_id}`")]
    AlreadyFollowing {
        follower_id: String,
        followed_id: String,
    },

    #[error("User `{follower_id}` does not follow `{followed_id}`")]
    NotFollowing {
        follower_id: String,
        followed_id: String,
    },

    #[error("Follow of `{followed_id}` by `{follower_id}` is already `{status}`")]
    InvalidTransition {
        follower_id: String,
        followed_id: String,
        status: String,
    },

    #[error("Block between `{follower_id}` and `{followed_id}` prevents following")]
    Blocked {
        follower_id: String,
        followed_id: String,
    },

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("User `{0}` cannot block themselves")]
    CannotBlockSelf(String),

    #[error("User `{blocker_id}` has already blocked `{blocked_id}`")]
    AlreadyBlocked {
        blocker_id: String,
        blocked_id: String,
    },

    #[error("User `{blocker_id}` has not blocked `{blocked_id}`")]
    NotBlocked {
        blocker_id: String,
        blocked_id: String,
    },

    #[error(transparent)]
    Follow(#[from] FollowError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum CommentError {
    #[error("Post `{0}` does not exist")]
    PostDoesNotExist(String),

    #[error("Comments are disabled on post `{0}`")]
    CommentsDisabled(String),

    #[error("Post owner `{post_owner_id}` has blocked user `{user_id}`")]
    BlockedByPostOwner {
        post_owner_id: String,
        user_id: String,
    },

    #[error("User `{user_id}` has blocked post owner `{post_owner_id}`")]
    BlockedPostOwner {
        user_id: String,
        post_owner_id: String,
    },

    #[error("Post owner `{post_owner_id}` is private and user `{user_id}` is not a follower")]
    NotFollower {
        post_owner_id: String,
        user_id: String,
    },

    #[error("Unable to add comment with id `{0}`... id already used?")]
    CommentIdTaken(String),

    #[error("Unable to increment Post.commentCount for post `{0}`")]
    PostCommentCountIncrement(String),

    #[error("Unable to increment User.commentCount for user `{0}`")]
    UserCommentCountIncrement(String),

    #[error("Comment `{0}` does not exist")]
    CommentDoesNotExist(String),

    #[error("User `{user_id}` is not authorized to delete comment `{comment_id}`")]
    NotAuthorizedToDelete { user_id: String, comment_id: String },

    #[error("Unable to delete comment `{0}`")]
    CommentDeleteFailed(String),

    #[error("Unable to decrement Post.commentCount for post `{0}`")]
    PostCommentCountDecrement(String),

    #[error("Unable to decrement User.commentCount for user `{0}`")]
    UserCommentCountDecrement(String),

    #[error("User `{user_id}` cannot flag their own comment `{comment_id}`")]
    CannotFlagOwnComment { user_id: String, comment_id: String },

    #[error("User `{user_id}` cannot flag comment `{comment_id}` due to a block")]
    FlagBlocked { user_id: String, comment_id: String },

    #[error("User `{user_id}` has already flagged comment `{comment_id}`")]
    AlreadyFlagged { user_id: String, comment_id: String },

    #[error("User `{user_id}` has not flagged comment `{comment_id}`")]
    NotFlagged { user_id: String, comment_id: String },

    #[error(transparent)]
    Post(#[from] PostError),

    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Follow(#[from] FollowError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
