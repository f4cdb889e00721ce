//! Social backend business logic: users, posts, comments, feeds, follows,
//! blocks and cards over a single-table document store, plus the sync of
//! derived state driven by user profile changes.

pub mod clients;
pub mod config;
pub mod error;
pub mod managers;
pub mod metrics;
pub mod models;
pub mod stream;
pub mod timestamp;

pub use error::{BlockError, CardError, CommentError, FollowError, PostError, UserError};
pub use managers::Managers;
