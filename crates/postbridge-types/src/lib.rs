//! Shared data model for postbridge (platforms, sessions, accounts, posts).

mod account;
mod platform;
mod post;
mod session;
mod time;
mod wire;

pub use account::{ConnectionStatus, Page, SocialAccount};
pub use platform::{Platform, UnknownPlatform};
pub use post::{Post, PostStatus, Stats};
pub use session::{CurrentUser, Session};
pub use time::{PostTime, Timestamp};
