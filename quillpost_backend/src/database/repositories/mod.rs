mod comments;
mod follows;
mod groups;
mod posts;
mod sessions;
mod users;

use super::models::{
    CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
}

pub trait SessionRepository {
    fn create(&self, record: &SessionRecord) -> Result<()>;
    fn get(&self, token: &str) -> Result<Option<SessionRecord>>;
    fn delete(&self, token: &str) -> Result<()>;
}

pub trait GroupRepository {
    fn create(&self, record: &GroupRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<GroupRecord>>;
    fn get_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>>;
    fn list(&self) -> Result<Vec<GroupRecord>>;
    /// Returns whether a group actually went away. Posts keep living
    /// with their group reference nulled out.
    fn delete_by_slug(&self, slug: &str) -> Result<bool>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    /// Replaces body, group and image of an existing row; id, author and
    /// created_at never change.
    fn update(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn delete(&self, id: &str) -> Result<()>;
    fn list_all(&self) -> Result<Vec<PostRecord>>;
    fn list_for_group(&self, group_id: &str) -> Result<Vec<PostRecord>>;
    fn list_for_author(&self, author_id: &str) -> Result<Vec<PostRecord>>;
    /// Posts whose author is followed by `follower_id`, never including
    /// the follower's own posts.
    fn list_followed(&self, follower_id: &str) -> Result<Vec<PostRecord>>;
    fn count_for_author(&self, author_id: &str) -> Result<usize>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn list_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>>;
}

pub trait FollowRepository {
    /// Idempotent: inserting an existing edge is a no-op.
    fn create(&self, record: &FollowRecord) -> Result<()>;
    /// No-op when the edge does not exist.
    fn delete(&self, follower_id: &str, author_id: &str) -> Result<()>;
    fn exists(&self, follower_id: &str, author_id: &str) -> Result<bool>;
    fn count_for_author(&self, author_id: &str) -> Result<usize>;
}

/// Thin facade handing out rusqlite-backed repository implementations.
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn groups(&self) -> impl GroupRepository + '_ {
        groups::SqliteGroupRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn follows(&self) -> impl FollowRepository + '_ {
        follows::SqliteFollowRepository { conn: self.conn }
    }
}
