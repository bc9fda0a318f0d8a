//! Follow edges between a reader and an author. Both mutations are
//! idempotent and return normally regardless of prior state.

use crate::database::models::FollowRecord;
use crate::database::repositories::{FollowRepository, UserRepository};
use crate::database::Database;
use crate::utils::now_utc_iso;

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("author not found")]
    UnknownAuthor,
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct FollowService {
    database: Database,
}

impl FollowService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Creates the edge unless it already exists or the follower is the
    /// author themselves; both cases are quiet no-ops.
    pub fn follow(&self, follower_id: &str, author_username: &str) -> Result<(), FollowError> {
        let author = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(author_username))?
            .ok_or(FollowError::UnknownAuthor)?;
        if author.id == follower_id {
            return Ok(());
        }
        let record = FollowRecord {
            follower_id: follower_id.to_string(),
            author_id: author.id,
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.follows().create(&record))?;
        Ok(())
    }

    /// Deletes the edge if present; absent edges are a quiet no-op.
    pub fn unfollow(&self, follower_id: &str, author_username: &str) -> Result<(), FollowError> {
        let author = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(author_username))?
            .ok_or(FollowError::UnknownAuthor)?;
        self.database
            .with_repositories(|repos| repos.follows().delete(follower_id, &author.id))?;
        Ok(())
    }

    pub fn is_following(&self, follower_id: &str, author_id: &str) -> Result<bool, FollowError> {
        Ok(self
            .database
            .with_repositories(|repos| repos.follows().exists(follower_id, author_id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::UserRecord;
    use rusqlite::Connection;
    use uuid::Uuid;

    fn setup_database() -> Database {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");
        database
    }

    fn add_user(database: &Database, username: &str) -> UserRecord {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: "hash".into(),
            created_at: now_utc_iso(),
        };
        database
            .with_repositories(|repos| repos.users().create(&record))
            .expect("create user");
        record
    }

    #[test]
    fn follow_then_unfollow_leaves_no_edge() {
        let database = setup_database();
        let fan = add_user(&database, "fan");
        let author = add_user(&database, "ada");
        let service = FollowService::new(database);

        service.follow(&fan.id, "ada").expect("follow");
        assert!(service.is_following(&fan.id, &author.id).expect("check"));

        service.unfollow(&fan.id, "ada").expect("unfollow");
        assert!(!service.is_following(&fan.id, &author.id).expect("check"));
    }

    #[test]
    fn double_follow_is_idempotent() {
        let database = setup_database();
        let fan = add_user(&database, "fan");
        let author = add_user(&database, "ada");
        let service = FollowService::new(database.clone());

        service.follow(&fan.id, "ada").expect("follow");
        service.follow(&fan.id, "ada").expect("follow again");

        let count = database
            .with_repositories(|repos| repos.follows().count_for_author(&author.id))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn unfollowing_an_author_never_followed_is_a_no_op() {
        let database = setup_database();
        let fan = add_user(&database, "fan");
        add_user(&database, "ada");
        let service = FollowService::new(database);
        service.unfollow(&fan.id, "ada").expect("unfollow");
    }

    #[test]
    fn self_follow_is_always_rejected() {
        let database = setup_database();
        let ada = add_user(&database, "ada");
        let service = FollowService::new(database);

        service.follow(&ada.id, "ada").expect("self-follow is quiet");
        assert!(!service.is_following(&ada.id, &ada.id).expect("check"));

        // Still rejected after other edges exist.
        service.follow(&ada.id, "ada").expect("self-follow again");
        assert!(!service.is_following(&ada.id, &ada.id).expect("check"));
    }

    #[test]
    fn following_an_unknown_author_errors() {
        let database = setup_database();
        let fan = add_user(&database, "fan");
        let service = FollowService::new(database);
        assert!(matches!(
            service.follow(&fan.id, "ghost"),
            Err(FollowError::UnknownAuthor)
        ));
        assert!(matches!(
            service.unfollow(&fan.id, "ghost"),
            Err(FollowError::UnknownAuthor)
        ));
    }
}
