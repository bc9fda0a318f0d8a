use crate::database::models::FollowRecord;
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFollowRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FollowRepository for SqliteFollowRepository<'conn> {
    fn create(&self, record: &FollowRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, author_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![record.follower_id, record.author_id, record.created_at],
        )?;
        Ok(())
    }

    fn delete(&self, follower_id: &str, author_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND author_id = ?2",
            params![follower_id, author_id],
        )?;
        Ok(())
    }

    fn exists(&self, follower_id: &str, author_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND author_id = ?2",
            params![follower_id, author_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_for_author(&self, author_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
