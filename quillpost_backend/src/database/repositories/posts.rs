use crate::database::models::PostRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        author_id: row.get(1)?,
        group_id: row.get(2)?,
        body: row.get(3)?,
        image: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn collect(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, author_id, group_id, body, image, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.author_id,
                record.group_id,
                record.body,
                record.image,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET body = ?2, group_id = ?3, image = ?4
            WHERE id = ?1
            "#,
            params![record.id, record.body, record.group_id, record.image],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, author_id, group_id, body, image, created_at
                FROM posts
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<PostRecord>> {
        self.collect(
            r#"
            SELECT id, author_id, group_id, body, image, created_at
            FROM posts
            ORDER BY datetime(created_at) DESC, rowid DESC
            "#,
            &[],
        )
    }

    fn list_for_group(&self, group_id: &str) -> Result<Vec<PostRecord>> {
        self.collect(
            r#"
            SELECT id, author_id, group_id, body, image, created_at
            FROM posts
            WHERE group_id = ?1
            ORDER BY datetime(created_at) DESC, rowid DESC
            "#,
            &[&group_id],
        )
    }

    fn list_for_author(&self, author_id: &str) -> Result<Vec<PostRecord>> {
        self.collect(
            r#"
            SELECT id, author_id, group_id, body, image, created_at
            FROM posts
            WHERE author_id = ?1
            ORDER BY datetime(created_at) DESC, rowid DESC
            "#,
            &[&author_id],
        )
    }

    fn list_followed(&self, follower_id: &str) -> Result<Vec<PostRecord>> {
        self.collect(
            r#"
            SELECT p.id, p.author_id, p.group_id, p.body, p.image, p.created_at
            FROM posts p
            INNER JOIN follows f ON f.author_id = p.author_id
            WHERE f.follower_id = ?1 AND p.author_id <> ?1
            ORDER BY datetime(p.created_at) DESC, p.rowid DESC
            "#,
            &[&follower_id],
        )
    }

    fn count_for_author(&self, author_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
