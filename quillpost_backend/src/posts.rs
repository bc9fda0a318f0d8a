//! Post and comment operations: create, author-only edit, detail view,
//! comment submission.

use crate::database::models::{CommentRecord, PostRecord};
use crate::database::repositories::{
    CommentRepository, GroupRepository, PostRepository, SqliteRepositories, UserRepository,
};
use crate::database::Database;
use crate::utils::now_utc_iso;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("only the author may edit post {post_id}")]
    NotAuthor { post_id: String },
    #[error("invalid post data")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub author: String,
    pub group: Option<String>,
    pub body: String,
    pub image: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub author_post_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub body: String,
    /// Slug of an existing group, if the post belongs to one.
    #[serde(default)]
    pub group: Option<String>,
    /// Opaque media reference, stored verbatim.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
}

impl PostService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, author_id: &str, input: PostInput) -> Result<PostView, PostError> {
        let group_id = self.validate(&input)?;
        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            group_id,
            body: input.body,
            image: input.image,
            created_at: now_utc_iso(),
        };
        let view = self.database.with_repositories(|repos| {
            repos.posts().create(&record)?;
            resolve_post_views(&repos, vec![record.clone()])?
                .into_iter()
                .next()
                .context("freshly created post lost")
        })?;
        tracing::info!(post_id = %view.id, author = %view.author, "post created");
        Ok(view)
    }

    /// Author-only. `id`, `author_id` and `created_at` survive the edit
    /// untouched; body, group and image are replaced.
    pub fn update(
        &self,
        post_id: &str,
        acting_user_id: &str,
        input: PostInput,
    ) -> Result<PostView, PostError> {
        let existing = self
            .database
            .with_repositories(|repos| repos.posts().get(post_id))?
            .ok_or(PostError::NotFound)?;
        if existing.author_id != acting_user_id {
            return Err(PostError::NotAuthor {
                post_id: existing.id,
            });
        }
        let group_id = self.validate(&input)?;
        let updated = PostRecord {
            id: existing.id,
            author_id: existing.author_id,
            group_id,
            body: input.body,
            image: input.image,
            created_at: existing.created_at,
        };
        Ok(self.database.with_repositories(|repos| {
            repos.posts().update(&updated)?;
            resolve_post_views(&repos, vec![updated.clone()])?
                .into_iter()
                .next()
                .context("updated post lost")
        })?)
    }

    pub fn detail(&self, post_id: &str) -> Result<Option<PostDetail>, PostError> {
        Ok(self.database.with_repositories(|repos| {
            let Some(record) = repos.posts().get(post_id)? else {
                return Ok(None);
            };
            let author_post_count = repos.posts().count_for_author(&record.author_id)?;
            let post = resolve_post_views(&repos, vec![record])?
                .into_iter()
                .next()
                .context("post view resolution came back empty")?;
            let comments = repos.comments().list_for_post(post_id)?;
            let comments = resolve_comment_views(&repos, comments)?;
            Ok(Some(PostDetail {
                post,
                comments,
                author_post_count,
            }))
        })?)
    }

    pub fn add_comment(
        &self,
        post_id: &str,
        author_id: &str,
        body: &str,
    ) -> Result<CommentView, PostError> {
        let exists = self
            .database
            .with_repositories(|repos| Ok(repos.posts().get(post_id)?.is_some()))?;
        if !exists {
            return Err(PostError::NotFound);
        }
        if body.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert("body".into(), "comment body may not be empty".into());
            return Err(PostError::Invalid(errors));
        }
        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            body: body.to_string(),
            created_at: now_utc_iso(),
        };
        let view = self.database.with_repositories(|repos| {
            repos.comments().create(&record)?;
            resolve_comment_views(&repos, vec![record.clone()])?
                .into_iter()
                .next()
                .context("freshly created comment lost")
        })?;
        Ok(view)
    }

    /// Checks the body and resolves the optional group slug to its id.
    /// Nothing is written when any field fails.
    fn validate(&self, input: &PostInput) -> Result<Option<String>, PostError> {
        let mut errors = FieldErrors::new();
        if input.body.trim().is_empty() {
            errors.insert("body".into(), "post body may not be empty".into());
        }
        let mut group_id = None;
        if let Some(slug) = input
            .group
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
        {
            match self
                .database
                .with_repositories(|repos| repos.groups().get_by_slug(slug))?
            {
                Some(group) => group_id = Some(group.id),
                None => {
                    errors.insert("group".into(), format!("unknown group '{slug}'"));
                }
            }
        }
        if !errors.is_empty() {
            return Err(PostError::Invalid(errors));
        }
        Ok(group_id)
    }
}

/// Resolves author usernames and group slugs for presentation, caching
/// lookups across the batch.
pub(crate) fn resolve_post_views(
    repos: &SqliteRepositories<'_>,
    posts: Vec<PostRecord>,
) -> anyhow::Result<Vec<PostView>> {
    let mut usernames: HashMap<String, String> = HashMap::new();
    let mut group_slugs: HashMap<String, Option<String>> = HashMap::new();
    let mut views = Vec::with_capacity(posts.len());
    for post in posts {
        let author = match usernames.get(&post.author_id) {
            Some(name) => name.clone(),
            None => {
                let name = repos
                    .users()
                    .get(&post.author_id)?
                    .map(|user| user.username)
                    .with_context(|| {
                        format!("author {} missing from users table", post.author_id)
                    })?;
                usernames.insert(post.author_id.clone(), name.clone());
                name
            }
        };
        let group = match &post.group_id {
            Some(group_id) => match group_slugs.get(group_id) {
                Some(slug) => slug.clone(),
                None => {
                    let slug = repos.groups().get(group_id)?.map(|group| group.slug);
                    group_slugs.insert(group_id.clone(), slug.clone());
                    slug
                }
            },
            None => None,
        };
        views.push(PostView {
            id: post.id,
            author,
            group,
            body: post.body,
            image: post.image,
            created_at: post.created_at,
        });
    }
    Ok(views)
}

pub(crate) fn resolve_comment_views(
    repos: &SqliteRepositories<'_>,
    comments: Vec<CommentRecord>,
) -> anyhow::Result<Vec<CommentView>> {
    let mut usernames: HashMap<String, String> = HashMap::new();
    let mut views = Vec::with_capacity(comments.len());
    for comment in comments {
        let author = match usernames.get(&comment.author_id) {
            Some(name) => name.clone(),
            None => {
                let name = repos
                    .users()
                    .get(&comment.author_id)?
                    .map(|user| user.username)
                    .with_context(|| {
                        format!("author {} missing from users table", comment.author_id)
                    })?;
                usernames.insert(comment.author_id.clone(), name.clone());
                name
            }
        };
        views.push(CommentView {
            id: comment.id,
            author,
            body: comment.body,
            created_at: comment.created_at,
        });
    }
    Ok(views)
}
