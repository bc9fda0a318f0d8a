//! Assembles the ordered, paginated post listings behind the four list
//! views: global, group, profile and follow.

use crate::database::repositories::{
    FollowRepository, GroupRepository, PostRepository, UserRepository,
};
use crate::database::Database;
use crate::pagination::{self, Page};
use crate::posts::{resolve_post_views, PostView};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub username: String,
    pub post_count: usize,
    pub follower_count: usize,
}

#[derive(Debug, Serialize)]
pub struct GroupFeed {
    pub group: GroupView,
    pub page: Page<PostView>,
}

#[derive(Debug, Serialize)]
pub struct ProfileFeed {
    pub author: AuthorView,
    /// Whether the viewer follows this author. Always false for
    /// anonymous viewers and for authors looking at themselves.
    pub following: bool,
    pub page: Page<PostView>,
}

#[derive(Clone)]
pub struct FeedService {
    database: Database,
    page_size: usize,
}

impl FeedService {
    pub fn new(database: Database, page_size: usize) -> Self {
        Self {
            database,
            page_size,
        }
    }

    /// Global feed: every post, newest first.
    pub fn index(&self, page: usize) -> Result<Page<PostView>> {
        self.database.with_repositories(|repos| {
            let posts = repos.posts().list_all()?;
            let views = resolve_post_views(&repos, posts)?;
            Ok(pagination::paginate(views, page, self.page_size))
        })
    }

    /// Posts of one group; `None` for an unknown slug.
    pub fn group(&self, slug: &str, page: usize) -> Result<Option<GroupFeed>> {
        self.database.with_repositories(|repos| {
            let Some(group) = repos.groups().get_by_slug(slug)? else {
                return Ok(None);
            };
            let posts = repos.posts().list_for_group(&group.id)?;
            let views = resolve_post_views(&repos, posts)?;
            Ok(Some(GroupFeed {
                group: GroupView {
                    title: group.title,
                    slug: group.slug,
                    description: group.description,
                },
                page: pagination::paginate(views, page, self.page_size),
            }))
        })
    }

    /// Posts of one author; `None` for an unknown username. The viewer,
    /// when present, determines the `following` flag.
    pub fn profile(
        &self,
        username: &str,
        viewer_id: Option<&str>,
        page: usize,
    ) -> Result<Option<ProfileFeed>> {
        self.database.with_repositories(|repos| {
            let Some(author) = repos.users().get_by_username(username)? else {
                return Ok(None);
            };
            let posts = repos.posts().list_for_author(&author.id)?;
            let post_count = posts.len();
            let views = resolve_post_views(&repos, posts)?;
            let following = match viewer_id {
                Some(viewer_id) => repos.follows().exists(viewer_id, &author.id)?,
                None => false,
            };
            Ok(Some(ProfileFeed {
                author: AuthorView {
                    username: author.username,
                    post_count,
                    follower_count: repos.follows().count_for_author(&author.id)?,
                },
                following,
                page: pagination::paginate(views, page, self.page_size),
            }))
        })
    }

    /// Posts of every author the viewer follows. The viewer's own posts
    /// never show up, even if a self-edge exists in the table.
    pub fn following(&self, viewer_id: &str, page: usize) -> Result<Page<PostView>> {
        self.database.with_repositories(|repos| {
            let posts = repos.posts().list_followed(viewer_id)?;
            let views = resolve_post_views(&repos, posts)?;
            Ok(pagination::paginate(views, page, self.page_size))
        })
    }
}
