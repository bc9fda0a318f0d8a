use super::{current_user, require_user, ApiError, ApiResult, AppState};
use crate::cache::INDEX_CACHE_KEY;
use crate::feed::{FeedService, GroupFeed, ProfileFeed};
use crate::pagination::{self, Page};
use crate::posts::PostView;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct PageParams {
    #[serde(default)]
    page: Option<String>,
}

impl PageParams {
    fn number(&self) -> usize {
        pagination::page_number(self.page.as_deref())
    }
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

/// Global feed. The unpaginated landing render is served from the page
/// cache; anything carrying a `page` parameter bypasses it.
pub(crate) async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let service = FeedService::new(state.database.clone(), state.config.page_size);

    if params.page.is_none() {
        if let Some(body) = state.cache.get(INDEX_CACHE_KEY) {
            return Ok(json_body(body));
        }
        let page = service.index(1)?;
        let body = serde_json::to_string(&page)
            .map_err(|err| ApiError::Internal(anyhow::Error::new(err)))?;
        state.cache.put(INDEX_CACHE_KEY, body.clone());
        return Ok(json_body(body));
    }

    let page = service.index(params.number())?;
    Ok(Json(page).into_response())
}

fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub(crate) async fn group_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<GroupFeed> {
    let service = FeedService::new(state.database.clone(), state.config.page_size);
    match service.group(&slug, params.number())? {
        Some(feed) => Ok(Json(feed)),
        None => Err(ApiError::NotFound(format!("group {slug} not found"))),
    }
}

pub(crate) async fn profile_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> ApiResult<ProfileFeed> {
    let viewer = current_user(&state, &headers)?;
    let service = FeedService::new(state.database.clone(), state.config.page_size);
    match service.profile(
        &username,
        viewer.as_ref().map(|user| user.id.as_str()),
        params.number(),
    )? {
        Some(feed) => Ok(Json(feed)),
        None => Err(ApiError::NotFound(format!("profile {username} not found"))),
    }
}

pub(crate) async fn follow_feed_handler(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> ApiResult<Page<PostView>> {
    let user = require_user(&state, &headers, "/follow")?;
    let service = FeedService::new(state.database.clone(), state.config.page_size);
    Ok(Json(service.following(&user.id, params.number())?))
}
