use super::{require_user, ApiError, ApiResult, AppState};
use crate::posts::{PostDetail, PostInput, PostService};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CommentForm {
    body: String,
}

pub(crate) async fn post_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostDetail> {
    let service = PostService::new(state.database.clone());
    match service.detail(&id)? {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::NotFound(format!("post {id} not found"))),
    }
}

/// Authenticated. A successful submission lands on the author's
/// profile, the way the rest of the site navigates after a write.
pub(crate) async fn create_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<PostInput>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &headers, "/create")?;
    let service = PostService::new(state.database.clone());
    service.create(&user.id, input)?;
    Ok(Redirect::to(&format!("/profile/{}", user.username)).into_response())
}

/// Authenticated and author-only. A non-author lands back on the post
/// detail with no error surfaced.
pub(crate) async fn edit_post_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<PostInput>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &headers, &format!("/posts/{id}/edit"))?;
    let service = PostService::new(state.database.clone());
    let updated = service.update(&id, &user.id, input)?;
    Ok(Redirect::to(&format!("/posts/{}", updated.id)).into_response())
}

pub(crate) async fn add_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(form): Json<CommentForm>,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &headers, &format!("/posts/{id}/comment"))?;
    let service = PostService::new(state.database.clone());
    service.add_comment(&id, &user.id, &form.body)?;
    Ok(Redirect::to(&format!("/posts/{id}")).into_response())
}
