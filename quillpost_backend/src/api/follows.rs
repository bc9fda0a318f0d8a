use super::{require_user, ApiError, AppState};
use crate::follows::FollowService;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};

pub(crate) async fn follow_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &headers, &format!("/profile/{username}/follow"))?;
    let service = FollowService::new(state.database.clone());
    service.follow(&user.id, &username)?;
    Ok(Redirect::to(&format!("/profile/{username}")).into_response())
}

pub(crate) async fn unfollow_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_user(&state, &headers, &format!("/profile/{username}/unfollow"))?;
    let service = FollowService::new(state.database.clone());
    service.unfollow(&user.id, &username)?;
    Ok(Redirect::to(&format!("/profile/{username}")).into_response())
}
