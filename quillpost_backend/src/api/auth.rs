use super::{session_token, ApiError, AppState};
use crate::auth::{AuthService, SESSION_COOKIE};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct SignupForm {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
    /// Where to land after a successful login, typically planted by an
    /// earlier auth-required redirect.
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    id: String,
    username: String,
}

pub(crate) async fn signup_handler(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> Result<Response, ApiError> {
    let service = AuthService::new(state.database.clone());
    let user = service.signup(&form.username, &form.password)?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username,
        }),
    )
        .into_response())
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Response, ApiError> {
    let service = AuthService::new(state.database.clone());
    let (session, user) = service.login(&form.username, &form.password)?;
    tracing::info!(username = %user.username, "login");

    // Only site-local destinations; anything else falls back to the
    // landing page.
    let location = form
        .next
        .filter(|next| next.starts_with('/'))
        .unwrap_or_else(|| "/".to_string());

    let mut response = Redirect::to(&location).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        set_cookie_value(&format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            session.token
        ))?,
    );
    Ok(response)
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = session_token(&headers) {
        AuthService::new(state.database.clone()).logout(&token)?;
    }
    let mut response = Redirect::to("/").into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        set_cookie_value(&format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0"))?,
    );
    Ok(response)
}

fn set_cookie_value(raw: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(raw).map_err(|err| ApiError::Internal(anyhow::Error::new(err)))
}
