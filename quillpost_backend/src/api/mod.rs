mod auth;
mod feeds;
mod follows;
mod posts;

use crate::auth::{AuthError, AuthService, CurrentUser, SESSION_COOKIE};
use crate::cache::PageCache;
use crate::config::QuillpostConfig;
use crate::database::Database;
use crate::follows::FollowError;
use crate::posts::{FieldErrors, PostError};
use anyhow::Result;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: QuillpostConfig,
    pub database: Database,
    pub cache: PageCache,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Validation(FieldErrors),
    /// Unauthenticated access to a login-gated action; answered with a
    /// redirect to the login path carrying the original destination.
    AuthRequired { next: String },
    /// Silent denial: the request is refused by redirecting to a
    /// neutral page instead of surfacing an error status.
    Denied { location: String },
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl ErrorResponse {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::message(msg))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::message(msg))).into_response()
            }
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    message: "validation failed".into(),
                    errors: Some(errors),
                }),
            )
                .into_response(),
            ApiError::AuthRequired { next } => {
                Redirect::to(&format!("/auth/login?next={next}")).into_response()
            }
            ApiError::Denied { location } => Redirect::to(&location).into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::message("internal server error")),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let field = |field: &str, message: String| {
            let mut errors = FieldErrors::new();
            errors.insert(field.to_string(), message);
            ApiError::Validation(errors)
        };
        match err {
            AuthError::UsernameTaken => field("username", err.to_string()),
            AuthError::InvalidUsername(msg) => field("username", msg.to_string()),
            AuthError::InvalidPassword(msg) => field("password", msg.to_string()),
            AuthError::BadCredentials => field("credentials", err.to_string()),
            AuthError::Database(err) => ApiError::Internal(err),
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::NotFound => ApiError::NotFound("post not found".into()),
            // Wrong author: quietly bounce back to the post itself.
            PostError::NotAuthor { post_id } => ApiError::Denied {
                location: format!("/posts/{post_id}"),
            },
            PostError::Invalid(errors) => ApiError::Validation(errors),
            PostError::Database(err) => ApiError::Internal(err),
        }
    }
}

impl From<FollowError> for ApiError {
    fn from(err: FollowError) -> Self {
        match err {
            FollowError::UnknownAuthor => ApiError::NotFound("author not found".into()),
            FollowError::Database(err) => ApiError::Internal(err),
        }
    }
}

/// Pulls the session token out of the request, preferring an
/// `Authorization: Bearer` header over the session cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(value.trim().to_string());
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

pub(crate) fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<CurrentUser>, ApiError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    Ok(AuthService::new(state.database.clone()).resolve(&token)?)
}

/// Resolves the acting user or fails with the login redirect carrying
/// the originally requested path.
pub(crate) fn require_user(
    state: &AppState,
    headers: &HeaderMap,
    next: &str,
) -> Result<CurrentUser, ApiError> {
    current_user(state, headers)?.ok_or_else(|| ApiError::AuthRequired {
        next: next.to_string(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(feeds::health_handler))
        .route("/", get(feeds::index_handler))
        .route("/group/:slug", get(feeds::group_handler))
        .route("/profile/:username", get(feeds::profile_handler))
        .route("/follow", get(feeds::follow_feed_handler))
        .route("/posts/:id", get(posts::post_detail_handler))
        .route("/create", post(posts::create_post_handler))
        .route("/posts/:id/edit", post(posts::edit_post_handler))
        .route("/posts/:id/comment", post(posts::add_comment_handler))
        .route("/profile/:username/follow", post(follows::follow_handler))
        .route(
            "/profile/:username/unfollow",
            post(follows::unfollow_handler),
        )
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

pub async fn serve_http(
    config: QuillpostConfig,
    database: Database,
    cache: PageCache,
) -> Result<()> {
    let requested_port = config.api_port;
    let state = AppState {
        config,
        database,
        cache,
    };
    let router = router(state);

    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
