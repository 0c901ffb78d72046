mod checkin;
mod health;
mod learning;
mod stats;
mod users;
mod words;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use bytes::Bytes;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::DatabaseProxy;
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .route("/api/auth/register", post(users::register))
        .route("/api/auth/login", post(users::login))
        .route("/api/auth/me", get(users::me))
        .route("/api/words", get(words::list_words).post(words::create_word))
        .route(
            "/api/words/:word_id",
            put(words::update_word).delete(words::delete_word),
        )
        .route("/api/wrong-words", get(words::wrong_words))
        .route("/api/learn", post(learning::submit_learning))
        .route("/api/drill-words", get(learning::drill_words))
        .route("/api/multiple-choice", get(learning::multiple_choice))
        .route(
            "/api/review-words",
            get(learning::review_words).post(learning::submit_review),
        )
        .route("/api/schedule-review", post(learning::schedule_review))
        .route("/api/reset-progress", post(learning::reset_progress))
        .route("/api/checkin", get(checkin::status).post(checkin::submit))
        .route("/api/score", get(stats::score))
        .route("/api/mastery-breakdown", get(stats::mastery_breakdown))
        .route("/api/learning-stats", get(stats::learning_stats))
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "接口不存在").into_response()
}

#[derive(Serialize)]
pub(crate) struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub(crate) async fn require_auth(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Arc<DatabaseProxy>, AuthUser), Response> {
    let Some(token) = crate::auth::extract_token(headers) else {
        return Err(
            json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "未提供认证令牌").into_response(),
        );
    };

    let Some(proxy) = state.db_proxy() else {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response());
    };

    match crate::auth::verify_request_token(proxy.as_ref(), &token).await {
        Ok(user) => Ok((proxy, user)),
        Err(err) => {
            tracing::debug!(error = %err, "token verification failed");
            Err(json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "认证失败，请重新登录",
            )
            .into_response())
        }
    }
}

pub(crate) async fn split_body(
    req: Request<Body>,
) -> Result<(axum::http::request::Parts, Bytes), Response> {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Err(
                json_error(StatusCode::BAD_REQUEST, "BODY_TOO_LARGE", "请求体过大").into_response(),
            )
        }
    };
    Ok((parts, body_bytes))
}

pub(crate) fn get_query_param(query: &str, key: &str) -> Option<String> {
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut iter = pair.splitn(2, '=');
        if iter.next().unwrap_or("") != key {
            continue;
        }
        return Some(iter.next().unwrap_or("").to_string());
    }
    None
}
