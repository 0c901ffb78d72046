use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::response::json_error;
use crate::routes::{require_auth, split_body, SuccessResponse};
use crate::services::checkin::{self, CheckinError};
use crate::services::streak::CheckinKind;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckinRequest {
    date: Option<String>,
    #[serde(rename = "type")]
    checkin_type: Option<String>,
}

/// GET /api/checkin: streak and today's status.
pub async fn status(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let today = chrono::Utc::now().date_naive();
    match checkin::checkin_status(&proxy, &user.id, today).await {
        Ok(status) => Json(SuccessResponse::new(status)).into_response(),
        Err(err) => checkin_error_response(err),
    }
}

/// POST /api/checkin. An empty body means a normal checkin for today; a
/// makeup checkin carries an explicit date and type.
pub async fn submit(State(state): State<AppState>, req: Request<Body>) -> Response {
    let headers = req.headers().clone();
    let (proxy, user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: CheckinRequest = if body_bytes.is_empty() {
        CheckinRequest::default()
    } else {
        match serde_json::from_slice(&body_bytes) {
            Ok(payload) => payload,
            Err(_) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "请求参数不合法",
                )
                .into_response();
            }
        }
    };

    let today = chrono::Utc::now().date_naive();
    let date = match payload.date {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "日期格式应为YYYY-MM-DD",
                )
                .into_response();
            }
        },
        None => today,
    };

    if date > today {
        return json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "不能为未来日期打卡",
        )
        .into_response();
    }

    let kind = match payload.checkin_type {
        Some(raw) => match CheckinKind::parse(&raw) {
            Some(kind) => kind,
            None => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "打卡类型无效",
                )
                .into_response();
            }
        },
        None => CheckinKind::Normal,
    };

    match checkin::submit_checkin(&proxy, &user.id, date, kind).await {
        Ok(record) => (StatusCode::CREATED, Json(SuccessResponse::new(record))).into_response(),
        Err(err) => checkin_error_response(err),
    }
}

fn checkin_error_response(err: CheckinError) -> Response {
    match err {
        CheckinError::AlreadyCheckedIn => json_error(
            StatusCode::CONFLICT,
            "ALREADY_CHECKED_IN",
            "该日期已经打过卡",
        )
        .into_response(),
        CheckinError::Sql(err) => {
            tracing::warn!(error = %err, "checkin operation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}
