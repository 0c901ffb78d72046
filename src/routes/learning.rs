use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::Row;

use crate::response::json_error;
use crate::routes::{get_query_param, require_auth, split_body, SuccessResponse};
use crate::services::queue::{self, ChoiceError, ChoiceWord, DrillWord, DueWord};
use crate::services::review::{self, ReviewError};
use crate::state::AppState;

const DEFAULT_REVIEW_LIMIT: usize = 20;
const MAX_REVIEW_LIMIT: usize = 100;
const DEFAULT_DRILL_LIMIT: usize = 10;
const MAX_DRILL_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearnRequest {
    word_id: String,
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    word_id: String,
    quality: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    word_id: String,
    days: i64,
}

/// POST /api/learn, the binary quick-drill answer.
pub async fn submit_learning(State(state): State<AppState>, req: Request<Body>) -> Response {
    let headers = req.headers().clone();
    let (proxy, user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: LearnRequest = match serde_json::from_slice(&body_bytes) {
        Ok(payload) => payload,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "请求参数不合法",
            )
            .into_response();
        }
    };

    let today = today_utc();
    match review::submit_learning(&proxy, &user.id, &payload.word_id, payload.is_correct, today)
        .await
    {
        Ok(outcome) => Json(SuccessResponse::new(outcome)).into_response(),
        Err(err) => review_error_response(err),
    }
}

/// POST /api/review-words, a quality-graded review answer.
pub async fn submit_review(State(state): State<AppState>, req: Request<Body>) -> Response {
    let headers = req.headers().clone();
    let (proxy, user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: ReviewRequest = match serde_json::from_slice(&body_bytes) {
        Ok(payload) => payload,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "请求参数不合法",
            )
            .into_response();
        }
    };

    let today = today_utc();
    match review::submit_review(&proxy, &user.id, &payload.word_id, payload.quality, today).await {
        Ok(outcome) => Json(SuccessResponse::new(outcome)).into_response(),
        Err(err) => review_error_response(err),
    }
}

/// GET /api/review-words: due words for this user, unreviewed words first.
pub async fn review_words(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let limit = parse_limit(
        req.uri().query().unwrap_or(""),
        DEFAULT_REVIEW_LIMIT,
        MAX_REVIEW_LIMIT,
    );
    let today = today_utc();

    let rows = match sqlx::query(
        r#"
        SELECT w."id", w."spelling", w."partOfSpeech", w."meaning",
               wp."intervalDays", wp."easeFactor", wp."nextReviewDate"
        FROM "words" w
        LEFT JOIN "word_progress" wp
            ON wp."wordId" = w."id" AND wp."userId" = $1
        "#,
    )
    .bind(&user.id)
    .fetch_all(proxy.pool())
    .await
    {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "review candidates query failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    let mut candidates = Vec::with_capacity(rows.len());
    for row in rows {
        let candidate = match due_word_from_row(&row) {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::warn!(error = %err, "review candidate row decode failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "服务器内部错误",
                )
                .into_response();
            }
        };
        candidates.push(candidate);
    }

    let queue = queue::due_queue(candidates, today, limit);
    Json(SuccessResponse::new(queue)).into_response()
}

/// GET /api/drill-words: unmastered words first, random backfill after.
pub async fn drill_words(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let limit = parse_limit(
        req.uri().query().unwrap_or(""),
        DEFAULT_DRILL_LIMIT,
        MAX_DRILL_LIMIT,
    );

    // Per-user answer balance decides mastery: more correct than wrong
    // answers moves a word to the backfill pool.
    let rows = match sqlx::query(
        r#"
        SELECT w."id", w."spelling", w."partOfSpeech", w."meaning",
               w."correctTimes", w."wrongTimes",
               COALESCE(SUM(CASE WHEN lr."isCorrect" THEN 1 ELSE -1 END), 0)::bigint AS "balance"
        FROM "words" w
        LEFT JOIN "learning_records" lr
            ON lr."wordId" = w."id" AND lr."userId" = $1
        GROUP BY w."id", w."spelling", w."partOfSpeech", w."meaning",
                 w."correctTimes", w."wrongTimes"
        "#,
    )
    .bind(&user.id)
    .fetch_all(proxy.pool())
    .await
    {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "drill candidates query failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    let mut unmastered = Vec::new();
    let mut backfill = Vec::new();
    for row in rows {
        let balance: i64 = match row.try_get("balance") {
            Ok(balance) => balance,
            Err(err) => {
                tracing::warn!(error = %err, "drill candidate row decode failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "服务器内部错误",
                )
                .into_response();
            }
        };
        let word = match drill_word_from_row(&row) {
            Ok(word) => word,
            Err(err) => {
                tracing::warn!(error = %err, "drill candidate row decode failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "服务器内部错误",
                )
                .into_response();
            }
        };
        if balance > 0 {
            backfill.push(word);
        } else {
            unmastered.push(word);
        }
    }

    let queue = queue::drill_queue(unmastered, backfill, limit, &mut rand::rng());
    Json(SuccessResponse::new(queue)).into_response()
}

/// GET /api/multiple-choice: a random word with its meaning shuffled in
/// among three meanings from other words.
pub async fn multiple_choice(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, _user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let rows = match sqlx::query(r#"SELECT "id", "spelling", "meaning" FROM "words""#)
        .fetch_all(proxy.pool())
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "quiz candidates query failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    let mut words = Vec::with_capacity(rows.len());
    for row in rows {
        let word = match choice_word_from_row(&row) {
            Ok(word) => word,
            Err(err) => {
                tracing::warn!(error = %err, "quiz candidate row decode failed");
                return json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "服务器内部错误",
                )
                .into_response();
            }
        };
        words.push(word);
    }

    match queue::choice_question(words, &mut rand::rng()) {
        Ok(question) => Json(SuccessResponse::new(question)).into_response(),
        Err(ChoiceError::EmptyWordBank) => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "词库中没有单词").into_response()
        }
        Err(ChoiceError::InsufficientWords) => json_error(
            StatusCode::BAD_REQUEST,
            "INSUFFICIENT_WORDS",
            "词库中单词数量不足",
        )
        .into_response(),
    }
}

/// POST /api/schedule-review: manually pins a word's next review date.
pub async fn schedule_review(State(state): State<AppState>, req: Request<Body>) -> Response {
    let headers = req.headers().clone();
    let (proxy, user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: ScheduleRequest = match serde_json::from_slice(&body_bytes) {
        Ok(payload) => payload,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "请求参数不合法",
            )
            .into_response();
        }
    };

    if payload.days < 1 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "天数必须为正整数",
        )
        .into_response();
    }

    let today = today_utc();
    match review::schedule_review(&proxy, &user.id, &payload.word_id, payload.days, today).await {
        Ok(next_review_date) => Json(SuccessResponse::new(serde_json::json!({
            "wordId": payload.word_id,
            "nextReviewDate": next_review_date,
        })))
        .into_response(),
        Err(err) => review_error_response(err),
    }
}

/// POST /api/reset-progress: wipes the caller's learning state.
pub async fn reset_progress(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    match review::reset_progress(&proxy, &user.id).await {
        Ok(()) => Json(SuccessResponse::new(serde_json::json!({ "reset": true }))).into_response(),
        Err(err) => review_error_response(err),
    }
}

fn review_error_response(err: ReviewError) -> Response {
    match err {
        ReviewError::Schedule(err) => {
            json_error(StatusCode::BAD_REQUEST, "INVALID_QUALITY", err.to_string())
                .into_response()
        }
        ReviewError::WordNotFound => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "单词不存在").into_response()
        }
        ReviewError::UserNotFound => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "用户不存在").into_response()
        }
        ReviewError::TransientConflict => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "TRANSIENT_CONFLICT",
            "操作冲突，请稍后重试",
        )
        .into_response(),
        ReviewError::Sql(err) => {
            tracing::warn!(error = %err, "review operation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}

fn due_word_from_row(row: &sqlx::postgres::PgRow) -> Result<DueWord, sqlx::Error> {
    Ok(DueWord {
        word_id: row.try_get("id")?,
        spelling: row.try_get("spelling")?,
        part_of_speech: row.try_get("partOfSpeech")?,
        meaning: row.try_get("meaning")?,
        interval_days: row
            .try_get::<Option<i32>, _>("intervalDays")?
            .map(|v| v as i64),
        ease_factor: row.try_get("easeFactor")?,
        next_review_date: row.try_get::<Option<NaiveDate>, _>("nextReviewDate")?,
    })
}

fn choice_word_from_row(row: &sqlx::postgres::PgRow) -> Result<ChoiceWord, sqlx::Error> {
    Ok(ChoiceWord {
        word_id: row.try_get("id")?,
        spelling: row.try_get("spelling")?,
        meaning: row.try_get("meaning")?,
    })
}

fn drill_word_from_row(row: &sqlx::postgres::PgRow) -> Result<DrillWord, sqlx::Error> {
    Ok(DrillWord {
        word_id: row.try_get("id")?,
        spelling: row.try_get("spelling")?,
        part_of_speech: row.try_get("partOfSpeech")?,
        meaning: row.try_get("meaning")?,
        correct_times: row.try_get::<i32, _>("correctTimes")? as i64,
        wrong_times: row.try_get::<i32, _>("wrongTimes")? as i64,
    })
}

fn parse_limit(query: &str, default: usize, max: usize) -> usize {
    get_query_param(query, "limit")
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(max))
        .unwrap_or(default)
}

fn today_utc() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_parsing() {
        assert_eq!(parse_limit("", 20, 100), 20);
        assert_eq!(parse_limit("limit=5", 20, 100), 5);
        assert_eq!(parse_limit("limit=500", 20, 100), 100);
        assert_eq!(parse_limit("limit=0", 20, 100), 20);
        assert_eq!(parse_limit("limit=abc", 20, 100), 20);
        assert_eq!(parse_limit("foo=1&limit=7", 20, 100), 7);
    }
}
