use std::collections::HashMap;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sqlx::Row;

use crate::response::json_error;
use crate::routes::{require_auth, SuccessResponse};
use crate::services::mastery::{self, MasteryTier};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResponse {
    total_score: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MasteryBreakdown {
    unmastered: i64,
    emerging: i64,
    proficient: i64,
    mastered: i64,
    total_words: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LearningStats {
    total_answers: i64,
    correct_answers: i64,
    wrong_answers: i64,
    accuracy: f64,
    distinct_words: i64,
    answers_today: i64,
    active_days: i64,
}

/// GET /api/score. The score is read from the session user, which the auth
/// layer already refreshed from storage.
pub async fn score(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (_proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    Json(SuccessResponse::new(ScoreResponse {
        total_score: user.total_score,
    }))
    .into_response()
}

/// GET /api/mastery-breakdown: word counts per tier for the caller. Words the
/// user never answered sit in the unmastered bucket.
pub async fn mastery_breakdown(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let rows = match sqlx::query(
        r#"
        SELECT w."id",
               COALESCE(SUM(CASE WHEN lr."isCorrect" THEN 1 ELSE 0 END), 0)::bigint AS "correct"
        FROM "words" w
        LEFT JOIN "learning_records" lr
            ON lr."wordId" = w."id" AND lr."userId" = $1
        GROUP BY w."id"
        "#,
    )
    .bind(&user.id)
    .fetch_all(proxy.pool())
    .await
    {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "mastery breakdown query failed");
            return internal_error();
        }
    };

    let mut counts: HashMap<MasteryTier, i64> = HashMap::new();
    let total_words = rows.len() as i64;
    for row in rows {
        let correct: i64 = match row.try_get("correct") {
            Ok(correct) => correct,
            Err(err) => {
                tracing::warn!(error = %err, "mastery breakdown row decode failed");
                return internal_error();
            }
        };
        *counts.entry(mastery::classify(correct)).or_insert(0) += 1;
    }

    Json(SuccessResponse::new(MasteryBreakdown {
        unmastered: counts.get(&MasteryTier::Unmastered).copied().unwrap_or(0),
        emerging: counts.get(&MasteryTier::Emerging).copied().unwrap_or(0),
        proficient: counts.get(&MasteryTier::Proficient).copied().unwrap_or(0),
        mastered: counts.get(&MasteryTier::Mastered).copied().unwrap_or(0),
        total_words,
    }))
    .into_response()
}

/// GET /api/learning-stats: aggregate answer history for the caller.
pub async fn learning_stats(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let today = chrono::Utc::now().date_naive();

    let row = match sqlx::query(
        r#"
        SELECT
          COUNT(*)::bigint AS "total",
          COALESCE(SUM(CASE WHEN "isCorrect" THEN 1 ELSE 0 END), 0)::bigint AS "correct",
          COUNT(DISTINCT "wordId")::bigint AS "words",
          COALESCE(SUM(CASE WHEN "recordDate" = $2 THEN 1 ELSE 0 END), 0)::bigint AS "today",
          COUNT(DISTINCT "recordDate")::bigint AS "days"
        FROM "learning_records"
        WHERE "userId" = $1
        "#,
    )
    .bind(&user.id)
    .bind(today)
    .fetch_one(proxy.pool())
    .await
    {
        Ok(row) => row,
        Err(err) => {
            tracing::warn!(error = %err, "learning stats query failed");
            return internal_error();
        }
    };

    let stats = match stats_from_row(&row) {
        Ok(stats) => stats,
        Err(err) => {
            tracing::warn!(error = %err, "learning stats row decode failed");
            return internal_error();
        }
    };

    Json(SuccessResponse::new(stats)).into_response()
}

fn internal_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "服务器内部错误",
    )
    .into_response()
}

fn stats_from_row(row: &sqlx::postgres::PgRow) -> Result<LearningStats, sqlx::Error> {
    let total_answers: i64 = row.try_get("total")?;
    let correct_answers: i64 = row.try_get("correct")?;
    let wrong_answers = total_answers - correct_answers;
    let accuracy = if total_answers > 0 {
        correct_answers as f64 / total_answers as f64
    } else {
        0.0
    };

    Ok(LearningStats {
        total_answers,
        correct_answers,
        wrong_answers,
        accuracy,
        distinct_words: row.try_get("words")?,
        answers_today: row.try_get("today")?,
        active_days: row.try_get("days")?,
    })
}
