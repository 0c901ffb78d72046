use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::json_error;
use crate::routes::{require_auth, split_body, SuccessResponse};
use crate::state::AppState;

/// Cap on the wrong-words list. The review panel only ever shows a page.
const WRONG_WORDS_LIMIT: i64 = 20;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WordRow {
    pub id: String,
    pub spelling: String,
    #[sqlx(rename = "partOfSpeech")]
    pub part_of_speech: Option<String>,
    pub meaning: String,
    pub frequency: i32,
    #[sqlx(rename = "correctTimes")]
    pub correct_times: i32,
    #[sqlx(rename = "wrongTimes")]
    pub wrong_times: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWordRequest {
    spelling: String,
    part_of_speech: Option<String>,
    meaning: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateWordRequest {
    spelling: Option<String>,
    part_of_speech: Option<String>,
    meaning: Option<String>,
}

const SELECT_WORD_COLUMNS: &str = r#"
    SELECT "id", "spelling", "partOfSpeech", "meaning",
           "frequency", "correctTimes", "wrongTimes"
    FROM "words"
"#;

pub async fn list_words(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, _user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let query = format!("{SELECT_WORD_COLUMNS} ORDER BY \"spelling\" ASC");
    match sqlx::query_as::<_, WordRow>(&query)
        .fetch_all(proxy.pool())
        .await
    {
        Ok(words) => Json(SuccessResponse::new(words)).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "word list query failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}

pub async fn create_word(State(state): State<AppState>, req: Request<Body>) -> Response {
    let headers = req.headers().clone();
    let (proxy, _user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: CreateWordRequest = match serde_json::from_slice(&body_bytes) {
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

    if payload.spelling.trim().is_empty() || payload.meaning.trim().is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "拼写和释义不能为空",
        )
        .into_response();
    }

    let word = WordRow {
        id: Uuid::new_v4().to_string(),
        spelling: payload.spelling.trim().to_string(),
        part_of_speech: payload.part_of_speech,
        meaning: payload.meaning.trim().to_string(),
        frequency: 0,
        correct_times: 0,
        wrong_times: 0,
    };

    if let Err(err) = sqlx::query(
        r#"
        INSERT INTO "words" ("id", "spelling", "partOfSpeech", "meaning")
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&word.id)
    .bind(&word.spelling)
    .bind(&word.part_of_speech)
    .bind(&word.meaning)
    .execute(proxy.pool())
    .await
    {
        tracing::warn!(error = %err, "word insert failed");
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "服务器内部错误",
        )
        .into_response();
    }

    (StatusCode::CREATED, Json(SuccessResponse::new(word))).into_response()
}

pub async fn update_word(
    State(state): State<AppState>,
    Path(word_id): Path<String>,
    req: Request<Body>,
) -> Response {
    let headers = req.headers().clone();
    let (proxy, _user) = match require_auth(&state, &headers).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: UpdateWordRequest = match serde_json::from_slice(&body_bytes) {
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

    let result = sqlx::query(
        r#"
        UPDATE "words" SET
            "spelling" = COALESCE($1, "spelling"),
            "partOfSpeech" = COALESCE($2, "partOfSpeech"),
            "meaning" = COALESCE($3, "meaning")
        WHERE "id" = $4
        "#,
    )
    .bind(&payload.spelling)
    .bind(&payload.part_of_speech)
    .bind(&payload.meaning)
    .bind(&word_id)
    .execute(proxy.pool())
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "单词不存在").into_response()
        }
        Ok(_) => {
            let query = format!("{SELECT_WORD_COLUMNS} WHERE \"id\" = $1");
            match sqlx::query_as::<_, WordRow>(&query)
                .bind(&word_id)
                .fetch_one(proxy.pool())
                .await
            {
                Ok(word) => Json(SuccessResponse::new(word)).into_response(),
                Err(err) => {
                    tracing::warn!(error = %err, "word readback failed");
                    json_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "服务器内部错误",
                    )
                    .into_response()
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "word update failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}

pub async fn delete_word(
    State(state): State<AppState>,
    Path(word_id): Path<String>,
    req: Request<Body>,
) -> Response {
    let (proxy, _user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let pool = proxy.pool();
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::warn!(error = %err, "word delete begin failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    // Progress and records reference the word, so they go first.
    let steps = [
        r#"DELETE FROM "word_progress" WHERE "wordId" = $1"#,
        r#"DELETE FROM "learning_records" WHERE "wordId" = $1"#,
    ];
    for sql in steps {
        if let Err(err) = sqlx::query(sql).bind(&word_id).execute(&mut *tx).await {
            tracing::warn!(error = %err, "word delete cascade failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    }

    let deleted = match sqlx::query(r#"DELETE FROM "words" WHERE "id" = $1"#)
        .bind(&word_id)
        .execute(&mut *tx)
        .await
    {
        Ok(done) => done.rows_affected(),
        Err(err) => {
            tracing::warn!(error = %err, "word delete failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    if deleted == 0 {
        return json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "单词不存在").into_response();
    }

    if let Err(err) = tx.commit().await {
        tracing::warn!(error = %err, "word delete commit failed");
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "服务器内部错误",
        )
        .into_response();
    }

    Json(SuccessResponse::new(serde_json::json!({ "deleted": true }))).into_response()
}

/// Words the caller has studied whose counters still lean wrong. Words the
/// user never touched stay out, however badly the rest of the user base does
/// on them.
pub async fn wrong_words(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    match sqlx::query_as::<_, WordRow>(
        r#"
        SELECT DISTINCT w."id", w."spelling", w."partOfSpeech", w."meaning",
               w."frequency", w."correctTimes", w."wrongTimes"
        FROM "words" w
        JOIN "learning_records" lr
            ON lr."wordId" = w."id" AND lr."userId" = $1
        WHERE w."wrongTimes" > w."correctTimes"
        ORDER BY w."wrongTimes" DESC
        LIMIT $2
        "#,
    )
    .bind(&user.id)
    .bind(WRONG_WORDS_LIMIT)
    .fetch_all(proxy.pool())
    .await
    {
        Ok(words) => Json(SuccessResponse::new(words)).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "wrong words query failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}
