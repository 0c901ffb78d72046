use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{is_retryable_conflict, DatabaseProxy};
use crate::services::scheduler::{self, ReviewState, ScheduleError};

/// How many times a conflicted transaction is attempted before giving up.
const TX_ATTEMPTS: u32 = 3;

/// Quick-drill score deltas, graded reviews score quality * 2 instead.
const CORRECT_SCORE_DELTA: i64 = 3;
const WRONG_SCORE_DELTA: i64 = -2;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("单词不存在")]
    WordNotFound,
    #[error("用户不存在")]
    UserNotFound,
    #[error("操作冲突，请稍后重试")]
    TransientConflict,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub interval_days: i64,
    pub ease_factor: f64,
    pub next_review_date: NaiveDate,
    pub is_correct: bool,
    pub score_change: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningOutcome {
    pub is_correct: bool,
    pub score_change: i64,
}

/// Quality-graded review submission. One transaction covers the progress
/// upsert, the learning record, the word counters and the user score, so a
/// partial failure is never observable.
pub async fn submit_review(
    proxy: &DatabaseProxy,
    user_id: &str,
    word_id: &str,
    quality: i64,
    today: NaiveDate,
) -> Result<ReviewOutcome, ReviewError> {
    // Reject bad input before touching storage.
    scheduler::validate_quality(quality)?;

    let pool = proxy.pool();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match submit_review_once(pool, user_id, word_id, quality, today).await {
            Err(ReviewError::Sql(err)) if is_retryable_conflict(&err) => {
                if attempt >= TX_ATTEMPTS {
                    return Err(ReviewError::TransientConflict);
                }
                tracing::warn!(attempt, error = %err, "review transaction conflict, retrying");
            }
            other => return other,
        }
    }
}

async fn submit_review_once(
    pool: &PgPool,
    user_id: &str,
    word_id: &str,
    quality: i64,
    today: NaiveDate,
) -> Result<ReviewOutcome, ReviewError> {
    let mut tx = pool.begin().await?;

    // Locks the counter row and serializes concurrent reviews of this word.
    let word_exists = sqlx::query(r#"SELECT "id" FROM "words" WHERE "id" = $1 FOR UPDATE"#)
        .bind(word_id)
        .fetch_optional(&mut *tx)
        .await?;
    if word_exists.is_none() {
        return Err(ReviewError::WordNotFound);
    }

    let progress_row = sqlx::query(
        r#"
        SELECT "intervalDays", "easeFactor"
        FROM "word_progress"
        WHERE "userId" = $1 AND "wordId" = $2
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(word_id)
    .fetch_optional(&mut *tx)
    .await?;

    // Lazily created on first review with interval=1, ease=2.5.
    let current = match progress_row {
        Some(row) => ReviewState {
            interval_days: row.try_get::<i32, _>("intervalDays")? as i64,
            ease_factor: row.try_get("easeFactor")?,
        },
        None => ReviewState::default(),
    };

    let next = scheduler::next_state(current, quality)?;
    let next_review_date = today + chrono::Duration::days(next.interval_days);
    let now = chrono::Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "word_progress"
            ("id", "userId", "wordId", "intervalDays", "easeFactor", "nextReviewDate", "updatedAt")
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT ("userId", "wordId") DO UPDATE SET
            "intervalDays" = EXCLUDED."intervalDays",
            "easeFactor" = EXCLUDED."easeFactor",
            "nextReviewDate" = EXCLUDED."nextReviewDate",
            "updatedAt" = EXCLUDED."updatedAt"
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(word_id)
    .bind(next.interval_days as i32)
    .bind(next.ease_factor)
    .bind(next_review_date)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let is_correct = scheduler::is_passing(quality);
    append_learning_record(&mut tx, user_id, word_id, is_correct, today).await?;
    increment_word_counters(&mut tx, word_id, is_correct).await?;

    let score_change = quality * 2;
    apply_score_change(&mut tx, user_id, score_change).await?;

    tx.commit().await?;

    Ok(ReviewOutcome {
        interval_days: next.interval_days,
        ease_factor: next.ease_factor,
        next_review_date,
        is_correct,
        score_change,
    })
}

/// Binary quick-drill submission. Leaves interval/ease untouched: only the
/// learning record, the word counters and the additive score move.
pub async fn submit_learning(
    proxy: &DatabaseProxy,
    user_id: &str,
    word_id: &str,
    is_correct: bool,
    today: NaiveDate,
) -> Result<LearningOutcome, ReviewError> {
    let pool = proxy.pool();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match submit_learning_once(pool, user_id, word_id, is_correct, today).await {
            Err(ReviewError::Sql(err)) if is_retryable_conflict(&err) => {
                if attempt >= TX_ATTEMPTS {
                    return Err(ReviewError::TransientConflict);
                }
                tracing::warn!(attempt, error = %err, "learning transaction conflict, retrying");
            }
            other => return other,
        }
    }
}

async fn submit_learning_once(
    pool: &PgPool,
    user_id: &str,
    word_id: &str,
    is_correct: bool,
    today: NaiveDate,
) -> Result<LearningOutcome, ReviewError> {
    let mut tx = pool.begin().await?;

    let word_exists = sqlx::query(r#"SELECT "id" FROM "words" WHERE "id" = $1 FOR UPDATE"#)
        .bind(word_id)
        .fetch_optional(&mut *tx)
        .await?;
    if word_exists.is_none() {
        return Err(ReviewError::WordNotFound);
    }

    append_learning_record(&mut tx, user_id, word_id, is_correct, today).await?;
    increment_word_counters(&mut tx, word_id, is_correct).await?;

    let score_change = if is_correct {
        CORRECT_SCORE_DELTA
    } else {
        WRONG_SCORE_DELTA
    };
    apply_score_change(&mut tx, user_id, score_change).await?;

    tx.commit().await?;

    Ok(LearningOutcome {
        is_correct,
        score_change,
    })
}

/// Manually pins the next review date `days` days out. Interval and ease of
/// an existing row are left alone.
pub async fn schedule_review(
    proxy: &DatabaseProxy,
    user_id: &str,
    word_id: &str,
    days: i64,
    today: NaiveDate,
) -> Result<NaiveDate, ReviewError> {
    let pool = proxy.pool();
    let mut tx = pool.begin().await?;

    let word_exists = sqlx::query(r#"SELECT "id" FROM "words" WHERE "id" = $1"#)
        .bind(word_id)
        .fetch_optional(&mut *tx)
        .await?;
    if word_exists.is_none() {
        return Err(ReviewError::WordNotFound);
    }

    let next_review_date = today + chrono::Duration::days(days);
    let now = chrono::Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO "word_progress"
            ("id", "userId", "wordId", "intervalDays", "easeFactor", "nextReviewDate", "updatedAt")
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT ("userId", "wordId") DO UPDATE SET
            "nextReviewDate" = EXCLUDED."nextReviewDate",
            "updatedAt" = EXCLUDED."updatedAt"
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(word_id)
    .bind(days.max(1) as i32)
    .bind(scheduler::INITIAL_EASE_FACTOR)
    .bind(next_review_date)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(next_review_date)
}

/// Clears all learning state for a user: progress rows, learning records,
/// checkin records and the accumulated score. One transaction.
pub async fn reset_progress(proxy: &DatabaseProxy, user_id: &str) -> Result<(), ReviewError> {
    let pool = proxy.pool();
    let mut tx = pool.begin().await?;

    sqlx::query(r#"DELETE FROM "word_progress" WHERE "userId" = $1"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(r#"DELETE FROM "learning_records" WHERE "userId" = $1"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(r#"DELETE FROM "checkin_records" WHERE "userId" = $1"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let updated = sqlx::query(r#"UPDATE "users" SET "totalScore" = 0 WHERE "id" = $1"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ReviewError::UserNotFound);
    }

    tx.commit().await?;
    Ok(())
}

async fn append_learning_record(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    word_id: &str,
    is_correct: bool,
    record_date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "learning_records" ("id", "userId", "wordId", "isCorrect", "recordDate")
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(word_id)
    .bind(is_correct)
    .bind(record_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn increment_word_counters(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    word_id: &str,
    is_correct: bool,
) -> Result<(), sqlx::Error> {
    let sql = if is_correct {
        r#"UPDATE "words" SET "frequency" = "frequency" + 1, "correctTimes" = "correctTimes" + 1 WHERE "id" = $1"#
    } else {
        r#"UPDATE "words" SET "frequency" = "frequency" + 1, "wrongTimes" = "wrongTimes" + 1 WHERE "id" = $1"#
    };
    sqlx::query(sql).bind(word_id).execute(&mut **tx).await?;
    Ok(())
}

async fn apply_score_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: &str,
    score_change: i64,
) -> Result<(), ReviewError> {
    let updated = sqlx::query(
        r#"UPDATE "users" SET "totalScore" = "totalScore" + $1, "updatedAt" = NOW() WHERE "id" = $2"#,
    )
    .bind(score_change as i32)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ReviewError::UserNotFound);
    }
    Ok(())
}
