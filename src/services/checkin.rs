use chrono::NaiveDate;
use serde::Serialize;
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{is_unique_violation, DatabaseProxy};
use crate::services::streak::{self, CheckinKind, PriorCheckin};

#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("该日期已经打过卡")]
    AlreadyCheckedIn,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    pub id: String,
    pub checkin_date: NaiveDate,
    pub checkin_type: String,
    pub streak_days: i64,
    pub words_learned: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinStatus {
    pub checked_in_today: bool,
    pub current_streak: i64,
    pub total_checkins: i64,
    pub last_checkin_date: Option<NaiveDate>,
}

/// Writes the checkin for (user, date). The prior-checkin read, the streak
/// computation, the same-day learning aggregate snapshot and the insert all
/// happen in one transaction; a duplicate date is rejected with no state
/// change, both by the pre-check and by the unique key on insert.
pub async fn submit_checkin(
    proxy: &DatabaseProxy,
    user_id: &str,
    date: NaiveDate,
    kind: CheckinKind,
) -> Result<CheckinRecord, CheckinError> {
    let pool = proxy.pool();
    let mut tx = pool.begin().await?;

    let existing = sqlx::query(
        r#"SELECT "id" FROM "checkin_records" WHERE "userId" = $1 AND "checkinDate" = $2"#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(CheckinError::AlreadyCheckedIn);
    }

    let prior_row = sqlx::query(
        r#"
        SELECT "checkinDate", "streakDays"
        FROM "checkin_records"
        WHERE "userId" = $1
        ORDER BY "checkinDate" DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let prior = match prior_row {
        Some(row) => Some(PriorCheckin {
            date: row.try_get("checkinDate")?,
            streak_days: row.try_get::<i32, _>("streakDays")? as i64,
        }),
        None => None,
    };

    let streak_days = streak::next_streak(prior, date, kind);

    // Snapshot of the day's learning activity, captured once at submission.
    let agg = sqlx::query(
        r#"
        SELECT
          COUNT(*)::bigint as "count",
          SUM(CASE WHEN "isCorrect" THEN 1 ELSE 0 END)::bigint as "correct",
          SUM(CASE WHEN "isCorrect" THEN 0 ELSE 1 END)::bigint as "wrong"
        FROM "learning_records"
        WHERE "userId" = $1 AND "recordDate" = $2
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(&mut *tx)
    .await?;

    let words_learned: i64 = agg.try_get::<Option<i64>, _>("count")?.unwrap_or(0);
    let correct_count: i64 = agg.try_get::<Option<i64>, _>("correct")?.unwrap_or(0);
    let wrong_count: i64 = agg.try_get::<Option<i64>, _>("wrong")?.unwrap_or(0);

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO "checkin_records"
            ("id", "userId", "checkinDate", "checkinType", "streakDays",
             "wordsLearned", "correctCount", "wrongCount")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(date)
    .bind(kind.as_str())
    .bind(streak_days as i32)
    .bind(words_learned as i32)
    .bind(correct_count as i32)
    .bind(wrong_count as i32)
    .execute(&mut *tx)
    .await
    .map_err(classify_insert_error)?;

    tx.commit().await?;

    Ok(CheckinRecord {
        id,
        checkin_date: date,
        checkin_type: kind.as_str().to_string(),
        streak_days,
        words_learned,
        correct_count,
        wrong_count,
    })
}

/// Maps the race where two submissions pass the pre-check and both insert:
/// the loser's unique-key violation surfaces as the same conflict the
/// pre-check reports.
fn classify_insert_error(err: sqlx::Error) -> CheckinError {
    if is_unique_violation(&err) {
        CheckinError::AlreadyCheckedIn
    } else {
        CheckinError::Sql(err)
    }
}

/// Read-only status for the checkin panel. The streak counts as alive while
/// the latest record is from today or yesterday.
pub async fn checkin_status(
    proxy: &DatabaseProxy,
    user_id: &str,
    today: NaiveDate,
) -> Result<CheckinStatus, CheckinError> {
    let pool = proxy.pool();

    let latest = sqlx::query(
        r#"
        SELECT "checkinDate", "streakDays"
        FROM "checkin_records"
        WHERE "userId" = $1
        ORDER BY "checkinDate" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let total_checkins: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*)::bigint FROM "checkin_records" WHERE "userId" = $1"#)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let (checked_in_today, current_streak, last_checkin_date) = match latest {
        Some(row) => {
            let last_date: NaiveDate = row.try_get("checkinDate")?;
            let streak = row.try_get::<i32, _>("streakDays")? as i64;
            let age_days = (today - last_date).num_days();
            let alive = age_days <= 1;
            (
                last_date == today,
                if alive { streak } else { 0 },
                Some(last_date),
            )
        }
        None => (false, 0, None),
    };

    Ok(CheckinStatus {
        checked_in_today,
        current_streak,
        total_checkins,
        last_checkin_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unique_violations_become_duplicate_checkins() {
        let err = classify_insert_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, CheckinError::Sql(_)));

        let err = classify_insert_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, CheckinError::Sql(_)));
    }
}
