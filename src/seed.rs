use sqlx::Row;
use uuid::Uuid;

use crate::db::DatabaseProxy;

struct SeedWord {
    spelling: &'static str,
    part_of_speech: &'static str,
    meaning: &'static str,
}

const SAMPLE_WORDS: &[SeedWord] = &[
    SeedWord { spelling: "apple", part_of_speech: "n.", meaning: "苹果" },
    SeedWord { spelling: "beautiful", part_of_speech: "adj.", meaning: "美丽的" },
    SeedWord { spelling: "computer", part_of_speech: "n.", meaning: "计算机" },
    SeedWord { spelling: "develop", part_of_speech: "v.", meaning: "开发，发展" },
    SeedWord { spelling: "efficient", part_of_speech: "adj.", meaning: "高效的" },
    SeedWord { spelling: "framework", part_of_speech: "n.", meaning: "框架" },
    SeedWord { spelling: "generate", part_of_speech: "v.", meaning: "生成" },
    SeedWord { spelling: "hardware", part_of_speech: "n.", meaning: "硬件" },
    SeedWord { spelling: "implement", part_of_speech: "v.", meaning: "实现" },
    SeedWord { spelling: "javascript", part_of_speech: "n.", meaning: "JavaScript编程语言" },
];

/// Seeds the starter word bank when the words table is empty.
pub async fn seed_sample_words(proxy: &DatabaseProxy) {
    let pool = proxy.pool();

    let count: i64 = match sqlx::query_scalar(r#"SELECT COUNT(*)::bigint FROM "words""#)
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(error = %err, "word count query failed, skipping seed");
            return;
        }
    };

    if count > 0 {
        tracing::debug!(count, "word bank already populated");
        return;
    }

    for word in SAMPLE_WORDS {
        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO "words" ("id", "spelling", "partOfSpeech", "meaning")
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(word.spelling)
        .bind(word.part_of_speech)
        .bind(word.meaning)
        .execute(pool)
        .await
        {
            tracing::warn!(error = %err, spelling = word.spelling, "failed to seed word");
        }
    }

    tracing::info!(count = SAMPLE_WORDS.len(), "seeded sample words");
}

struct TestUser {
    email: &'static str,
    username: &'static str,
    password: &'static str,
}

const TEST_USERS: &[TestUser] = &[TestUser {
    email: "test@example.com",
    username: "testuser",
    password: "TestPass123!",
}];

pub async fn seed_test_users(proxy: &DatabaseProxy) {
    let node_env = std::env::var("NODE_ENV").unwrap_or_default();
    if node_env != "test" {
        return;
    }

    tracing::info!("NODE_ENV=test detected, seeding test users...");

    let pool = proxy.pool();

    for user in TEST_USERS {
        let existing: Option<String> =
            sqlx::query(r#"SELECT "id" FROM "users" WHERE "email" = $1"#)
                .bind(user.email)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten()
                .and_then(|row| row.try_get("id").ok());

        if existing.is_some() {
            tracing::debug!(email = user.email, "test user already exists");
            continue;
        }

        let password_hash = match bcrypt::hash(user.password, 10) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(error = %err, email = user.email, "failed to hash password");
                continue;
            }
        };

        let user_id = Uuid::new_v4().to_string();
        let updated_at = chrono::Utc::now().naive_utc();

        if let Err(err) = sqlx::query(
            r#"
            INSERT INTO "users" ("id", "email", "passwordHash", "username", "updatedAt")
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user_id)
        .bind(user.email)
        .bind(&password_hash)
        .bind(user.username)
        .bind(updated_at)
        .execute(pool)
        .await
        {
            tracing::warn!(error = %err, email = user.email, "failed to seed test user");
        } else {
            tracing::info!(email = user.email, "seeded test user");
        }
    }
}
