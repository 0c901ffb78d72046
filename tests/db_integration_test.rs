//! End-to-end tests against a real Postgres instance. Every test returns
//! early when DATABASE_URL is unset, so the default suite stays db-less.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use uuid::Uuid;

use vocab_backend_rust::db::{migrate, DatabaseProxy};

fn database_configured() -> bool {
    std::env::var("DATABASE_URL")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

async fn setup_app() -> Option<Router> {
    if !database_configured() {
        return None;
    }
    std::env::set_var("JWT_SECRET", "integration-test-secret");

    let proxy = DatabaseProxy::from_env()
        .await
        .expect("database connection failed");
    migrate::run_migrations(proxy.pool())
        .await
        .expect("migrations failed");

    Some(vocab_backend_rust::create_app().await)
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_user(app: &Router) -> (String, String) {
    let payload = serde_json::json!({
        "email": format!("it-{}@example.com", Uuid::new_v4()),
        "username": "integration",
        "password": "IntegrationPass1!",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = response_json(response).await;
    let token = json["data"]["token"].as_str().unwrap().to_string();
    let user_id = json["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, user_id)
}

async fn post_checkin(app: &Router, token: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/checkin")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn duplicate_checkin_is_rejected_and_leaves_one_record() {
    let Some(app) = setup_app().await else { return };
    let (token, user_id) = register_user(&app).await;

    let first = post_checkin(&app, &token).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_json = response_json(first).await;
    assert_eq!(first_json["data"]["streakDays"], 1);

    let second = post_checkin(&app, &token).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let second_json = response_json(second).await;
    assert_eq!(second_json["code"], "ALREADY_CHECKED_IN");

    let proxy = DatabaseProxy::from_env().await.unwrap();
    let count: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*)::bigint FROM "checkin_records" WHERE "userId" = $1"#,
    )
    .bind(&user_id)
    .fetch_one(proxy.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn wrong_words_only_cover_the_callers_records() {
    let Some(app) = setup_app().await else { return };

    // A word the rest of the user base keeps missing.
    let proxy = DatabaseProxy::from_env().await.unwrap();
    sqlx::query(
        r#"
        INSERT INTO "words" ("id", "spelling", "partOfSpeech", "meaning",
                             "correctTimes", "wrongTimes")
        VALUES ($1, $2, 'n.', '测试', 1, 9)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(format!("missed-{}", Uuid::new_v4()))
    .execute(proxy.pool())
    .await
    .unwrap();

    // A fresh user with no learning records sees none of it.
    let (token, _user_id) = register_user(&app).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/wrong-words")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["data"], serde_json::json!([]));
}
