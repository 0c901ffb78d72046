use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::is_unique_violation;
use crate::response::json_error;
use crate::routes::{require_auth, split_body, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    user: AuthUser,
}

pub async fn register(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: RegisterRequest = match serde_json::from_slice(&body_bytes) {
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

    if !is_valid_email(&payload.email) {
        return json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "邮箱格式无效")
            .into_response();
    }
    if payload.username.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "用户名不能为空")
            .into_response();
    }
    if payload.password.len() < 8 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "密码长度至少为8位",
        )
        .into_response();
    }

    let Some(proxy) = state.db_proxy() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    let password_hash = match bcrypt::hash(&payload.password, 10) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::warn!(error = %err, "password hash failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
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
    .bind(&payload.email)
    .bind(&password_hash)
    .bind(&payload.username)
    .bind(updated_at)
    .execute(proxy.pool())
    .await
    {
        if is_unique_violation(&err) {
            return json_error(StatusCode::CONFLICT, "CONFLICT", "该邮箱已被注册").into_response();
        }
        tracing::warn!(error = %err, "register insert failed");
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "服务器内部错误",
        )
        .into_response();
    }

    let user = AuthUser {
        id: user_id,
        email: payload.email,
        username: payload.username,
        total_score: 0,
    };

    match issue_session(&proxy, &user.id).await {
        Ok(token) => (
            StatusCode::CREATED,
            Json(SuccessResponse::new(AuthResponse { token, user })),
        )
            .into_response(),
        Err(res) => res,
    }
}

pub async fn login(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (_parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let payload: LoginRequest = match serde_json::from_slice(&body_bytes) {
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

    if payload.password.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "密码不能为空")
            .into_response();
    }

    let Some(proxy) = state.db_proxy() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    let row = match sqlx::query_as::<_, (String, String, String, String, i32)>(
        r#"
        SELECT "id", "email", "username", "passwordHash", "totalScore"
        FROM "users"
        WHERE "email" = $1
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(proxy.pool())
    .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "该邮箱尚未注册")
                .into_response();
        }
        Err(err) => {
            tracing::warn!(error = %err, "login user lookup failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    let (id, email, username, password_hash, total_score) = row;

    let password_ok = bcrypt::verify(&payload.password, &password_hash).unwrap_or(false);
    if !password_ok {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "密码错误").into_response();
    }

    let user = AuthUser {
        id,
        email,
        username,
        total_score: total_score as i64,
    };

    match issue_session(&proxy, &user.id).await {
        Ok(token) => Json(SuccessResponse::new(AuthResponse { token, user })).into_response(),
        Err(res) => res,
    }
}

pub async fn me(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (_proxy, user) = match require_auth(&state, req.headers()).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    Json(SuccessResponse::new(user)).into_response()
}

async fn issue_session(
    proxy: &crate::db::DatabaseProxy,
    user_id: &str,
) -> Result<String, Response> {
    let (token, expires_at) = match crate::auth::sign_jwt_for_user(user_id) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "jwt sign failed");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response());
        }
    };

    let token_hash = crate::auth::hash_token(&token);

    if let Err(err) = sqlx::query(
        r#"
        INSERT INTO "sessions" ("id", "userId", "token", "expiresAt")
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .execute(proxy.pool())
    .await
    {
        tracing::warn!(error = %err, "session insert failed");
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "服务器内部错误",
        )
        .into_response());
    }

    Ok(token)
}

fn is_valid_email(email: &str) -> bool {
    let trimmed = email.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@.com"));
    }
}
