use axum::{extract::State, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{self, CurrentUser};
use crate::error::ApiError;
use crate::models::{Role, User};
use crate::schema::users;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub security_key: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Password login; staff roles must additionally present their security key.
/// The session JWT is set as an httpOnly cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    let conn = &mut state.db()?;

    let user: User = users::table
        .filter(users::email.eq(email.as_str()))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(format!("unknown stored role {:?}", user.role)))?;

    if role.is_staff() {
        let presented = payload.security_key.as_deref().unwrap_or("");
        let stored = user.security_key.as_deref().unwrap_or("");
        if presented.is_empty() || presented != stored {
            return Err(ApiError::Unauthorized("invalid security key".to_string()));
        }
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("account disabled".to_string()));
    }

    let token = auth::create_token(&user.id, role, &state.config.jwt_secret)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))?;
    info!("login for {} ({})", user.email, user.role);

    Ok((
        jar.add(auth::session_cookie(token)),
        Json(json!({ "message": "logged in", "user": user })),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        jar.remove(auth::removal_cookie()),
        Json(json!({ "message": "logged out" })),
    )
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<User>, ApiError> {
    let conn = &mut state.db()?;
    let user: User = users::table.find(current.id.as_str()).first(conn)?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let conn = &mut state.db()?;
    let user: User = users::table.find(current.id.as_str()).first(conn)?;

    let name = match payload.name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        Some(_) => return Err(ApiError::Validation("name cannot be empty".to_string())),
        None => user.name.clone(),
    };
    let phone = match payload.phone {
        Some(p) if !p.trim().is_empty() => p.trim().to_string(),
        Some(_) => return Err(ApiError::Validation("phone cannot be empty".to_string())),
        None => user.phone.clone(),
    };

    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(current.id.as_str()))
        .set((
            users::name.eq(name.as_str()),
            users::phone.eq(phone.as_str()),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;

    let user: User = users::table.find(current.id.as_str()).first(conn)?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.new_password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let conn = &mut state.db()?;
    let user: User = users::table.find(current.id.as_str()).first(conn)?;

    if !auth::verify_password(&payload.current_password, &user.password_hash) {
        return Err(ApiError::Validation(
            "current password is incorrect".to_string(),
        ));
    }

    let hash = auth::hash_password(&payload.new_password)?;
    diesel::update(users::table.find(current.id.as_str()))
        .set((
            users::password_hash.eq(hash.as_str()),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    Ok(Json(json!({ "message": "password updated" })))
}
