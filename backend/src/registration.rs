use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::ApiError;
use crate::mailer;
use crate::models::{PendingUser, Role, User, PURPOSE_REGISTER, PURPOSE_RESET};
use crate::schema::{pending_users, users};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// Roles allowed through self-registration. Staff accounts are created by the
/// super admin.
fn registrable_role(raw: &str) -> Result<Role, ApiError> {
    match Role::parse(raw) {
        Some(role @ (Role::Buyer | Role::Builder)) => Ok(role),
        Some(_) => Err(ApiError::Validation(
            "only buyer and builder accounts can self-register".to_string(),
        )),
        None => Err(ApiError::Validation("unknown role".to_string())),
    }
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

/// Stages the registration and emails a verification code. Any earlier
/// staging row for the same email is replaced.
pub async fn register_step1(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&payload.email)?;
    let name = payload.name.trim().to_string();
    let phone = payload.phone.trim().to_string();
    if name.is_empty() || phone.is_empty() {
        return Err(ApiError::Validation("name and phone are required".to_string()));
    }
    check_password(&payload.password)?;
    let role = registrable_role(&payload.role)?;

    let conn = &mut state.db()?;
    let taken: i64 = users::table
        .filter(users::email.eq(email.as_str()))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(ApiError::Conflict("email is already registered".to_string()));
    }

    let now = Utc::now().naive_utc();
    let otp = auth::generate_otp();
    let staged = PendingUser {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        name: Some(name),
        phone: Some(phone),
        password_hash: Some(auth::hash_password(&payload.password)?),
        role: Some(role.as_str().to_string()),
        purpose: PURPOSE_REGISTER.to_string(),
        otp_code: otp.clone(),
        otp_expires_at: now + Duration::minutes(auth::OTP_TTL_MINUTES),
        created_at: now,
    };

    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::delete(
            pending_users::table
                .filter(pending_users::email.eq(email.as_str()))
                .filter(pending_users::purpose.eq(PURPOSE_REGISTER)),
        )
        .execute(conn)?;
        diesel::insert_into(pending_users::table)
            .values(&staged)
            .execute(conn)?;
        Ok(())
    })?;

    mailer::send_registration_otp(state.mailer.as_ref(), &email, &otp);
    info!("staged registration for {}", email);

    Ok(Json(json!({ "message": "OTP sent to email" })))
}

/// Checks the code against the staging row and promotes it to a permanent
/// user. The staging row is deleted either on success or once it has expired.
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let email = normalize_email(&payload.email)?;
    let conn = &mut state.db()?;

    let staged: PendingUser = pending_users::table
        .filter(pending_users::email.eq(email.as_str()))
        .filter(pending_users::purpose.eq(PURPOSE_REGISTER))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("no pending registration for this email".to_string()))?;

    let now = Utc::now().naive_utc();
    if now >= staged.otp_expires_at {
        diesel::delete(pending_users::table.filter(pending_users::id.eq(staged.id.as_str())))
            .execute(conn)?;
        return Err(ApiError::Validation(
            "OTP has expired, request a new code".to_string(),
        ));
    }
    if !auth::otp_is_valid(&staged.otp_code, payload.otp.trim(), staged.otp_expires_at, now) {
        return Err(ApiError::Validation("incorrect OTP".to_string()));
    }

    let role_str = staged
        .role
        .clone()
        .ok_or_else(|| ApiError::Validation("incomplete registration data".to_string()))?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| ApiError::Validation("incomplete registration data".to_string()))?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: staged
            .name
            .clone()
            .ok_or_else(|| ApiError::Validation("incomplete registration data".to_string()))?,
        email: staged.email.clone(),
        phone: staged.phone.clone().unwrap_or_default(),
        password_hash: staged
            .password_hash
            .clone()
            .ok_or_else(|| ApiError::Validation("incomplete registration data".to_string()))?,
        role: role_str,
        security_key: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    // The email can have been claimed between staging and verification (a
    // staff account created for the same address, or a concurrent
    // verification), so the uniqueness check is repeated inside the
    // transaction. The unique index on users.email is the final arbiter and
    // maps to 409.
    conn.transaction::<_, ApiError, _>(|conn| {
        let taken: i64 = users::table
            .filter(users::email.eq(staged.email.as_str()))
            .count()
            .get_result(conn)?;
        if taken > 0 {
            diesel::delete(pending_users::table.filter(pending_users::id.eq(staged.id.as_str())))
                .execute(conn)?;
            return Err(ApiError::Conflict("email is already registered".to_string()));
        }
        diesel::insert_into(users::table).values(&user).execute(conn)?;
        diesel::delete(pending_users::table.filter(pending_users::id.eq(staged.id.as_str())))
            .execute(conn)?;
        Ok(())
    })?;

    let token = auth::create_token(&user.id, role, &state.config.jwt_secret)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))?;
    info!("registration verified for {}", user.email);

    Ok((
        jar.add(auth::session_cookie(token)),
        Json(json!({ "message": "registration complete", "user": user })),
    ))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&payload.email)?;
    let conn = &mut state.db()?;

    let now = Utc::now().naive_utc();
    let otp = auth::generate_otp();
    let updated = diesel::update(
        pending_users::table
            .filter(pending_users::email.eq(email.as_str()))
            .filter(pending_users::purpose.eq(PURPOSE_REGISTER)),
    )
    .set((
        pending_users::otp_code.eq(otp.as_str()),
        pending_users::otp_expires_at.eq(now + Duration::minutes(auth::OTP_TTL_MINUTES)),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(ApiError::NotFound(
            "no pending registration for this email".to_string(),
        ));
    }

    mailer::send_registration_otp(state.mailer.as_ref(), &email, &otp);
    Ok(Json(json!({ "message": "OTP sent to email" })))
}

/// Always answers 200 so the endpoint cannot be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&payload.email)?;
    let conn = &mut state.db()?;

    let exists: i64 = users::table
        .filter(users::email.eq(email.as_str()))
        .count()
        .get_result(conn)?;

    if exists > 0 {
        let now = Utc::now().naive_utc();
        let otp = auth::generate_otp();
        let staged = PendingUser {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: None,
            phone: None,
            password_hash: None,
            role: None,
            purpose: PURPOSE_RESET.to_string(),
            otp_code: otp.clone(),
            otp_expires_at: now + Duration::minutes(auth::OTP_TTL_MINUTES),
            created_at: now,
        };

        conn.transaction::<_, ApiError, _>(|conn| {
            diesel::delete(
                pending_users::table
                    .filter(pending_users::email.eq(email.as_str()))
                    .filter(pending_users::purpose.eq(PURPOSE_RESET)),
            )
            .execute(conn)?;
            diesel::insert_into(pending_users::table)
                .values(&staged)
                .execute(conn)?;
            Ok(())
        })?;

        mailer::send_reset_otp(state.mailer.as_ref(), &email, &otp);
    }

    Ok(Json(json!({
        "message": "if the account exists, a reset code has been sent"
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&payload.email)?;
    check_password(&payload.new_password)?;
    let conn = &mut state.db()?;

    let staged: PendingUser = pending_users::table
        .filter(pending_users::email.eq(email.as_str()))
        .filter(pending_users::purpose.eq(PURPOSE_RESET))
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("no reset request for this email".to_string()))?;

    let now = Utc::now().naive_utc();
    if now >= staged.otp_expires_at {
        diesel::delete(pending_users::table.filter(pending_users::id.eq(staged.id.as_str())))
            .execute(conn)?;
        return Err(ApiError::Validation(
            "OTP has expired, request a new code".to_string(),
        ));
    }
    if !auth::otp_is_valid(&staged.otp_code, payload.otp.trim(), staged.otp_expires_at, now) {
        return Err(ApiError::Validation("incorrect OTP".to_string()));
    }

    let hash = auth::hash_password(&payload.new_password)?;
    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::update(users::table.filter(users::email.eq(email.as_str())))
            .set((
                users::password_hash.eq(hash.as_str()),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;
        diesel::delete(pending_users::table.filter(pending_users::id.eq(staged.id.as_str())))
            .execute(conn)?;
        Ok(())
    })?;

    info!("password reset for {}", email);
    Ok(Json(json!({ "message": "password updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_registration_limited_to_buyer_and_builder() {
        assert!(registrable_role("buyer").is_ok());
        assert!(registrable_role("builder").is_ok());
        assert!(registrable_role("admin").is_err());
        assert!(registrable_role("super-admin").is_err());
        assert!(registrable_role("tenant").is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Buyer@Example.COM ").unwrap(), "buyer@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(check_password("seven77").is_err());
        assert!(check_password("eight888").is_ok());
    }
}
