use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Role, User};
use crate::schema::users;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "token";
pub const TOKEN_TTL_HOURS: i64 = 24;
pub const OTP_TTL_MINUTES: i64 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

pub fn create_token(
    user_id: &str,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Zero-padded 6-digit code, e.g. "042319".
pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn otp_is_valid(
    stored: &str,
    given: &str,
    expires_at: NaiveDateTime,
    now: NaiveDateTime,
) -> bool {
    stored == given && now < expires_at
}

/// Session cookie carrying the signed JWT. The JWT itself bounds the session
/// lifetime, so no Max-Age is set.
pub fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookie
}

/// Authenticated caller, injected into request extensions by [`authenticate`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "insufficient permissions for this resource".to_string(),
            ))
        }
    }
}

/// Reads the JWT from the `token` httpOnly cookie (or an `Authorization:
/// Bearer` header), validates it, and loads the account. Disabled accounts
/// are rejected even with a valid token.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or_else(|| ApiError::Unauthorized("missing session token".to_string()))?;

    let claims = validate_token(&token, &state.config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_string()))?;
    let role = Role::parse(&claims.role)
        .ok_or_else(|| ApiError::Unauthorized("unknown role".to_string()))?;

    let conn = &mut state.db()?;
    let user: User = users::table
        .find(claims.sub.as_str())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::Unauthorized("account no longer exists".to_string()))?;
    if !user.is_active {
        return Err(ApiError::Forbidden("account disabled".to_string()));
    }

    request
        .extensions_mut()
        .insert(CurrentUser { id: user.id, role });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("user-1", Role::Builder, "secret").unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "builder");
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let token = create_token("user-1", Role::Buyer, "secret").unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn otp_rejected_after_expiry_or_mismatch() {
        let now = Utc::now().naive_utc();
        let expires = now + Duration::minutes(OTP_TTL_MINUTES);

        assert!(otp_is_valid("123456", "123456", expires, now));
        assert!(!otp_is_valid("123456", "654321", expires, now));
        assert!(!otp_is_valid("123456", "123456", now, now));
        assert!(!otp_is_valid(
            "123456",
            "123456",
            now - Duration::seconds(1),
            now
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
