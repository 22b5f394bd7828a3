use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::middleware_auth::JwtUser;
use crate::state::AppState;

// MODELS

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Account representation for authenticated reads; the credential hash
/// never leaves this module.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            profile_picture: user.profile_picture,
            is_staff: user.is_staff,
            is_active: user.is_active,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    iat: usize,
}

// HELPER FUNCTIONS

/// Credential-strength policy: at least 8 characters, not entirely numeric.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::validation(
            "password",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation(
            "password",
            "This password is entirely numeric.",
        ));
    }

    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

/// Local registration checks; the duplicate-email lookup happens against the
/// store afterwards.
fn validate_registration(payload: &RegisterRequest) -> Result<(), ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::validation(
            "username",
            "This field may not be blank.",
        ));
    }

    if !looks_like_email(&payload.email) {
        return Err(ApiError::validation("email", "Enter a valid email address."));
    }

    if payload.password != payload.confirm_password {
        return Err(ApiError::validation(
            "password",
            "Password fields didn't match.",
        ));
    }

    validate_password(&payload.password)
}

fn issue_token(secret: &str, user_id: Uuid) -> Result<String, ApiError> {
    let now = Utc::now();
    let exp = now + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("jwt encode error: {e}")))
}

// HANDLERS

/// Create an account. Field-scoped failures: blank username, malformed or
/// already-registered email, mismatched or weak passwords.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&payload)?;

    let username = payload.username.trim();

    let email_taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)
        "#,
    )
    .bind(&payload.email)
    .fetch_one(&state.db)
    .await?;

    if email_taken {
        return Err(ApiError::validation(
            "email",
            "A user with this email already exists.",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon = Argon2::default();
    let password_hash = argon
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hash error: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();

    let res = sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(&payload.email)
    .bind(&password_hash)
    .execute(&state.db)
    .await;

    if let Err(e) = res {
        // a unique violation that raced past the EXISTS check still comes
        // back field-scoped
        if let Some(db_error) = e.as_database_error() {
            if db_error.code() == Some(std::borrow::Cow::Borrowed("23505")) {
                let (field, message) = if db_error.constraint() == Some("users_username_key") {
                    ("username", "A user with this username already exists.")
                } else {
                    ("email", "A user with this email already exists.")
                };
                return Err(ApiError::validation(field, message));
            }
        }
        return Err(ApiError::Database(e));
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user_id,
            username: username.to_string(),
            email: payload.email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users WHERE email = $1
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::InvalidCredentials)?;

    if !user.is_active {
        return Err(ApiError::InvalidCredentials);
    }

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Internal(format!("stored password hash unreadable: {e}")))?;
    let argon = Argon2::default();
    if argon
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&state.jwt_secret, user.id)?;
    Ok(Json(LoginResponse { token }))
}

/// Account profile for the authenticated caller.
pub async fn me(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn request(username: &str, email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn field_of(err: ApiError) -> &'static str {
        match err {
            ApiError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_passwords_are_rejected() {
        let err = validate_registration(&request("alice", "alice@example.com", "s3cret-pw", "other-pw"))
            .unwrap_err();
        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "password");
                assert_eq!(message, "Password fields didn't match.");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_username_is_rejected() {
        let err = validate_registration(&request("  ", "alice@example.com", "s3cret-pw", "s3cret-pw"))
            .unwrap_err();
        assert_eq!(field_of(err), "username");
    }

    #[test]
    fn test_malformed_email_is_rejected() {
        for email in ["not-an-email", "@example.com", "alice@nodot"] {
            let err =
                validate_registration(&request("alice", email, "s3cret-pw", "s3cret-pw")).unwrap_err();
            assert_eq!(field_of(err), "email");
        }
    }

    #[test]
    fn test_short_password_is_rejected() {
        let err = validate_password("abc123").unwrap_err();
        assert_eq!(field_of(err), "password");
    }

    #[test]
    fn test_entirely_numeric_password_is_rejected() {
        let err = validate_password("12345678").unwrap_err();
        assert_eq!(field_of(err), "password");
    }

    #[test]
    fn test_valid_registration_passes() {
        assert!(
            validate_registration(&request("alice", "alice@example.com", "s3cret-pw", "s3cret-pw"))
                .is_ok()
        );
    }

    #[test]
    fn test_password_hash_round_trips() {
        let salt = SaltString::generate(&mut OsRng);
        let argon = Argon2::default();
        let hash = argon
            .hash_password(b"s3cret-pw", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(argon.verify_password(b"s3cret-pw", &parsed).is_ok());
        assert!(argon.verify_password(b"wrong-pw", &parsed).is_err());
    }

    #[test]
    fn test_issued_token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = issue_token("test-secret", user_id).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_id.to_string());
    }
}
