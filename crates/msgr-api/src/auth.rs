use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use msgr_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::error::ChatError;
use crate::{AppState, run_blocking};

const TOKEN_LIFETIME_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: usize = 8;

fn validate_credentials(email: &str, password: &str) -> Result<(), ChatError> {
    if email.len() < 3 || email.len() > 254 || !email.contains('@') {
        return Err(ChatError::Validation("Enter a valid email address.".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ChatError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// `POST /auth/register`. Hashing and the insert run off the async runtime;
/// a taken email is a 409 even when two registrations race.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ChatError> {
    let email = req.email.trim().to_string();
    validate_credentials(&email, &req.password)?;

    let user_id = Uuid::new_v4();
    let password = req.password;
    let stored_email = email.clone();
    let created = run_blocking(&state, move |db| {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?
            .to_string();
        Ok(db.create_user(user_id, &stored_email, &password_hash)?)
    })
    .await?;

    if created.is_none() {
        return Err(ChatError::Conflict("An account with this email already exists."));
    }
    info!("Registered user {}", user_id);

    let token = create_token(&state.jwt_secret, user_id, &email)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user_id, token })))
}

/// `POST /auth/login`. Unknown email and wrong password look the same.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ChatError> {
    let email = req.email.trim().to_string();
    let password = req.password;

    let (user_id, email) = run_blocking(&state, move |db| {
        let user = db.get_user_by_email(&email)?.ok_or(ChatError::Unauthorized)?;
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow!("Stored hash of user {} is corrupt: {}", user.id, e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ChatError::Unauthorized)?;

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| anyhow!("Corrupt user id '{}': {}", user.id, e))?;
        Ok((user_id, user.email))
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &email)?;
    Ok(Json(AuthResponse { user_id, token }))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
