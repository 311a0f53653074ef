//! Account registration, login and bearer-token authentication.

use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use chrono::Duration;
use db::{
    DBService,
    models::user::{AuthToken, CreateUser, LoginUser, RegisterUser, User},
};
use thiserror::Error;
use utils::jwt::{self, TokenClaimsError};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("User already exists with this email")]
    DuplicateEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenClaimsError),
    #[error("Failed to issue token: {0}")]
    IssueToken(TokenClaimsError),
    #[error("Token refers to an unknown user")]
    UnknownUser,
    #[error("Password hashing failed: {0}")]
    PasswordHash(password_hash::Error),
    #[error("Password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AuthServiceError>;

/// Issues and checks access tokens for the users stored in the database.
#[derive(Clone)]
pub struct AuthService {
    db: DBService,
    jwt_secret: String,
    jwt_ttl: Duration,
}

impl AuthService {
    pub fn new(db: DBService, jwt_secret: impl Into<String>, jwt_ttl: Duration) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            jwt_ttl,
        }
    }

    pub async fn register(&self, payload: &RegisterUser) -> Result<AuthToken> {
        let name = payload.name.trim();
        let email = normalize_email(&payload.email);
        if name.is_empty() || email.is_empty() || payload.password.is_empty() {
            return Err(AuthServiceError::Validation(
                "Please provide name, email and password".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthServiceError::Validation(
                "Please provide a valid email".to_string(),
            ));
        }
        if payload.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthServiceError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        let password = payload.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let data = CreateUser {
            name: name.to_string(),
            email,
        };
        let user = User::create(&self.db.pool, &data, &password_hash, Uuid::new_v4())
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation())
                {
                    AuthServiceError::DuplicateEmail
                } else {
                    AuthServiceError::Database(e)
                }
            })?;

        tracing::info!(user_id = %user.id, "Registered user");
        self.session_for(user)
    }

    pub async fn login(&self, payload: &LoginUser) -> Result<AuthToken> {
        let email = normalize_email(&payload.email);
        if email.is_empty() || payload.password.is_empty() {
            return Err(AuthServiceError::Validation(
                "Please provide email and password".to_string(),
            ));
        }

        let Some((user, password_hash)) =
            User::find_with_password_by_email(&self.db.pool, &email).await?
        else {
            return Err(AuthServiceError::InvalidCredentials);
        };

        let password = payload.password.clone();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await?;
        if !matches {
            return Err(AuthServiceError::InvalidCredentials);
        }

        tracing::debug!(user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    /// Resolves a bearer token to the user it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = jwt::verify_token(&self.jwt_secret, token)?;
        let user_id = claims.user_id()?;
        User::find_by_id(&self.db.pool, user_id)
            .await?
            .ok_or(AuthServiceError::UnknownUser)
    }

    fn session_for(&self, user: User) -> Result<AuthToken> {
        let token = jwt::issue_token(&self.jwt_secret, user.id, &user.email, self.jwt_ttl)
            .map_err(AuthServiceError::IssueToken)?;
        Ok(AuthToken { token, user })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(AuthServiceError::PasswordHash)
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}
