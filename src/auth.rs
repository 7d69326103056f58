//! Credentials, tokens and the session cookie.
//!
//! Passwords are stored as bcrypt hashes. Tokens are opaque random strings;
//! the database decides whether one is live.

use axum::http::{header, HeaderMap};
use rand::RngCore;
use thiserror::Error;

use crate::models::SignupInput;

pub const COOKIE_NAME: &str = "sp_token";
pub const TOKEN_TTL_DAYS: i64 = 7;
pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt cost used unless configured otherwise.
pub const DEFAULT_HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Cheapest cost bcrypt accepts. For tests and local throwaway servers.
pub const MIN_HASH_COST: u32 = 4;
const TOKEN_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields required")]
    MissingFields,
    #[error("Email and password required")]
    MissingCredentials,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Username must be 3-30 characters (letters, numbers, underscores)")]
    InvalidUsername,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
}

/// Signup input after validation. The email is trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub fn validate_signup(input: &SignupInput) -> Result<ValidSignup, ValidationError> {
    let email = normalize_email(&input.email);
    if email.is_empty() || input.username.is_empty() || input.password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }
    if !is_valid_username(&input.username) {
        return Err(ValidationError::InvalidUsername);
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(ValidSignup {
        email,
        username: input.username.clone(),
        password: input.password.clone(),
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    if domain.contains('@') || domain.chars().any(char::is_whitespace) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub fn is_valid_username(username: &str) -> bool {
    (3..=30).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// bcrypt hash at the given cost. Slow on purpose; call it off the
/// async executor.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Malformed stored hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = TOKEN_TTL_DAYS * 24 * 60 * 60;
    let mut cookie =
        format!("{COOKIE_NAME}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{COOKIE_NAME}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Bearer token if present, otherwise the `sp_token` cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        let bearer = bearer.trim();
        if !bearer.is_empty() {
            return Some(bearer.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Pulls the token out of a `Set-Cookie` value issued by the server.
pub fn token_from_set_cookie(set_cookie: &str) -> Option<String> {
    let first = set_cookie.split(';').next()?.trim();
    let (name, value) = first.split_once('=')?;
    (name == COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
}
