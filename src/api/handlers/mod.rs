use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Extension, Json,
};

use super::error::internal_error;
use super::{ApiError, ApiJson, AppState, AuthUser, BOARD_LIMIT};
use crate::auth;
use crate::focus::MindStateEntry;
use crate::history::build_history;
use crate::models::*;
use crate::stats::{BoardEntry, SessionStats};

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The duration rule sessions are checked against.
pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        progression: state.config.progression,
    })
}

// ============================================================
// Auth
// ============================================================

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let valid = auth::validate_signup(&input)?;

    if state.db.email_taken(&valid.email).map_err(internal_error)? {
        return Err(ApiError::Conflict("Email already in use".to_string()));
    }
    if state
        .db
        .username_taken(&valid.username)
        .map_err(internal_error)?
    {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let cost = state.config.hash_cost;
    let password = valid.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    let user = state
        .db
        .create_user(&valid.email, &valid.username, &password_hash)
        .map_err(signup_conflict)?;
    let token = state.db.create_token(user.id).map_err(internal_error)?;

    tracing::info!(username = %user.username, "User signed up");

    Ok((
        [(
            header::SET_COOKIE,
            auth::session_cookie(&token, state.config.cookie_secure),
        )],
        Json(UserResponse { user }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let email = auth::normalize_email(&input.email);
    if email.is_empty() || input.password.is_empty() {
        return Err(auth::ValidationError::MissingCredentials.into());
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let credentials = state
        .db
        .get_credentials_by_email(&email)
        .map_err(internal_error)?
        .ok_or_else(invalid)?;

    let password = input.password;
    let stored = credentials.password_hash;
    let verified =
        tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
            .await
            .map_err(internal_error)?;
    if !verified {
        tracing::warn!("Failed login attempt");
        return Err(invalid());
    }

    let user = credentials.user;
    let token = state.db.create_token(user.id).map_err(internal_error)?;

    tracing::info!(username = %user.username, "User logged in");

    Ok((
        [(
            header::SET_COOKIE,
            auth::session_cookie(&token, state.config.cookie_secure),
        )],
        Json(UserResponse { user }),
    ))
}

/// Always succeeds. Revokes the presented token, if any.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = auth::token_from_headers(&headers) {
        state.db.revoke_token(&token).map_err(internal_error)?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            auth::clear_cookie(state.config.cookie_secure),
        )],
        Json(serde_json::json!({ "ok": true })),
    ))
}

pub async fn me(Extension(auth): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse { user: auth.user })
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(input): ApiJson<UpdateSettingsInput>,
) -> Result<Json<UserResponse>, ApiError> {
    state
        .db
        .update_settings(auth.user.id, input)
        .map_err(internal_error)?
        .map(|user| Json(UserResponse { user }))
        .ok_or_else(|| ApiError::not_found("User"))
}

/// A signup that lost a race to the same email or username still gets a 409.
fn signup_conflict(err: anyhow::Error) -> ApiError {
    match crate::db::unique_violation(&err) {
        Some("users.email") => ApiError::Conflict("Email already in use".to_string()),
        Some("users.username") => ApiError::Conflict("Username already taken".to_string()),
        _ => internal_error(err),
    }
}

// ============================================================
// Sessions
// ============================================================

pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(input): ApiJson<CreateSessionInput>,
) -> Result<Json<SessionResponse>, ApiError> {
    validate_session(&state, &auth.user, &input)?;

    let session = state
        .db
        .create_session(auth.user.id, input)
        .map_err(internal_error)?;

    tracing::info!(
        username = %auth.user.username,
        day = session.day_number,
        completed = session.completed,
        clear_percent = session.clear_percent,
        "Session recorded"
    );

    Ok(Json(SessionResponse { session }))
}

fn validate_session(
    state: &AppState,
    user: &User,
    input: &CreateSessionInput,
) -> Result<(), ApiError> {
    if input.day_number == 0 || input.duration == 0 {
        return Err(ApiError::validation("Missing required fields"));
    }
    if input.clear_percent > 100 {
        return Err(ApiError::validation(
            "clearPercent must be between 0 and 100",
        ));
    }
    if input.day_number > user.current_day {
        return Err(ApiError::validation(format!(
            "Day {} is not unlocked yet",
            input.day_number
        )));
    }
    if !state.config.trust_client_duration {
        let expected = state.config.progression.duration_for(input.day_number);
        if input.duration != expected {
            return Err(ApiError::validation(format!(
                "Duration for day {} must be {} seconds",
                input.day_number, expected
            )));
        }
    }
    if !is_valid_log(&input.mind_state_log, input.duration) {
        return Err(ApiError::validation("Invalid mind-state log"));
    }
    Ok(())
}

/// Times must be finite, within the session and never go backwards.
fn is_valid_log(entries: &[MindStateEntry], duration: u32) -> bool {
    let limit = f64::from(duration);
    let mut last = 0.0;
    for entry in entries {
        if !entry.time.is_finite() || entry.time < last || entry.time > limit {
            return false;
        }
        last = entry.time;
    }
    true
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state
        .db
        .get_sessions(auth.user.id)
        .map_err(internal_error)?;
    let stats = SessionStats::from_sessions(&sessions);
    Ok(Json(SessionsResponse { sessions, stats }))
}

pub async fn get_session_by_day(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(day_number): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let day_number: u32 = day_number
        .parse()
        .map_err(|_| ApiError::validation("Invalid day number"))?;

    let session = state
        .db
        .get_session_by_day(auth.user.id, day_number)
        .map_err(internal_error)?
        .ok_or_else(|| ApiError::not_found("Session"))?;

    let thoughts = state
        .db
        .get_session_thoughts(session.id)
        .map_err(internal_error)?;

    Ok(Json(SessionDetailResponse { session, thoughts }))
}

// ============================================================
// Thoughts
// ============================================================

pub async fn create_thoughts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(input): ApiJson<BatchThoughtsInput>,
) -> Result<Json<ThoughtsResponse>, ApiError> {
    if input.day_number == 0 {
        return Err(ApiError::validation("Missing required fields"));
    }

    let session = state
        .db
        .get_session(auth.user.id, input.session_id)
        .map_err(internal_error)?
        .ok_or_else(|| ApiError::not_found("Session"))?;

    if session.day_number != input.day_number {
        return Err(ApiError::validation("dayNumber does not match session"));
    }

    if input.thoughts.is_empty() {
        return Ok(Json(ThoughtsResponse { thoughts: vec![] }));
    }

    for thought in &input.thoughts {
        let len = thought.text.chars().count();
        if len == 0 || len > MAX_THOUGHT_LEN {
            return Err(ApiError::validation(format!(
                "Thought text must be 1-{MAX_THOUGHT_LEN} characters"
            )));
        }
        if thought.time_in_session < FREE_FORM_NOTE {
            return Err(ApiError::validation("Invalid timeInSession"));
        }
    }

    let thoughts = state
        .db
        .create_thoughts(auth.user.id, session.id, session.day_number, input.thoughts)
        .map_err(internal_error)?;

    tracing::debug!(count = thoughts.len(), day = session.day_number, "Thoughts saved");

    Ok(Json(ThoughtsResponse { thoughts }))
}

pub async fn list_thoughts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ThoughtsResponse>, ApiError> {
    state
        .db
        .get_thoughts(auth.user.id)
        .map(|thoughts| Json(ThoughtsResponse { thoughts }))
        .map_err(internal_error)
}

// ============================================================
// History and board
// ============================================================

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let sessions = state
        .db
        .get_sessions(auth.user.id)
        .map_err(internal_error)?;
    Ok(Json(HistoryResponse {
        history: build_history(&sessions),
    }))
}

pub async fn board(State(state): State<AppState>) -> Result<Json<BoardResponse>, ApiError> {
    let users = state
        .db
        .get_public_users(BOARD_LIMIT)
        .map_err(internal_error)?;

    let mut board = Vec::with_capacity(users.len());
    for user in users {
        let sessions = state.db.get_sessions(user.id).map_err(internal_error)?;
        board.push(BoardEntry::compute(user.username, user.current_day, &sessions));
    }

    Ok(Json(BoardResponse { board }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::MindState;

    #[test]
    fn log_must_stay_within_duration() {
        let ok = vec![
            MindStateEntry::new(0.0, MindState::Clear),
            MindStateEntry::new(12.5, MindState::Thinking),
            MindStateEntry::new(12.5, MindState::Clear),
            MindStateEntry::new(60.0, MindState::Clear),
        ];
        assert!(is_valid_log(&ok, 60));
        assert!(is_valid_log(&[], 60));

        let late = vec![MindStateEntry::new(61.0, MindState::Thinking)];
        assert!(!is_valid_log(&late, 60));

        let backwards = vec![
            MindStateEntry::new(10.0, MindState::Thinking),
            MindStateEntry::new(5.0, MindState::Clear),
        ];
        assert!(!is_valid_log(&backwards, 60));

        let nan = vec![MindStateEntry::new(f64::NAN, MindState::Thinking)];
        assert!(!is_valid_log(&nan, 60));
    }

    #[test]
    fn duplicate_insert_maps_to_conflict() {
        let db = crate::db::Database::open_memory().unwrap();
        db.migrate().unwrap();
        db.create_user("ada@example.com", "ada", "hash").unwrap();

        let same_email = db.create_user("ada@example.com", "other", "hash").unwrap_err();
        let err = signup_conflict(same_email);
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Email already in use");

        let same_name = db.create_user("new@example.com", "ada", "hash").unwrap_err();
        assert_eq!(signup_conflict(same_name).to_string(), "Username already taken");

        let other = signup_conflict(anyhow::anyhow!("disk full"));
        assert_eq!(other.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
