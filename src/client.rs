//! HTTP client for the Still Point API.
//!
//! Used by the practice runner and the one-shot CLI commands. The base URL
//! is the server root (`http://127.0.0.1:3000`); every path is under `/api`.

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::auth;
use crate::focus::{Progression, SessionRecord};
use crate::history::HistoryEntry;
use crate::models::*;
use crate::stats::BoardEntry;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Server did not issue a session token")]
    MissingToken,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Result of saving a finished attempt. The session is always stored
/// first; the thoughts are attempted afterwards and may fail on their own.
#[derive(Debug)]
pub struct Persisted {
    pub session: Session,
    pub thoughts: Result<Vec<Thought>, ClientError>,
}

#[derive(Debug, Clone)]
pub struct StillpointClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl StillpointClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(error_from_response(status, response).await)
        }
    }

    // ============================================================
    // Auth
    // ============================================================

    /// Creates an account and keeps the issued token.
    pub async fn signup(&mut self, input: &SignupInput) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "/auth/signup")
            .json(input)
            .send()
            .await?;
        self.accept_session(response).await
    }

    /// Logs in and keeps the issued token.
    pub async fn login(&mut self, input: &LoginInput) -> Result<User, ClientError> {
        let response = self
            .request(Method::POST, "/auth/login")
            .json(input)
            .send()
            .await?;
        self.accept_session(response).await
    }

    async fn accept_session(&mut self, response: reqwest::Response) -> Result<User, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let token = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(auth::token_from_set_cookie)
            .ok_or(ClientError::MissingToken)?;

        let body: UserResponse = response.json().await?;
        self.token = Some(token);
        Ok(body.user)
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let response = self.request(Method::POST, "/auth/logout").send().await?;
        let _: serde_json::Value = self.handle_response(response).await?;
        self.token = None;
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        let response = self.request(Method::GET, "/auth/me").send().await?;
        let body: UserResponse = self.handle_response(response).await?;
        Ok(body.user)
    }

    pub async fn update_settings(&self, input: &UpdateSettingsInput) -> Result<User, ClientError> {
        let response = self
            .request(Method::PATCH, "/settings")
            .json(input)
            .send()
            .await?;
        let body: UserResponse = self.handle_response(response).await?;
        Ok(body.user)
    }

    // ============================================================
    // Sessions and thoughts
    // ============================================================

    pub async fn create_session(&self, input: &CreateSessionInput) -> Result<Session, ClientError> {
        let response = self
            .request(Method::POST, "/sessions")
            .json(input)
            .send()
            .await?;
        let body: SessionResponse = self.handle_response(response).await?;
        Ok(body.session)
    }

    pub async fn list_sessions(&self) -> Result<SessionsResponse, ClientError> {
        let response = self.request(Method::GET, "/sessions").send().await?;
        self.handle_response(response).await
    }

    pub async fn get_session(&self, day_number: u32) -> Result<SessionDetailResponse, ClientError> {
        let response = self
            .request(Method::GET, &format!("/sessions/{}", day_number))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn create_thoughts(
        &self,
        input: &BatchThoughtsInput,
    ) -> Result<Vec<Thought>, ClientError> {
        let response = self
            .request(Method::POST, "/thoughts/batch")
            .json(input)
            .send()
            .await?;
        let body: ThoughtsResponse = self.handle_response(response).await?;
        Ok(body.thoughts)
    }

    pub async fn list_thoughts(&self) -> Result<Vec<Thought>, ClientError> {
        let response = self.request(Method::GET, "/thoughts").send().await?;
        let body: ThoughtsResponse = self.handle_response(response).await?;
        Ok(body.thoughts)
    }

    /// Saves a finished attempt: the session first, then its thoughts
    /// against the returned id. A thought failure is logged and reported in
    /// [`Persisted::thoughts`]; the session stays saved.
    pub async fn persist_record(&self, record: &SessionRecord) -> Result<Persisted, ClientError> {
        let session = self.create_session(&record.session).await?;

        let thoughts = if record.thoughts.is_empty() {
            Ok(Vec::new())
        } else {
            let result = self
                .create_thoughts(&BatchThoughtsInput {
                    session_id: session.id,
                    day_number: session.day_number,
                    thoughts: record.thoughts.clone(),
                })
                .await;
            if let Err(ref e) = result {
                tracing::warn!("Session {} saved but its thoughts were not: {}", session.id, e);
            }
            result
        };

        Ok(Persisted { session, thoughts })
    }

    /// Attaches an end-of-session note to a stored session.
    pub async fn save_note(&self, session: &Session, text: &str) -> Result<Thought, ClientError> {
        let mut saved = self
            .create_thoughts(&BatchThoughtsInput {
                session_id: session.id,
                day_number: session.day_number,
                thoughts: vec![NewThought::note(text)],
            })
            .await?;
        saved
            .pop()
            .ok_or_else(|| ClientError::Server("note was not stored".to_string()))
    }

    // ============================================================
    // History and board
    // ============================================================

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        let response = self.request(Method::GET, "/history").send().await?;
        let body: HistoryResponse = self.handle_response(response).await?;
        Ok(body.history)
    }

    pub async fn board(&self) -> Result<Vec<BoardEntry>, ClientError> {
        let response = self.request(Method::GET, "/board").send().await?;
        let body: BoardResponse = self.handle_response(response).await?;
        Ok(body.board)
    }

    /// The duration rule the server checks sessions against.
    pub async fn progression(&self) -> Result<Progression, ClientError> {
        let response = self.request(Method::GET, "/config").send().await?;
        let body: ConfigResponse = self.handle_response(response).await?;
        Ok(body.progression)
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self.request(Method::GET, "/health").send().await?;
        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(message),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        _ => ClientError::Server(format!("{}: {}", status, message)),
    }
}
