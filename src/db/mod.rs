mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::auth;
use crate::models::*;

/// A user row together with its stored password hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const USER_COLUMNS: &str = "id, email, username, is_public, current_day";

const SESSION_COLUMNS: &str = "id, day_number, duration, completed, actual_time, clear_percent,
     thought_count, mind_state_log, session_date, created_at";

const THOUGHT_COLUMNS: &str = "id, session_id, day_number, time_in_session, text";

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(crate::config::default_db_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // User operations
    // ============================================================

    /// Inserts a user. `email` must already be normalized.
    pub fn create_user(&self, email: &str, username: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, email, username, password_hash, is_public, current_day, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, 1, ?, ?)",
            (id.to_string(), email, username, password_hash, &now, &now),
        )?;

        Ok(User {
            id,
            email: email.to_string(),
            username: username.to_string(),
            is_public: false,
            current_day: 1,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let credentials = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"),
                [email],
                |row| {
                    Ok(UserCredentials {
                        user: user_from_row(row)?,
                        password_hash: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(credentials)
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM users WHERE email = ?", [email], |row| {
                row.get(0)
            })?;
        Ok(count > 0)
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?",
            [username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_settings(&self, id: Uuid, input: UpdateSettingsInput) -> Result<Option<User>> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            let now = Utc::now().to_rfc3339();

            let updated = match input.is_public {
                Some(is_public) => conn.execute(
                    "UPDATE users SET is_public = ?, updated_at = ? WHERE id = ?",
                    (is_public, &now, id.to_string()),
                )?,
                None => conn.execute(
                    "UPDATE users SET updated_at = ? WHERE id = ?",
                    (&now, id.to_string()),
                )?,
            };

            if updated == 0 {
                return Ok(None);
            }
        }

        self.get_user(id)
    }

    /// Public users with the furthest progress first.
    pub fn get_public_users(&self, limit: u32) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_public = 1
             ORDER BY current_day DESC, username ASC LIMIT ?"
        ))?;

        let users = stmt
            .query_map([limit], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    // ============================================================
    // Token operations
    // ============================================================

    /// Issues a token valid for [`auth::TOKEN_TTL_DAYS`]. Expired tokens of
    /// every user are swept on the way.
    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let token = auth::generate_token();
        let expires_at = (now + Duration::days(auth::TOKEN_TTL_DAYS)).timestamp();

        conn.execute(
            "DELETE FROM auth_tokens WHERE expires_at <= ?",
            [now.timestamp()],
        )?;
        conn.execute(
            "INSERT INTO auth_tokens (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
            (&token, user_id.to_string(), expires_at, now.to_rfc3339()),
        )?;

        Ok(token)
    }

    pub fn get_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT u.id, u.email, u.username, u.is_public, u.current_day
                 FROM auth_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.token = ? AND t.expires_at > ?",
                (token, Utc::now().timestamp()),
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn revoke_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let affected = conn.execute("DELETE FROM auth_tokens WHERE token = ?", [token])?;
        Ok(affected > 0)
    }

    // ============================================================
    // Session operations
    // ============================================================

    /// Stores an attempt and, if it was completed, moves the user on to the
    /// next day. Both writes share one transaction.
    pub fn create_session(&self, user_id: Uuid, input: CreateSessionInput) -> Result<Session> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let actual_time = input.actual_time.or(Some(input.duration));

        tx.execute(
            "INSERT INTO sessions (id, user_id, day_number, duration, completed, actual_time,
                 clear_percent, thought_count, mind_state_log, session_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                input.day_number,
                input.duration,
                input.completed,
                actual_time,
                input.clear_percent,
                input.thought_count,
                serde_json::to_string(&input.mind_state_log)?,
                input.session_date.to_string(),
                now.to_rfc3339(),
            ),
        )?;

        if input.completed {
            tx.execute(
                "UPDATE users SET current_day = current_day + 1, updated_at = ? WHERE id = ?",
                (now.to_rfc3339(), user_id.to_string()),
            )?;
        }

        tx.commit()?;

        Ok(Session {
            id,
            day_number: input.day_number,
            duration: input.duration,
            completed: input.completed,
            actual_time,
            clear_percent: input.clear_percent,
            thought_count: input.thought_count,
            mind_state_log: input.mind_state_log,
            session_date: input.session_date,
            created_at: now,
        })
    }

    /// All attempts by a user, highest day first, newest attempt first
    /// within a day.
    pub fn get_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?
             ORDER BY day_number DESC, rowid DESC"
        ))?;

        let sessions = stmt
            .query_map([user_id.to_string()], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// The most recent attempt at a day.
    pub fn get_session_by_day(&self, user_id: Uuid, day_number: u32) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let session = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? AND day_number = ?
                     ORDER BY rowid DESC LIMIT 1"
                ),
                (user_id.to_string(), day_number),
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// A session, only if it belongs to `user_id`.
    pub fn get_session(&self, user_id: Uuid, id: Uuid) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ? AND user_id = ?"),
                (id.to_string(), user_id.to_string()),
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    // ============================================================
    // Thought operations
    // ============================================================

    pub fn create_thoughts(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        day_number: u32,
        thoughts: Vec<NewThought>,
    ) -> Result<Vec<Thought>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut created = Vec::with_capacity(thoughts.len());
        for thought in thoughts {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO thoughts (id, user_id, session_id, day_number, time_in_session, text, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    user_id.to_string(),
                    session_id.to_string(),
                    day_number,
                    thought.time_in_session,
                    &thought.text,
                    &now,
                ),
            )?;

            created.push(Thought {
                id,
                session_id,
                day_number,
                time_in_session: thought.time_in_session,
                text: thought.text,
            });
        }

        tx.commit()?;
        Ok(created)
    }

    /// Every thought a user has recorded, latest day first and in session
    /// order within a day. Notes (`-1`) sort first within their day.
    pub fn get_thoughts(&self, user_id: Uuid) -> Result<Vec<Thought>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {THOUGHT_COLUMNS} FROM thoughts WHERE user_id = ?
             ORDER BY day_number DESC, time_in_session ASC, rowid ASC"
        ))?;

        let thoughts = stmt
            .query_map([user_id.to_string()], thought_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(thoughts)
    }

    pub fn get_session_thoughts(&self, session_id: Uuid) -> Result<Vec<Thought>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {THOUGHT_COLUMNS} FROM thoughts WHERE session_id = ?
             ORDER BY time_in_session ASC, rowid ASC"
        ))?;

        let thoughts = stmt
            .query_map([session_id.to_string()], thought_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(thoughts)
    }
}

/// The `table.column` named by a UNIQUE constraint failure, if that is
/// what `err` is.
pub fn unique_violation(err: &anyhow::Error) -> Option<&str> {
    match err.downcast_ref::<rusqlite::Error>()? {
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            message.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get::<_, String>(0)?),
        email: row.get(1)?,
        username: row.get(2)?,
        is_public: row.get(3)?,
        current_day: row.get(4)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let log_json: String = row.get(7)?;
    Ok(Session {
        id: parse_uuid(row.get::<_, String>(0)?),
        day_number: row.get(1)?,
        duration: row.get(2)?,
        completed: row.get(3)?,
        actual_time: row.get(4)?,
        clear_percent: row.get(5)?,
        thought_count: row.get(6)?,
        mind_state_log: serde_json::from_str(&log_json).unwrap_or_default(),
        session_date: parse_date(row.get::<_, String>(8)?),
        created_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn thought_from_row(row: &Row<'_>) -> rusqlite::Result<Thought> {
    Ok(Thought {
        id: parse_uuid(row.get::<_, String>(0)?),
        session_id: parse_uuid(row.get::<_, String>(1)?),
        day_number: row.get(2)?,
        time_in_session: row.get(3)?,
        text: row.get(4)?,
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(s: String) -> NaiveDate {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_falls_back_on_garbage() {
        assert_eq!(
            parse_date("2024-02-29".into()),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(parse_date("nope".into()), Utc::now().date_naive());
    }

    #[test]
    fn test_parse_uuid_nil_on_garbage() {
        assert_eq!(parse_uuid("not-a-uuid".into()), Uuid::nil());
    }
}
