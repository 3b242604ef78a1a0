//! In-memory session tracking.
//!
//! Sessions live only in process memory; a restart logs everyone out. The
//! browser holds a random UUID in an HttpOnly `sid` cookie, and the session
//! token doubles as the key for session-scoped puzzle state.

use axum::http::{self, HeaderMap};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Cookie name carrying the session token.
pub const SESSION_COOKIE: &str = "sid";

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// All live sessions, keyed by token.
#[derive(Debug, Default)]
pub struct SessionMap {
    entries: HashMap<String, Session>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh session for a user and return it. A user logging in
    /// twice gets two independent sessions.
    pub fn open(&mut self, username: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            created_at: now,
            last_activity: now,
        };
        self.entries.insert(session.token.clone(), session.clone());
        session
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.entries.get(token)
    }

    pub fn touch(&mut self, token: &str) {
        if let Some(session) = self.entries.get_mut(token) {
            session.last_activity = Utc::now();
        }
    }

    /// Close a session; returns the username it belonged to, if any.
    pub fn close(&mut self, token: &str) -> Option<String> {
        self.entries.remove(token).map(|s| s.username)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pull the session token out of a request's Cookie header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(http::header::COOKIE)?.to_str().ok()?;
    for pair in cookie_header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        if name == SESSION_COOKIE {
            let value = parts.next()?.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Set-Cookie value establishing a session.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

/// Set-Cookie value clearing the session cookie.
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
}
