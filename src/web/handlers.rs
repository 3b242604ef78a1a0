//! Request handlers.
//!
//! Browser-facing GET routes redirect to `/login` when unauthenticated; the
//! JSON API routes answer 401 instead. Handlers never hold two state locks at
//! once.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use uuid::Uuid;

use crate::games::{progress, puzzle, GameError, Level};
use crate::logutil::escape_log;
use crate::metrics;
use crate::storage::{Assignment, User};
use crate::validation::{has_allowed_extension, safe_upload_name};

use super::session::{clear_cookie, session_cookie, token_from_headers};
use super::AppState;

/// Grade row every student starts with; the upload trigger flips it to "P".
const CHAPEL_SUBJECT: &str = "채플";
const GRADE_TRIGGER: &str = "채플=P";

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Resolve the requesting user from the session cookie. Locks are taken one
/// at a time: sessions first, then storage.
async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<(String, User)> {
    let token = token_from_headers(headers)?;
    let username = {
        let sessions = state.sessions.read().await;
        sessions.get(&token)?.username.clone()
    };
    state.sessions.write().await.touch(&token);
    let user = state.storage.read().await.get_user(&username).await.ok()??;
    Some((token, user))
}

/// Auth guard for JSON API routes.
async fn require_api_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(String, User), Response> {
    current_user(state, headers)
        .await
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "login required"))
}

/// Auth guard for page routes; browsers get bounced to the login form.
async fn require_page_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(String, User), Response> {
    current_user(state, headers)
        .await
        .ok_or_else(|| Redirect::to("/login").into_response())
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Response {
    if creds.password.len() < 8 {
        return json_error(
            StatusCode::BAD_REQUEST,
            "password must be at least 8 characters",
        );
    }

    let mut storage = state.storage.write().await;
    let user = match storage.register_user(&creds.username, &creds.password).await {
        Ok(user) => user,
        Err(e) => {
            warn!(
                "Registration rejected for '{}': {}",
                escape_log(&creds.username),
                e
            );
            return json_error(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };
    // Everyone starts with the chapel requirement unfulfilled.
    if let Err(e) = storage.add_grade(&user.username, CHAPEL_SUBJECT, "NP").await {
        warn!("Failed to seed grade row for '{}': {}", user.username, e);
    }
    info!("Registered student '{}'", user.username);

    (
        StatusCode::CREATED,
        Json(json!({ "ok": true, "username": user.username })),
    )
        .into_response()
}

pub async fn login(State(state): State<AppState>, Json(creds): Json<Credentials>) -> Response {
    let verified = {
        let storage = state.storage.read().await;
        storage
            .verify_user_password(&creds.username, &creds.password)
            .await
    };
    let user = match verified {
        Ok((Some(user), true)) => user,
        Ok(_) => {
            warn!("Failed login for '{}'", escape_log(&creds.username));
            return json_error(StatusCode::UNAUTHORIZED, "invalid credentials");
        }
        Err(e) => {
            warn!("Login lookup error for '{}': {}", escape_log(&creds.username), e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };

    if let Err(e) = state.storage.write().await.touch_last_login(&user.username).await {
        warn!("Failed to record login time for '{}': {}", user.username, e);
    }
    let session = state.sessions.write().await.open(&user.username);
    info!("Student '{}' logged in", user.username);

    (
        [(header::SET_COOKIE, session_cookie(&session.token))],
        Json(json!({ "ok": true, "username": user.username })),
    )
        .into_response()
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        // Puzzle state is keyed by the session token and dies with it.
        state.puzzles.write().await.invalidate(&token);
        if let Some(username) = state.sessions.write().await.close(&token) {
            info!("Student '{}' logged out", username);
        }
    }
    (
        [(header::SET_COOKIE, clear_cookie())],
        Json(json!({ "ok": true })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct NoticeQuery {
    pub limit: Option<usize>,
}

pub async fn list_notices(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NoticeQuery>,
) -> Response {
    let (_token, _user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    // The board shows only the latest public notice by default; older and
    // hidden ones are reachable by index.
    let limit = query.limit.unwrap_or(1);
    match state.storage.read().await.public_notices(limit).await {
        Ok(notices) => Json(json!({ "notices": notices })).into_response(),
        Err(e) => {
            warn!("Failed to list notices: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

pub async fn notice_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(idx): Path<u32>,
) -> Response {
    let (_token, _user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    // Lookup is by index, not by visibility: hidden notices resolve too.
    match state.storage.read().await.notice_by_idx(idx).await {
        Ok(Some(notice)) => Json(notice).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "notice not found"),
        Err(e) => {
            warn!("Failed to load notice {}: {}", idx, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

pub async fn list_grades(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (_token, user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match state.storage.read().await.grades_for(&user.username).await {
        Ok(grades) => Json(json!({ "username": user.username, "grades": grades })).into_response(),
        Err(e) => {
            warn!("Failed to load grades for '{}': {}", user.username, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

pub async fn list_assignments(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (_token, user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    match state.storage.read().await.assignments_for(&user.username).await {
        Ok(records) => Json(json!({ "assignments": records })).into_response(),
        Err(e) => {
            warn!("Failed to list assignments for '{}': {}", user.username, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

pub async fn upload_assignment(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let (_token, user) = match require_api_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut description: Option<String> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload from '{}': {}", user.username, e);
                return json_error(StatusCode::BAD_REQUEST, "malformed multipart body");
            }
        };
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => file = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => {
                        warn!("Upload body read failed for '{}': {}", user.username, e);
                        return json_error(StatusCode::BAD_REQUEST, "upload too large or truncated");
                    }
                }
            }
            Some("description") => {
                description = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let (original, content_type, bytes) = match file {
        Some(f) => f,
        None => return json_error(StatusCode::BAD_REQUEST, "file required"),
    };
    if original.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "file required");
    }

    // Extension allow-list with an escape hatch: a file that fails it is
    // still accepted when the client declares application/pdf. The declared
    // type is never checked against the bytes.
    let allowed = &state.config.storage.allowed_extensions;
    if !has_allowed_extension(&original, allowed)
        && content_type.as_deref() != Some("application/pdf")
    {
        return json_error(StatusCode::BAD_REQUEST, "file type not allowed");
    }

    let safe_name = safe_upload_name(&original);
    let stored_filename = format!("{}_{}", Uuid::new_v4().simple(), safe_name);
    let upload_dir = match state.storage.read().await.upload_dir_for(&user.username).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Upload dir failure for '{}': {}", user.username, e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    if let Err(e) = fs::write(upload_dir.join(&stored_filename), &bytes).await {
        warn!("Failed to store upload for '{}': {}", user.username, e);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
    }

    let record = Assignment {
        id: Uuid::new_v4().to_string(),
        original_filename: original.clone(),
        stored_filename: stored_filename.clone(),
        description,
        uploaded_at: Utc::now(),
    };
    let record_id = record.id.clone();
    if let Err(e) = state
        .storage
        .write()
        .await
        .record_assignment(&user.username, record)
        .await
    {
        warn!("Failed to record upload for '{}': {}", user.username, e);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
    }
    info!(
        "Student '{}' uploaded '{}' as '{}'",
        user.username,
        escape_log(&original),
        stored_filename
    );

    let mut body = json!({
        "ok": true,
        "id": record_id,
        "stored_filename": stored_filename,
    });
    // The grading backdoor this exercise is built around: the stored bytes
    // are scanned for the override directive.
    if String::from_utf8_lossy(&bytes).contains(GRADE_TRIGGER) {
        let changed = state
            .storage
            .write()
            .await
            .set_grade_score(&user.username, CHAPEL_SUBJECT, "P")
            .await
            .unwrap_or(false);
        if changed {
            info!("Grade override triggered by '{}'", user.username);
        }
        body["message"] = json!(format!(
            "SYSTEM OVERRIDE DETECTED! FLAG: {}",
            state.config.games.flag
        ));
    }
    (StatusCode::CREATED, Json(body)).into_response()
}

pub async fn download_assignment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let (_token, user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let storage = state.storage.read().await;
    let record = match storage.assignment_by_id(&user.username, &id).await {
        Ok(Some(record)) => record,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "assignment not found"),
        Err(e) => {
            warn!("Assignment lookup failed for '{}': {}", user.username, e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    let dir = match storage.upload_dir_for(&user.username).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Upload dir failure for '{}': {}", user.username, e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
    };
    drop(storage);

    match fs::read(dir.join(&record.stored_filename)).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"{}\"",
                        safe_upload_name(&record.original_filename)
                    ),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => json_error(StatusCode::NOT_FOUND, "file missing"),
    }
}

/// Query parameters for `/games`. Everything arrives as a string and is
/// parsed leniently; garbage falls back to defaults rather than erroring.
#[derive(Debug, Default, Deserialize)]
pub struct GamesQuery {
    pub level: Option<String>,
    pub limit: Option<String>,
    pub reset: Option<String>,
}

pub async fn games_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GamesQuery>,
) -> Response {
    let (token, user) = match require_page_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let level_number = query
        .level
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(1);
    let level = match Level::from_number(level_number) {
        Ok(level) => level,
        Err(e) => return json_error(StatusCode::NOT_FOUND, &e.to_string()),
    };

    if !progress::can_enter(&user, level) {
        let back = progress::fallback(&user, level);
        return Redirect::to(&format!("/games?level={}", back.number())).into_response();
    }
    metrics::record_level_view(level.slug());

    match level {
        Level::Puzzle => {
            let limit = state
                .config
                .games
                .clamp_turn_limit(query.limit.as_deref().and_then(|s| s.parse::<i64>().ok()));
            let reset = query.reset.as_deref() == Some("1");
            let mut puzzles = state.puzzles.write().await;
            let puzzle = puzzles.get_or_create(&token, &user.username, limit, reset);
            Json(json!({
                "level": 1,
                "board": puzzle.board,
                "turns": puzzle.turns,
                "limit": puzzle.limit,
                "solved": puzzle.is_solved(),
                "locked": puzzle.is_locked(),
                "game1_done": user.game1_done,
            }))
            .into_response()
        }
        Level::Volume => Json(json!({
            "level": 2,
            "game1_done": user.game1_done,
            "game2_done": user.game2_done,
        }))
        .into_response(),
        Level::Hint => Json(json!({
            "level": 3,
            "cipher": state.config.games.final_hint,
        }))
        .into_response(),
    }
}

pub async fn puzzle_swap(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let (token, user) = match require_api_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let outcome = {
        let mut puzzles = state.puzzles.write().await;
        // State is resolved before the indices are looked at: a stateless
        // caller gets the same answer however malformed the body is.
        let puzzle = match puzzles.get_mut(&token, &user.username) {
            Some(puzzle) => puzzle,
            None => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &GameError::NoActiveState.to_string(),
                )
            }
        };
        let (a, b) = match (
            body.get("a").and_then(Value::as_i64),
            body.get("b").and_then(Value::as_i64),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return json_error(StatusCode::BAD_REQUEST, "bad indices"),
        };
        if a < 0 || b < 0 {
            return json_error(StatusCode::BAD_REQUEST, "out of range");
        }
        match puzzle::swap(puzzle, a as usize, b as usize) {
            Ok(outcome) => outcome,
            Err(GameError::InvalidIndex) => {
                return json_error(StatusCode::BAD_REQUEST, "out of range")
            }
            Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.to_string()),
        }
    };

    // On a fresh pass the completion flag is persisted BEFORE the session
    // state is dropped, so a crash between the two can only leave the user
    // with credit and a replayable puzzle, never the reverse.
    if outcome.passed && !user.game1_done {
        if let Err(e) = state
            .storage
            .write()
            .await
            .mark_level_done(&user.username, Level::Puzzle)
            .await
        {
            warn!("Failed to persist puzzle pass for '{}': {}", user.username, e);
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
        }
        state.puzzles.write().await.invalidate(&token);
        metrics::record_level_completion(Level::Puzzle.slug());
        info!("Student '{}' cleared the puzzle", user.username);
    }

    let mut response = json!({
        "board": outcome.board,
        "turns": outcome.turns,
        "limit": outcome.limit,
        "solved": outcome.solved,
        "passed": outcome.passed,
        "locked": outcome.locked,
    });
    // Every live response carries the follow-up link; only a locked board
    // withholds it.
    if !outcome.locked {
        response["next"] = json!("/games?level=2");
    }
    Json(response).into_response()
}

pub async fn volume_complete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (_token, user) = match require_api_user(&state, &headers).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    if !user.game1_done {
        return json_error(StatusCode::FORBIDDEN, "level1 required");
    }

    let was_done = user.game2_done;
    if let Err(e) = state
        .storage
        .write()
        .await
        .mark_level_done(&user.username, Level::Volume)
        .await
    {
        warn!("Failed to persist volume pass for '{}': {}", user.username, e);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error");
    }
    if !was_done {
        metrics::record_level_completion(Level::Volume.slug());
        info!("Student '{}' cleared the volume challenge", user.username);
    }
    Json(json!({ "ok": true, "next": "/games?level=3" })).into_response()
}
