//! Data persistence layer.
//!
//! File-backed JSON storage for every durable record the board keeps:
//!
//! ```text
//! data/
//! ├── users/          ← one JSON file per account (Argon2id password hash)
//! ├── grades/         ← per-user grade rows
//! ├── assignments/    ← per-user upload records
//! ├── uploads/        ← uploaded file bodies, one directory per user
//! └── notices.json    ← notice board entries (seeded at init)
//! ```
//!
//! Writes go through an atomic write-then-rename guarded by an `fs2`
//! exclusive lock; reads are size-capped and parsed with
//! [`secure_json_parse`]. Usernames are validated before they name a file
//! and percent-encoded on the way to disk.
//!
//! Puzzle state is deliberately NOT stored here: it is session-scoped and
//! ephemeral (see `games::store`). The only game data that persists are the
//! two completion flags on the user record, and those are mutated solely
//! through [`Storage::mark_level_done`].

use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::warn;
use password_hash::{PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::games::{progress, Level};
use crate::validation::{safe_filename, secure_json_parse, validate_file_size, validate_user_name};

const USER_FILE_MAX_BYTES: u64 = 100_000;
const RECORD_FILE_MAX_BYTES: u64 = 1_000_000;

/// Main storage interface.
pub struct Storage {
    data_dir: String,
    argon2: Argon2<'static>,
}

/// A student account. `game1_done`/`game2_done` are the forward-only level
/// completion flags; they are never reset except by deleting the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub game1_done: bool,
    #[serde(default)]
    pub game2_done: bool,
    pub registered_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

fn default_role() -> String {
    "student".to_string()
}

/// One notice board entry. `idx` is the URL index; entries with
/// `is_public = false` are hidden from the listing but still reachable by
/// index, which is the point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub idx: u32,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
}

/// One grade row. Scores are "NP" or "P".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub subject: String,
    pub score: String,
    pub updated_at: DateTime<Utc>,
}

/// Record of one assignment upload. The file body lives under
/// `uploads/<user>/<stored_filename>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub original_filename: String,
    pub stored_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Aggregate counts for the `status` command.
#[derive(Debug, Clone, Default)]
pub struct BoardStatistics {
    pub total_users: u32,
    pub total_notices: u32,
    pub total_assignments: u32,
}

impl Storage {
    /// Initialize storage with the given data directory.
    pub async fn new(data_dir: &str) -> Result<Self> {
        Self::new_with_params(data_dir, None).await
    }

    /// Initialize storage with explicit Argon2 params.
    pub async fn new_with_params(data_dir: &str, params: Option<Params>) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| anyhow!("Failed to create data directory {}: {}", data_dir, e))?;
        for sub in ["users", "grades", "assignments", "uploads"] {
            fs::create_dir_all(Path::new(data_dir).join(sub)).await?;
        }
        let argon2 = match params {
            Some(p) => Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            None => Argon2::default(),
        };
        Ok(Storage {
            data_dir: data_dir.to_string(),
            argon2,
        })
    }

    /// Return the base data directory path used by this storage instance.
    pub fn base_dir(&self) -> &str {
        &self.data_dir
    }

    // ---- users ----

    fn user_path(&self, username: &str) -> PathBuf {
        Path::new(&self.data_dir)
            .join("users")
            .join(format!("{}.json", safe_filename(username)))
    }

    /// Register a new student account; fails if the name is taken or invalid.
    pub async fn register_user(&mut self, username: &str, password: &str) -> Result<User> {
        let validated = validate_user_name(username).map_err(|e| anyhow!("Invalid username: {}", e))?;

        if password.is_empty() {
            return Err(anyhow!("Password cannot be empty"));
        }
        if password.len() > 128 {
            return Err(anyhow!("Password too long"));
        }

        if self.get_user(&validated).await?.is_some() {
            return Err(anyhow!("Username '{}' is already taken", validated));
        }

        let now = Utc::now();
        let salt = password_hash::SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hash failure: {e}"))?;
        let user = User {
            username: validated,
            role: default_role(),
            password_hash: Some(hash.to_string()),
            game1_done: false,
            game2_done: false,
            registered_at: now,
            last_login: now,
        };
        self.save_user(&user).await?;
        Ok(user)
    }

    /// Verify user password; returns (user, match).
    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Option<User>, bool)> {
        if let Some(user) = self.get_user(username).await? {
            if let Some(stored) = &user.password_hash {
                let parsed = password_hash::PasswordHash::new(stored)
                    .map_err(|e| anyhow!("Corrupt password hash: {e}"))?;
                let ok = self
                    .argon2
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok();
                return Ok((Some(user), ok));
            }
            return Ok((Some(user), false));
        }
        Ok((None, false))
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let user_file = self.user_path(username);
        if !user_file.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&user_file).await?;
        validate_file_size(metadata.len(), USER_FILE_MAX_BYTES)
            .map_err(|e| anyhow!("User file too large: {}", e))?;

        let content = fs::read_to_string(user_file).await?;
        let user: User = secure_json_parse(&content, USER_FILE_MAX_BYTES as usize)
            .map_err(|e| anyhow!("Failed to parse user file: {}", e))?;
        Ok(Some(user))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let json_content = serde_json::to_string_pretty(user)?;
        write_file_locked(&self.user_path(&user.username), &json_content).await
    }

    /// Record a successful login.
    pub async fn touch_last_login(&mut self, username: &str) -> Result<User> {
        let mut user = self
            .get_user(username)
            .await?
            .ok_or_else(|| anyhow!("User not found"))?;
        user.last_login = Utc::now();
        self.save_user(&user).await?;
        Ok(user)
    }

    /// Set a level completion flag through the progress gate. Idempotent:
    /// re-marking a completed level touches nothing on disk.
    pub async fn mark_level_done(&mut self, username: &str, level: Level) -> Result<User> {
        let mut user = self
            .get_user(username)
            .await?
            .ok_or_else(|| anyhow!("User not found"))?;
        let newly_set = progress::mark_complete(&mut user, level)
            .map_err(|e| anyhow!("Cannot mark level: {}", e))?;
        if newly_set {
            self.save_user(&user).await?;
        }
        Ok(user)
    }

    // ---- notices ----

    fn notices_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("notices.json")
    }

    async fn load_notices(&self) -> Result<Vec<Notice>> {
        match fs::read_to_string(self.notices_path()).await {
            Ok(data) => {
                let notices: Vec<Notice> =
                    secure_json_parse(&data, RECORD_FILE_MAX_BYTES as usize)
                        .map_err(|e| anyhow!("Failed to parse notices.json: {}", e))?;
                Ok(notices)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow!("Failed reading notices.json: {}", e)),
        }
    }

    /// Seed the notice board once: the hidden staff notice at idx 0 and the
    /// public welcome at idx 1. A non-empty board is left alone.
    pub async fn seed_notices(&mut self) -> Result<()> {
        if !self.load_notices().await?.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let notices = vec![
            Notice {
                idx: 0,
                title: "Notice 0: Staff-only".to_string(),
                content: "Professors: please complete the games before requesting grade changes."
                    .to_string(),
                created_at: now,
                is_public: false,
            },
            Notice {
                idx: 1,
                title: "Welcome to Myongji CTF!".to_string(),
                content: "Good luck!".to_string(),
                created_at: now,
                is_public: true,
            },
        ];
        let content = serde_json::to_string_pretty(&notices)?;
        write_file_locked(&self.notices_path(), &content).await
    }

    /// Public notices, newest first, capped at `limit`.
    pub async fn public_notices(&self, limit: usize) -> Result<Vec<Notice>> {
        let mut notices: Vec<Notice> = self
            .load_notices()
            .await?
            .into_iter()
            .filter(|n| n.is_public)
            .collect();
        notices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notices.truncate(limit);
        Ok(notices)
    }

    /// Look up a notice by its URL index, hidden ones included.
    pub async fn notice_by_idx(&self, idx: u32) -> Result<Option<Notice>> {
        Ok(self.load_notices().await?.into_iter().find(|n| n.idx == idx))
    }

    // ---- grades ----

    fn grades_path(&self, username: &str) -> PathBuf {
        Path::new(&self.data_dir)
            .join("grades")
            .join(format!("{}.json", safe_filename(username)))
    }

    async fn load_grades(&self, username: &str) -> Result<Vec<Grade>> {
        match fs::read_to_string(self.grades_path(username)).await {
            Ok(data) => secure_json_parse(&data, RECORD_FILE_MAX_BYTES as usize)
                .map_err(|e| anyhow!("Failed to parse grades for {}: {}", username, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow!("Failed reading grades: {}", e)),
        }
    }

    async fn save_grades(&self, username: &str, grades: &[Grade]) -> Result<()> {
        let content = serde_json::to_string_pretty(grades)?;
        write_file_locked(&self.grades_path(username), &content).await
    }

    /// Append a grade row for a user.
    pub async fn add_grade(&mut self, username: &str, subject: &str, score: &str) -> Result<()> {
        let mut grades = self.load_grades(username).await?;
        grades.push(Grade {
            subject: subject.to_string(),
            score: score.to_string(),
            updated_at: Utc::now(),
        });
        self.save_grades(username, &grades).await
    }

    /// A user's grade rows, ordered by subject.
    pub async fn grades_for(&self, username: &str) -> Result<Vec<Grade>> {
        let mut grades = self.load_grades(username).await?;
        grades.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(grades)
    }

    /// Update the score of an existing grade row. Returns whether a row was
    /// actually changed.
    pub async fn set_grade_score(
        &mut self,
        username: &str,
        subject: &str,
        score: &str,
    ) -> Result<bool> {
        let mut grades = self.load_grades(username).await?;
        let mut changed = false;
        for grade in grades.iter_mut() {
            if grade.subject == subject && grade.score != score {
                grade.score = score.to_string();
                grade.updated_at = Utc::now();
                changed = true;
            }
        }
        if changed {
            self.save_grades(username, &grades).await?;
        }
        Ok(changed)
    }

    // ---- assignments ----

    fn assignments_path(&self, username: &str) -> PathBuf {
        Path::new(&self.data_dir)
            .join("assignments")
            .join(format!("{}.json", safe_filename(username)))
    }

    async fn load_assignments(&self, username: &str) -> Result<Vec<Assignment>> {
        match fs::read_to_string(self.assignments_path(username)).await {
            Ok(data) => secure_json_parse(&data, RECORD_FILE_MAX_BYTES as usize)
                .map_err(|e| anyhow!("Failed to parse assignments for {}: {}", username, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(anyhow!("Failed reading assignments: {}", e)),
        }
    }

    /// Record an upload for a user.
    pub async fn record_assignment(&mut self, username: &str, record: Assignment) -> Result<()> {
        let mut records = self.load_assignments(username).await?;
        records.push(record);
        let content = serde_json::to_string_pretty(&records)?;
        write_file_locked(&self.assignments_path(username), &content).await
    }

    /// A user's uploads, newest first.
    pub async fn assignments_for(&self, username: &str) -> Result<Vec<Assignment>> {
        let mut records = self.load_assignments(username).await?;
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(records)
    }

    /// Look up one of a user's uploads by record id.
    pub async fn assignment_by_id(&self, username: &str, id: &str) -> Result<Option<Assignment>> {
        Ok(self
            .load_assignments(username)
            .await?
            .into_iter()
            .find(|a| a.id == id))
    }

    /// Directory holding a user's uploaded file bodies, created on demand.
    pub async fn upload_dir_for(&self, username: &str) -> Result<PathBuf> {
        let dir = Path::new(&self.data_dir)
            .join("uploads")
            .join(safe_filename(username));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    // ---- statistics ----

    pub async fn statistics(&self) -> Result<BoardStatistics> {
        let mut stats = BoardStatistics {
            total_notices: self.load_notices().await?.len() as u32,
            ..Default::default()
        };

        let users_dir = Path::new(&self.data_dir).join("users");
        let mut entries = fs::read_dir(&users_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().map_or(false, |e| e == "json") {
                stats.total_users += 1;
            }
        }

        let assignments_dir = Path::new(&self.data_dir).join("assignments");
        let mut entries = fs::read_dir(&assignments_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                match fs::read_to_string(&path).await {
                    Ok(data) => {
                        let records: Vec<Assignment> =
                            secure_json_parse(&data, RECORD_FILE_MAX_BYTES as usize)
                                .unwrap_or_default();
                        stats.total_assignments += records.len() as u32;
                    }
                    Err(e) => warn!("Skipping unreadable assignment file {:?}: {}", path, e),
                }
            }
        }

        Ok(stats)
    }
}

/// Write content to a file atomically: take an exclusive lock on the
/// destination, write a unique temp file in the same directory, fsync, then
/// rename over the target.
async fn write_file_locked(path: &Path, content: &str) -> Result<()> {
    use std::fs::{File, OpenOptions};
    use std::io::Write;

    // fs2 has no async API; these are short local writes.
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("data.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
        }
    };

    std::fs::rename(&tmp_path, path)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    Ok(())
}
