//! Input validation and filesystem safety helpers.
//!
//! Everything a request can influence - usernames, upload filenames, file
//! sizes, stored JSON - is validated here before it touches the data
//! directory. The one check that is deliberately weak (the upload
//! content-type bypass) lives in the web layer, not here; these helpers are
//! the honest ones.

use std::collections::HashSet;

/// Username validation errors with user-facing messages.
#[derive(Debug, thiserror::Error)]
pub enum UsernameError {
    #[error("Username is too short (minimum 2 characters)")]
    TooShort,

    #[error("Username is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains invalid characters")]
    InvalidCharacters,

    #[error("Username contains path separators")]
    PathTraversal,

    #[error("Username is a reserved system name")]
    Reserved,
}

/// Security-relevant validation failures for stored data.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("File size exceeds limit ({limit} bytes)")]
    FileSizeExceeded { limit: usize },

    #[error("Invalid format")]
    InvalidFormat,
}

const USERNAME_MIN: usize = 2;
const USERNAME_MAX: usize = 50;

fn reserved_names() -> HashSet<&'static str> {
    [
        "admin",
        "administrator",
        "root",
        "system",
        "staff",
        "professor",
        "guest",
        "anonymous",
        "login",
        "logout",
        "register",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a student account name. Allows ASCII alphanumerics plus `_`, `-`
/// and `.`; rejects reserved names and anything filesystem-hostile.
pub fn validate_user_name(username: &str) -> Result<String, UsernameError> {
    let trimmed = username.trim();

    if trimmed.len() < USERNAME_MIN {
        return Err(UsernameError::TooShort);
    }
    if trimmed.len() > USERNAME_MAX {
        return Err(UsernameError::TooLong { max: USERNAME_MAX });
    }
    if trimmed != username {
        return Err(UsernameError::InvalidWhitespace);
    }
    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(UsernameError::Reserved);
    }
    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(UsernameError::PathTraversal);
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(UsernameError::InvalidCharacters);
    }

    Ok(trimmed.to_string())
}

/// Generate a safe per-user filename via percent-encoding. Usernames are
/// already restricted, but record files are named defensively regardless.
pub fn safe_filename(username: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(username, NON_ALPHANUMERIC).to_string()
}

/// Flatten an uploaded filename to a single safe path component: path
/// segments are dropped, disallowed characters become `_`, and leading dots
/// are stripped so a stored name can never be hidden or traverse.
pub fn safe_upload_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Lower-cased extension of a filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Extension allow-list check for assignment uploads.
pub fn has_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    match file_extension(filename) {
        Some(ext) => allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Validate file size before reading or accepting it.
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), SecurityError> {
    if size > max_size {
        return Err(SecurityError::FileSizeExceeded {
            limit: max_size as usize,
        });
    }
    Ok(())
}

/// Parse JSON with a size cap. Leading NUL bytes from an interrupted write
/// are stripped before parsing; valid JSON cannot start with a NUL.
pub fn secure_json_parse<T>(content: &str, max_bytes: usize) -> Result<T, SecurityError>
where
    T: serde::de::DeserializeOwned,
{
    if content.len() > max_bytes {
        return Err(SecurityError::FileSizeExceeded { limit: max_bytes });
    }
    let normalized = content.trim_start_matches('\0');
    serde_json::from_str(normalized).map_err(|_| SecurityError::InvalidFormat)
}
