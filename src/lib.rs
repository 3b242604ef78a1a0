//! # Ctfboard - Campus CTF Training Board
//!
//! Ctfboard is a deliberately vulnerable campus portal used for CTF training.
//! It serves a JSON API for a small student board: notices, grades,
//! assignment uploads, and a three-level game gauntlet that gates the final
//! hint behind two completions.
//!
//! ## Features
//!
//! - **Swap Puzzle**: Turn-limited 5x5 tile puzzle with session-scoped state
//!   and idempotent post-solve polling.
//! - **Progress Gate**: Forward-only level unlocks persisted on the user
//!   record; completion flags are never revoked.
//! - **Assignment Uploads**: Extension allow-list with a planted
//!   content-type bypass and a grade-override trigger in the file body.
//! - **Security**: Argon2id password hashing, input validation, path-safe
//!   storage naming, sanitized logging. The vulnerabilities that remain are
//!   the curriculum, not accidents.
//! - **Async Design**: Tokio + axum throughout, file-backed JSON storage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ctfboard::config::Config;
//! use ctfboard::web::{self, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let state = AppState::new(config).await?;
//!     web::serve(state).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`web`] - HTTP routes, handlers, and session tracking
//! - [`games`] - Puzzle engine, puzzle store, and the progress gate
//! - [`storage`] - User, grade, notice, and assignment persistence
//! - [`config`] - Configuration management
//! - [`validation`] - Input validation and sanitization utilities

pub mod config;
pub mod games;
pub mod logutil;
pub mod metrics;
pub mod storage;
pub mod validation;
pub mod web;
