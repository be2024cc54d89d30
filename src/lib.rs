//! Backend API for the StudyHall learning forum: votes, abuse reports, the
//! moderation queue, and community contributions, backed by Postgres.
//!
//! Counter-bearing operations (vote counters, contributor points) always run
//! inside a single transaction; handlers open it, services mutate through it,
//! and the commit is the last thing a handler does.

pub mod api;
pub mod app;
pub mod auth;
pub mod schema;
pub mod services;
pub mod utils;
