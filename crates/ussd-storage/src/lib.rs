//! USSD Storage crate - SQLite persistence for members, geography,
//! the session log and delivery callbacks.
//!
//! Provides a WAL-mode SQLite database with migrations, a seeded
//! administrative hierarchy, and repositories used by the engine's
//! collaborator implementations.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod seed;

pub use db::Database;
pub use repository::{
    CallbackRepository, GeographyRepository, InsertOutcome, MemberRepository,
    SessionLogRepository,
};
