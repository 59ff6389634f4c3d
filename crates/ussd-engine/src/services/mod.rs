//! Collaborator traits consumed by the orchestrator.
//!
//! The engine never touches storage directly; it talks to these traits.
//! SQLite-backed implementations live in [`sqlite`], and [`cache`] adds
//! a TTL memo in front of any geography source.

pub mod cache;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ussd_core::types::{GeoLevel, GeoUnit, MemberRecord, NewMember, SessionLogEntry};

use crate::error::ServiceError;

pub use cache::CachedGeography;
pub use sqlite::{SqliteGeography, SqliteRegistry, SqliteSessionLog};

/// Creates members and answers status lookups.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Register an applicant and allocate a membership number.
    ///
    /// Re-submitting the same national ID from the same session returns
    /// the member created the first time.
    async fn register(&self, application: &NewMember) -> Result<MemberRecord, ServiceError>;

    async fn lookup(&self, membership_number: &str) -> Result<Option<MemberRecord>, ServiceError>;
}

/// Resolves the administrative hierarchy one level at a time.
#[async_trait]
pub trait GeographyService: Send + Sync {
    /// Units at `level` under `parent_id`, ordered by name.
    async fn children(
        &self,
        level: GeoLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<GeoUnit>, ServiceError>;
}

/// Append-only record of session summaries, used for abuse limits.
#[async_trait]
pub trait SessionLog: Send + Sync {
    async fn record(&self, entry: &SessionLogEntry) -> Result<(), ServiceError>;

    /// Distinct sessions a phone started since `since`.
    async fn sessions_started_since(
        &self,
        phone_number: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, ServiceError>;
}
