//! Collaborators backed by the SQLite repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use ussd_core::types::{
    GeoLevel, GeoUnit, MemberRecord, MembershipStatus, NewMember, SessionEvent, SessionLogEntry,
};
use ussd_storage::{
    Database, GeographyRepository, InsertOutcome, MemberRepository, SessionLogRepository,
};

use super::{GeographyService, RegistrationService, SessionLog};
use crate::error::ServiceError;

/// Attempts at drawing an unused membership number before giving up.
const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// Registration service writing to the `members` table.
pub struct SqliteRegistry {
    members: MemberRepository,
    prefix: String,
}

impl SqliteRegistry {
    pub fn new(db: Arc<Database>, prefix: impl Into<String>) -> Self {
        Self {
            members: MemberRepository::new(db),
            prefix: prefix.into(),
        }
    }

    /// `prefix` followed by 8 random digits.
    fn allocate_number(&self) -> String {
        let n: u32 = rand::rng().random_range(0..100_000_000);
        format!("{}{:08}", self.prefix, n)
    }

    /// Existing holder of a national ID: the same member for a resubmit
    /// from the same session, a conflict otherwise.
    fn resolve_existing(
        &self,
        application: &NewMember,
        existing: MemberRecord,
    ) -> Result<MemberRecord, ServiceError> {
        if existing.session_id == application.session_id {
            info!(
                session_id = %application.session_id,
                membership_number = %existing.membership_number,
                "Repeated submission returns existing member"
            );
            Ok(existing)
        } else {
            Err(ServiceError::Duplicate {
                membership_number: existing.membership_number,
            })
        }
    }
}

#[async_trait]
impl RegistrationService for SqliteRegistry {
    async fn register(&self, application: &NewMember) -> Result<MemberRecord, ServiceError> {
        if application.first_name.is_empty() || application.national_id.is_empty() {
            return Err(ServiceError::InvalidApplication(
                "name and national ID are required".to_string(),
            ));
        }

        if let Some(existing) = self.members.find_by_national_id(&application.national_id)? {
            return self.resolve_existing(application, existing);
        }

        let name_at = |level| application.unit(level).map(|u: &GeoUnit| u.name.clone());
        let ward_id = application.unit(GeoLevel::Ward).map(|u| u.id);

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let record = MemberRecord {
                membership_number: self.allocate_number(),
                first_name: application.first_name.clone(),
                last_name: application.last_name.clone(),
                national_id: application.national_id.clone(),
                date_of_birth: application.date_of_birth,
                phone_number: application.phone_number.clone(),
                language: application.language,
                operator: application.operator.clone(),
                status: MembershipStatus::Pending,
                province: name_at(GeoLevel::Province),
                district: name_at(GeoLevel::District),
                constituency: name_at(GeoLevel::Constituency),
                ward: name_at(GeoLevel::Ward),
                session_id: application.session_id.clone(),
                registered_at: Utc::now(),
            };

            match self.members.insert(&record, ward_id)? {
                InsertOutcome::Inserted => {
                    info!(
                        session_id = %record.session_id,
                        membership_number = %record.membership_number,
                        "Member registered"
                    );
                    return Ok(record);
                }
                InsertOutcome::NumberTaken => {
                    warn!(number = %record.membership_number, "Membership number collision");
                }
                InsertOutcome::NationalIdTaken => {
                    // Lost a race with a concurrent submission.
                    return match self.members.find_by_national_id(&application.national_id)? {
                        Some(existing) => self.resolve_existing(application, existing),
                        None => Err(ServiceError::Unavailable(
                            "national ID conflict without a stored member".to_string(),
                        )),
                    };
                }
            }
        }

        Err(ServiceError::Unavailable(
            "could not allocate a membership number".to_string(),
        ))
    }

    async fn lookup(&self, membership_number: &str) -> Result<Option<MemberRecord>, ServiceError> {
        Ok(self.members.find_by_membership_number(membership_number)?)
    }
}

/// Geography service reading the seeded hierarchy tables.
pub struct SqliteGeography {
    repo: GeographyRepository,
}

impl SqliteGeography {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            repo: GeographyRepository::new(db),
        }
    }
}

#[async_trait]
impl GeographyService for SqliteGeography {
    async fn children(
        &self,
        level: GeoLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<GeoUnit>, ServiceError> {
        Ok(self.repo.children(level, parent_id)?)
    }
}

/// Session log in the `session_log` table.
pub struct SqliteSessionLog {
    repo: SessionLogRepository,
}

impl SqliteSessionLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            repo: SessionLogRepository::new(db),
        }
    }
}

#[async_trait]
impl SessionLog for SqliteSessionLog {
    async fn record(&self, entry: &SessionLogEntry) -> Result<(), ServiceError> {
        Ok(self.repo.append(entry)?)
    }

    async fn sessions_started_since(
        &self,
        phone_number: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, ServiceError> {
        Ok(self
            .repo
            .count_sessions_since(phone_number, SessionEvent::Started, since)?)
    }
}
