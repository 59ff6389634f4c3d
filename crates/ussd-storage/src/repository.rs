//! Repository implementations for SQLite-backed persistence.
//!
//! Provides MemberRepository, GeographyRepository, SessionLogRepository
//! and CallbackRepository operating on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use ussd_core::error::UssdError;
use ussd_core::types::{
    DeliveryNotice, GeoLevel, GeoUnit, Language, MemberRecord, MembershipStatus, SessionEvent,
    SessionLogEntry,
};

use crate::db::Database;

fn storage_err(e: rusqlite::Error) -> UssdError {
    UssdError::Storage(e.to_string())
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

// =============================================================================
// Members
// =============================================================================

/// Result of a member insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another member already holds the national ID.
    NationalIdTaken,
    /// The generated membership number collided; retry with a new one.
    NumberTaken,
}

const MEMBER_COLUMNS: &str = "membership_number, first_name, last_name, national_id, date_of_birth,
     phone_number, language, status, province, district, constituency, ward,
     session_id, registered_at, operator";

/// Repository for registered members.
pub struct MemberRepository {
    db: Arc<Database>,
}

impl MemberRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a member unless the national ID or membership number is taken.
    ///
    /// Both checks and the insert run under the same connection lock.
    pub fn insert(
        &self,
        member: &MemberRecord,
        ward_id: Option<i64>,
    ) -> Result<InsertOutcome, UssdError> {
        self.db.with_conn(|conn| {
            let id_taken: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM members WHERE national_id = ?1)",
                    rusqlite::params![member.national_id],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            if id_taken {
                return Ok(InsertOutcome::NationalIdTaken);
            }

            let number_taken: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM members WHERE membership_number = ?1)",
                    rusqlite::params![member.membership_number],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            if number_taken {
                return Ok(InsertOutcome::NumberTaken);
            }

            conn.execute(
                "INSERT INTO members (membership_number, first_name, last_name, national_id,
                                      date_of_birth, phone_number, language, status, province,
                                      district, constituency, ward, ward_id, session_id,
                                      registered_at, operator)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                rusqlite::params![
                    member.membership_number,
                    member.first_name,
                    member.last_name,
                    member.national_id,
                    member.date_of_birth.format("%Y-%m-%d").to_string(),
                    member.phone_number,
                    member.language.code(),
                    member.status.to_string(),
                    member.province,
                    member.district,
                    member.constituency,
                    member.ward,
                    ward_id,
                    member.session_id,
                    member.registered_at.timestamp(),
                    member.operator,
                ],
            )
            .map_err(|e| UssdError::Storage(format!("Failed to save member: {}", e)))?;
            Ok(InsertOutcome::Inserted)
        })
    }

    pub fn find_by_national_id(&self, national_id: &str) -> Result<Option<MemberRecord>, UssdError> {
        self.find_one("national_id", national_id)
    }

    pub fn find_by_membership_number(
        &self,
        membership_number: &str,
    ) -> Result<Option<MemberRecord>, UssdError> {
        self.find_one("membership_number", membership_number)
    }

    /// Members registered from a phone, newest first.
    pub fn find_by_phone(&self, phone_number: &str) -> Result<Vec<MemberRecord>, UssdError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM members WHERE phone_number = ?1 ORDER BY registered_at DESC",
                    MEMBER_COLUMNS
                ))
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params![phone_number], |row| Ok(row_to_member(row)))
                .map_err(storage_err)?;

            let mut members = Vec::new();
            for row in rows {
                members.push(row.map_err(storage_err)??);
            }
            Ok(members)
        })
    }

    pub fn set_status(
        &self,
        membership_number: &str,
        status: MembershipStatus,
    ) -> Result<bool, UssdError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE members SET status = ?1 WHERE membership_number = ?2",
                    rusqlite::params![status.to_string(), membership_number],
                )
                .map_err(storage_err)?;
            Ok(changed > 0)
        })
    }

    pub fn count(&self) -> Result<u64, UssdError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))
                .map_err(storage_err)?;
            Ok(n as u64)
        })
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<MemberRecord>, UssdError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    &format!("SELECT {} FROM members WHERE {} = ?1", MEMBER_COLUMNS, column),
                    rusqlite::params![value],
                    |row| Ok(row_to_member(row)),
                )
                .optional()
                .map_err(storage_err)?;

            match result {
                Some(member) => Ok(Some(member?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_member(row: &Row<'_>) -> Result<MemberRecord, UssdError> {
    let dob: String = row.get(4).map_err(storage_err)?;
    let language: String = row.get(6).map_err(storage_err)?;
    let status: String = row.get(7).map_err(storage_err)?;
    let registered_at: i64 = row.get(13).map_err(storage_err)?;

    Ok(MemberRecord {
        membership_number: row.get(0).map_err(storage_err)?,
        first_name: row.get(1).map_err(storage_err)?,
        last_name: row.get(2).map_err(storage_err)?,
        national_id: row.get(3).map_err(storage_err)?,
        date_of_birth: NaiveDate::parse_from_str(&dob, "%Y-%m-%d")
            .map_err(|e| UssdError::Storage(format!("Bad date_of_birth '{}': {}", dob, e)))?,
        phone_number: row.get(5).map_err(storage_err)?,
        language: language.parse::<Language>().map_err(UssdError::Storage)?,
        status: status.parse::<MembershipStatus>().map_err(UssdError::Storage)?,
        province: row.get(8).map_err(storage_err)?,
        district: row.get(9).map_err(storage_err)?,
        constituency: row.get(10).map_err(storage_err)?,
        ward: row.get(11).map_err(storage_err)?,
        session_id: row.get(12).map_err(storage_err)?,
        registered_at: timestamp(registered_at),
        operator: row.get(14).map_err(storage_err)?,
    })
}

// =============================================================================
// Geography
// =============================================================================

/// Table, parent column, and parent level for each hierarchy level.
fn geo_table(level: GeoLevel) -> (&'static str, Option<&'static str>) {
    match level {
        GeoLevel::Province => ("provinces", None),
        GeoLevel::District => ("districts", Some("province_id")),
        GeoLevel::Constituency => ("constituencies", Some("district_id")),
        GeoLevel::Ward => ("wards", Some("constituency_id")),
    }
}

/// Read access to the administrative hierarchy, plus inserts for operators.
pub struct GeographyRepository {
    db: Arc<Database>,
}

impl GeographyRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Units at `level` under `parent_id`, ordered by name.
    ///
    /// Provinces ignore `parent_id`; every other level requires it and
    /// yields an empty list without one.
    pub fn children(&self, level: GeoLevel, parent_id: Option<i64>) -> Result<Vec<GeoUnit>, UssdError> {
        let (table, parent_col) = geo_table(level);
        self.db.with_conn(|conn| {
            let (sql, params): (String, Vec<i64>) = match (parent_col, parent_id) {
                (None, _) => (format!("SELECT id, name, NULL FROM {} ORDER BY name", table), vec![]),
                (Some(col), Some(pid)) => (
                    format!(
                        "SELECT id, name, {col} FROM {table} WHERE {col} = ?1 ORDER BY name",
                        col = col,
                        table = table
                    ),
                    vec![pid],
                ),
                (Some(_), None) => return Ok(Vec::new()),
            };

            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok(GeoUnit {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        level,
                        parent_id: row.get(2)?,
                    })
                })
                .map_err(storage_err)?;

            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }

    /// Insert a unit, returning its id. Existing units are returned as-is.
    pub fn add_unit(
        &self,
        level: GeoLevel,
        parent_id: Option<i64>,
        name: &str,
    ) -> Result<i64, UssdError> {
        let (table, parent_col) = geo_table(level);
        self.db.with_conn(|conn| {
            match (parent_col, parent_id) {
                (None, _) => {
                    conn.execute(
                        &format!("INSERT OR IGNORE INTO {} (name) VALUES (?1)", table),
                        rusqlite::params![name],
                    )
                    .map_err(storage_err)?;
                    conn.query_row(
                        &format!("SELECT id FROM {} WHERE name = ?1", table),
                        rusqlite::params![name],
                        |row| row.get(0),
                    )
                    .map_err(storage_err)
                }
                (Some(col), Some(pid)) => {
                    conn.execute(
                        &format!("INSERT OR IGNORE INTO {} ({}, name) VALUES (?1, ?2)", table, col),
                        rusqlite::params![pid, name],
                    )
                    .map_err(storage_err)?;
                    conn.query_row(
                        &format!("SELECT id FROM {} WHERE {} = ?1 AND name = ?2", table, col),
                        rusqlite::params![pid, name],
                        |row| row.get(0),
                    )
                    .map_err(storage_err)
                }
                (Some(_), None) => Err(UssdError::Storage(format!(
                    "A {} needs a parent unit",
                    level
                ))),
            }
        })
    }
}

// =============================================================================
// Session log
// =============================================================================

/// Append-only log of session summaries.
pub struct SessionLogRepository {
    db: Arc<Database>,
}

impl SessionLogRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn append(&self, entry: &SessionLogEntry) -> Result<(), UssdError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_log (id, session_id, phone_number, event, node, outcome,
                                          membership_number, at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    entry.session_id,
                    entry.phone_number,
                    entry.event.to_string(),
                    entry.node,
                    entry.outcome,
                    entry.membership_number,
                    entry.at.timestamp(),
                ],
            )
            .map_err(|e| UssdError::Storage(format!("Failed to append session log: {}", e)))?;
            Ok(())
        })
    }

    /// Number of distinct sessions with `event` for a phone since `since`.
    pub fn count_sessions_since(
        &self,
        phone_number: &str,
        event: SessionEvent,
        since: DateTime<Utc>,
    ) -> Result<u32, UssdError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(DISTINCT session_id) FROM session_log
                     WHERE phone_number = ?1 AND event = ?2 AND at >= ?3",
                    rusqlite::params![phone_number, event.to_string(), since.timestamp()],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            Ok(n as u32)
        })
    }

    /// Entries for one session, oldest first.
    pub fn for_session(&self, session_id: &str) -> Result<Vec<SessionLogEntry>, UssdError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, phone_number, event, node, outcome, membership_number, at
                     FROM session_log WHERE session_id = ?1 ORDER BY at ASC, rowid ASC",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params![session_id], |row| {
                    let event: String = row.get(2)?;
                    let at: i64 = row.get(6)?;
                    Ok((
                        SessionLogEntry {
                            session_id: row.get(0)?,
                            phone_number: row.get(1)?,
                            event: SessionEvent::Started,
                            node: row.get(3)?,
                            outcome: row.get(4)?,
                            membership_number: row.get(5)?,
                            at: timestamp(at),
                        },
                        event,
                    ))
                })
                .map_err(storage_err)?;

            let mut entries = Vec::new();
            for row in rows {
                let (mut entry, event) = row.map_err(storage_err)?;
                entry.event = event.parse().map_err(UssdError::Storage)?;
                entries.push(entry);
            }
            Ok(entries)
        })
    }
}

// =============================================================================
// Delivery callbacks
// =============================================================================

/// Inbox for out-of-band delivery notifications.
pub struct CallbackRepository {
    db: Arc<Database>,
}

impl CallbackRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn save(&self, notice: &DeliveryNotice) -> Result<(), UssdError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO delivery_callbacks (id, status, session_id, message, member_id, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    notice.status,
                    notice.session_id,
                    notice.message,
                    notice.member_id,
                    notice.received_at.timestamp(),
                ],
            )
            .map_err(|e| UssdError::Storage(format!("Failed to save callback: {}", e)))?;
            Ok(())
        })
    }

    pub fn for_session(&self, session_id: &str) -> Result<Vec<DeliveryNotice>, UssdError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT status, session_id, message, member_id, received_at
                     FROM delivery_callbacks WHERE session_id = ?1 ORDER BY received_at ASC",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params![session_id], |row| {
                    let received_at: i64 = row.get(4)?;
                    Ok(DeliveryNotice {
                        status: row.get(0)?,
                        session_id: row.get(1)?,
                        message: row.get(2)?,
                        member_id: row.get(3)?,
                        received_at: timestamp(received_at),
                    })
                })
                .map_err(storage_err)?;

            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }
}
