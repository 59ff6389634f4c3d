//! Database schema migrations.
//!
//! Version 1 creates the geography hierarchy, members, the append-only
//! session log and the delivery-callback inbox. Version 2 seeds the
//! administrative hierarchy. Version 3 records the caller's mobile
//! operator on each member.

use rusqlite::Connection;
use tracing::info;

use ussd_core::error::UssdError;

use crate::seed;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), UssdError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| UssdError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| UssdError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        record(conn, 1, "initial_schema")?;
        info!("Applied migration v1: initial_schema");
    }

    if current_version < 2 {
        seed::seed_geography(conn)?;
        record(conn, 2, "seed_geography")?;
        info!("Applied migration v2: seed_geography");
    }

    if current_version < 3 {
        conn.execute_batch("ALTER TABLE members ADD COLUMN operator TEXT;")
            .map_err(|e| UssdError::Storage(format!("Migration v3 failed: {}", e)))?;
        record(conn, 3, "member_operator")?;
        info!("Applied migration v3: member_operator");
    }

    Ok(())
}

fn record(conn: &Connection, version: i64, name: &str) -> Result<(), UssdError> {
    conn.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )
    .map_err(|e| UssdError::Storage(format!("Failed to record migration v{}: {}", version, e)))?;
    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), UssdError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS provinces (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS districts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            province_id INTEGER NOT NULL REFERENCES provinces(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            UNIQUE (province_id, name)
        );

        CREATE TABLE IF NOT EXISTS constituencies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            district_id INTEGER NOT NULL REFERENCES districts(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            UNIQUE (district_id, name)
        );

        CREATE TABLE IF NOT EXISTS wards (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            constituency_id INTEGER NOT NULL REFERENCES constituencies(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            UNIQUE (constituency_id, name)
        );

        CREATE TABLE IF NOT EXISTS members (
            membership_number    TEXT PRIMARY KEY NOT NULL,
            first_name           TEXT NOT NULL,
            last_name            TEXT NOT NULL,
            national_id          TEXT NOT NULL UNIQUE,
            date_of_birth        TEXT NOT NULL,
            phone_number         TEXT NOT NULL,
            language             TEXT NOT NULL DEFAULT 'en',
            status               TEXT NOT NULL DEFAULT 'pending'
                                 CHECK (status IN ('pending', 'active', 'suspended', 'expired')),
            province             TEXT,
            district             TEXT,
            constituency         TEXT,
            ward                 TEXT,
            ward_id              INTEGER REFERENCES wards(id),
            registration_channel TEXT NOT NULL DEFAULT 'ussd',
            session_id           TEXT NOT NULL,
            registered_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_members_phone
            ON members (phone_number);

        CREATE TABLE IF NOT EXISTS session_log (
            id                TEXT PRIMARY KEY NOT NULL,
            session_id        TEXT NOT NULL,
            phone_number      TEXT NOT NULL,
            event             TEXT NOT NULL
                              CHECK (event IN ('started', 'finished', 'refused')),
            node              TEXT NOT NULL,
            outcome           TEXT NOT NULL,
            membership_number TEXT,
            at                INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_session_log_phone
            ON session_log (phone_number, event, at DESC);

        CREATE INDEX IF NOT EXISTS idx_session_log_session
            ON session_log (session_id, at ASC);

        CREATE TABLE IF NOT EXISTS delivery_callbacks (
            id          TEXT PRIMARY KEY NOT NULL,
            status      TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            message     TEXT,
            member_id   TEXT,
            received_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_delivery_callbacks_session
            ON delivery_callbacks (session_id);
        ",
    )
    .map_err(|e| UssdError::Storage(format!("Failed to apply v1 schema: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 3);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[test]
    fn test_member_status_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO members (membership_number, first_name, last_name, national_id,
                                  date_of_birth, phone_number, status, session_id, registered_at)
             VALUES ('PM1', 'A', 'B', '1', '1990-01-01', '260971234567', 'bogus', 's', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
