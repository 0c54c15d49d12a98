//! SQL schema for the Roll SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision; there is no migration path between revisions.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    name        TEXT NOT NULL,
    days        TEXT NOT NULL,   -- JSON array of day names, never empty
    created_at  TEXT NOT NULL,
    updated_at  TEXT
);

-- One row per owner, subject and calendar date.
CREATE TABLE IF NOT EXISTS attendance (
    record_id   TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id),
    date        TEXT NOT NULL,   -- YYYY-MM-DD; string order is date order
    status      TEXT NOT NULL,   -- 'present' | 'absent' | 'late' | 'permission'
    origin      TEXT NOT NULL,   -- 'user' | 'auto'
    created_at  TEXT NOT NULL,
    updated_at  TEXT,
    UNIQUE (owner, subject_id, date)
);

-- Which alerts a subject has already raised.
CREATE TABLE IF NOT EXISTS alert_states (
    owner         TEXT NOT NULL,
    subject_id    TEXT NOT NULL REFERENCES subjects(subject_id),
    warning_sent  INTEGER NOT NULL DEFAULT 0,
    critical_sent INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner, subject_id)
);

-- Notifications outlive the subject that raised them.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    owner           TEXT NOT NULL,
    subject_id      TEXT,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    severity        TEXT NOT NULL,   -- 'warning' | 'critical'
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    owner         TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL,
    email         TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT
);

CREATE INDEX IF NOT EXISTS subjects_owner_idx        ON subjects(owner);
CREATE INDEX IF NOT EXISTS attendance_owner_date_idx ON attendance(owner, date);
CREATE INDEX IF NOT EXISTS notifications_owner_idx   ON notifications(owner, created_at);

PRAGMA user_version = 1;
";
