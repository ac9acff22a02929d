//! SQL schema for the Lapse SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS courses (
    course_id       TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    validity_months INTEGER,          -- NULL for one-off courses
    CHECK (validity_months IS NULL OR validity_months > 0)
);

-- One row per (staff, course, location) association.
-- Status and both dates are only ever written together.
CREATE TABLE IF NOT EXISTS records (
    record_id       TEXT PRIMARY KEY,
    staff_id        TEXT NOT NULL,
    course_id       TEXT NOT NULL REFERENCES courses(course_id),
    location_id     TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'not_applicable',
    completion_date TEXT,             -- YYYY-MM-DD or NULL
    expiry_date     TEXT,             -- YYYY-MM-DD or NULL
    created_at      TEXT NOT NULL,    -- RFC 3339 UTC; server-assigned
    updated_at      TEXT NOT NULL,
    UNIQUE (staff_id, course_id, location_id),
    CHECK  (status IN ('completed', 'booked', 'awaiting', 'not_applicable')),
    CHECK  (status != 'completed' OR completion_date IS NOT NULL),
    CHECK  (status = 'completed' OR (completion_date IS NULL AND expiry_date IS NULL))
);

-- External role/location directory, mirrored locally.
CREATE TABLE IF NOT EXISTS caller_roles (
    caller_id TEXT PRIMARY KEY,
    role      TEXT NOT NULL,
    CHECK (role IN ('staff', 'manager', 'scheduler', 'admin'))
);

CREATE TABLE IF NOT EXISTS location_members (
    caller_id   TEXT NOT NULL,
    location_id TEXT NOT NULL,
    PRIMARY KEY (caller_id, location_id)
);

CREATE INDEX IF NOT EXISTS records_location_idx ON records(location_id);
CREATE INDEX IF NOT EXISTS records_staff_idx    ON records(staff_id);
CREATE INDEX IF NOT EXISTS records_expiry_idx   ON records(expiry_date);

PRAGMA user_version = 1;
";
