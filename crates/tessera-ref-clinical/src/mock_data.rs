//! Fictional clinic data for the reference runtime.
//!
//! Everything here is hardcoded. The schema is a small slice of a clinical
//! records system: demographics, issue lists, facilities, users, and the
//! access-control tables the break-glass lookup reads.

use rusqlite::Connection;

// ── Users ────────────────────────────────────────────────────────────────────

/// Attending physician. Ordinary access.
pub const DR_SMITH: &str = "drsmith";

/// Front-desk nurse. Ordinary access.
pub const NURSE_JONES: &str = "nurse_jones";

/// Emergency physician in the `breakglass` group.
pub const ER_DOC: &str = "er_doc";

/// Group every demo user belongs to.
pub const DEFAULT_GROUP: &str = "Default";

// ── Records ──────────────────────────────────────────────────────────────────

/// John Doe's patient id.
pub const PATIENT_JOHN_DOE: i64 = 42;

/// John Doe's lisinopril entry in `lists`.
pub const LISINOPRIL_LIST_ID: i64 = 7;

const SCHEMA: &str = "
CREATE TABLE patient_data (
    id      INTEGER PRIMARY KEY,
    pid     INTEGER NOT NULL,
    fname   TEXT NOT NULL DEFAULT '',
    lname   TEXT NOT NULL DEFAULT '',
    DOB     TEXT,
    sex     TEXT
);

CREATE TABLE lists (
    id      INTEGER PRIMARY KEY,
    pid     INTEGER NOT NULL,
    type    TEXT NOT NULL,
    title   TEXT NOT NULL,
    begdate TEXT
);

CREATE TABLE facility (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name    TEXT NOT NULL,
    npi     TEXT
);

CREATE TABLE users (
    id       INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    fname    TEXT,
    lname    TEXT,
    active   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE gacl_aro (
    id    INTEGER PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE gacl_aro_groups (
    id    INTEGER PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE gacl_groups_aro_map (
    group_id INTEGER NOT NULL,
    aro_id   INTEGER NOT NULL,
    PRIMARY KEY (group_id, aro_id)
);
";

const SEED: &str = "
INSERT INTO patient_data (id, pid, fname, lname, DOB, sex)
    VALUES (42, 42, 'John', 'Doe', '1968-04-12', 'Male');
INSERT INTO patient_data (id, pid, fname, lname, DOB, sex)
    VALUES (43, 43, 'Maria', 'Alvarez', '1990-11-03', 'Female');

INSERT INTO lists (id, pid, type, title, begdate)
    VALUES (7, 42, 'medication', 'Lisinopril 10 mg daily', '2023-01-09');
INSERT INTO lists (id, pid, type, title, begdate)
    VALUES (8, 42, 'medical_problem', 'Essential hypertension', '2022-12-14');
INSERT INTO lists (id, pid, type, title, begdate)
    VALUES (9, 42, 'allergy', 'Penicillin', '1999-06-01');

INSERT INTO facility (name, npi) VALUES ('Main Street Clinic', '1093817465');

INSERT INTO users (id, username, fname, lname) VALUES (1, 'drsmith', 'Alex', 'Smith');
INSERT INTO users (id, username, fname, lname) VALUES (2, 'nurse_jones', 'Sam', 'Jones');
INSERT INTO users (id, username, fname, lname) VALUES (3, 'er_doc', 'Robin', 'Okafor');

INSERT INTO gacl_aro (id, value) VALUES (10, 'drsmith');
INSERT INTO gacl_aro (id, value) VALUES (11, 'nurse_jones');
INSERT INTO gacl_aro (id, value) VALUES (12, 'er_doc');

INSERT INTO gacl_aro_groups (id, value) VALUES (1, 'admin');
INSERT INTO gacl_aro_groups (id, value) VALUES (2, 'clin');
INSERT INTO gacl_aro_groups (id, value) VALUES (3, 'breakglass');

INSERT INTO gacl_groups_aro_map (group_id, aro_id) VALUES (1, 10);
INSERT INTO gacl_groups_aro_map (group_id, aro_id) VALUES (2, 11);
INSERT INTO gacl_groups_aro_map (group_id, aro_id) VALUES (2, 12);
INSERT INTO gacl_groups_aro_map (group_id, aro_id) VALUES (3, 12);
";

/// Create the clinical tables on `conn` and load the demo rows.
pub fn seed(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(SEED)
}
