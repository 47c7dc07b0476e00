//! SQLite schema for the audit tables.

use rusqlite::Connection;

/// Create the audit tables if they do not exist.
///
/// `log_envelope.log_id` is the join key for both the log row and the API
/// row. The envelope is the row of record: a log row deleted out from under
/// its envelope still shows up in reads, which is how tampering surfaces.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            event TEXT NOT NULL,
            category TEXT,
            user TEXT NOT NULL DEFAULT '',
            groupname TEXT NOT NULL DEFAULT '',
            comments TEXT NOT NULL DEFAULT '',
            user_notes TEXT NOT NULL DEFAULT '',
            patient_id INTEGER,
            success INTEGER NOT NULL DEFAULT 1,
            crt_user TEXT NOT NULL DEFAULT '',
            log_from TEXT NOT NULL DEFAULT 'ehr',
            menu_item_id INTEGER,
            ccda_doc_id INTEGER
        );

        CREATE TABLE IF NOT EXISTS log_envelope (
            log_id INTEGER PRIMARY KEY,
            encrypt TEXT NOT NULL DEFAULT 'No',
            checksum TEXT NOT NULL DEFAULT '',
            checksum_api TEXT NOT NULL DEFAULT '',
            version INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS api_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            log_id INTEGER NOT NULL UNIQUE,
            user_id INTEGER,
            patient_id INTEGER,
            ip_address TEXT NOT NULL DEFAULT '',
            method TEXT NOT NULL DEFAULT '',
            request TEXT NOT NULL DEFAULT '',
            request_url TEXT NOT NULL DEFAULT '',
            request_body TEXT NOT NULL DEFAULT '',
            response TEXT NOT NULL DEFAULT '',
            created_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS disclosure_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            event TEXT NOT NULL,
            user TEXT NOT NULL DEFAULT '',
            recipient TEXT NOT NULL DEFAULT '',
            patient_id INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS patient_portal_menu (
            patient_portal_menu_id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_portal_menu_group_id INTEGER,
            menu_name TEXT NOT NULL UNIQUE
        );

        CREATE INDEX IF NOT EXISTS log_date_idx ON log (date);
        CREATE INDEX IF NOT EXISTS log_patient_idx ON log (patient_id);
        CREATE INDEX IF NOT EXISTS disclosure_patient_idx ON disclosure_log (patient_id);
        "#,
    )
}
