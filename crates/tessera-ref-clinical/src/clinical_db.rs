//! The reference host database: SQLite behind the `Database` trait.
//!
//! The audit store can share the same connection, so audit rows land in the
//! same file as the clinical data they describe.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};

use tessera_contracts::{
    error::{AuditError, AuditResult},
    value::{Row, SqlValue},
};
use tessera_core::traits::Database;

use crate::mock_data;

fn db_err(e: rusqlite::Error) -> AuditError {
    AuditError::Database { reason: e.to_string() }
}

fn to_value(v: &SqlValue) -> Value {
    match v {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(r) => Value::Real(*r),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_value(v: ValueRef<'_>) -> SqlValue {
    match Value::from(v) {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(r) => SqlValue::Real(r),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

/// A clinical database on one SQLite connection.
#[derive(Clone)]
pub struct ClinicalDb {
    conn: Arc<Mutex<Connection>>,
}

impl ClinicalDb {
    /// An in-memory database loaded with the demo clinic.
    pub fn seeded() -> AuditResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        mock_data::seed(&conn).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The shared connection, for handing to the audit store.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| AuditError::Database {
            reason: format!("clinical database lock poisoned: {e}"),
        })
    }
}

impl Database for ClinicalDb {
    fn execute(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<u64> {
        let conn = self.lock()?;
        let changed = conn
            .execute(sql, params_from_iter(binds.iter().map(to_value)))
            .map_err(db_err)?;
        Ok(changed as u64)
    }

    fn query(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let rows = stmt
            .query_map(params_from_iter(binds.iter().map(to_value)), |r| {
                let mut row = Row::new();
                for (i, column) in columns.iter().enumerate() {
                    row.insert(column.clone(), from_value(r.get_ref(i)?));
                }
                Ok(row)
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_data::{ER_DOC, PATIENT_JOHN_DOE};

    #[test]
    fn seeded_patient_is_readable() {
        let db = ClinicalDb::seeded().unwrap();
        let row = db
            .query_row("SELECT fname, lname FROM patient_data WHERE id = ?", &[SqlValue::Integer(PATIENT_JOHN_DOE)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("fname"), Some(&SqlValue::Text("John".to_string())));
        assert_eq!(row.get("lname"), Some(&SqlValue::Text("Doe".to_string())));
    }

    #[test]
    fn execute_reports_changed_rows() {
        let db = ClinicalDb::seeded().unwrap();
        let changed = db
            .execute("UPDATE lists SET begdate = ? WHERE pid = ?", &["2024-01-01".into(), 42i64.into()])
            .unwrap();
        assert_eq!(changed, 3);
    }

    #[test]
    fn backtick_identifiers_are_accepted() {
        let db = ClinicalDb::seeded().unwrap();
        let row = db
            .query_row("SELECT `fname` FROM `patient_data` WHERE id = ?", &[SqlValue::Integer(42)])
            .unwrap();
        assert!(row.is_some());
    }

    #[test]
    fn breakglass_group_is_seeded() {
        let db = ClinicalDb::seeded().unwrap();
        let rows = db
            .query(
                "SELECT gacl_aro.value FROM gacl_aro, gacl_groups_aro_map, gacl_aro_groups \
                 WHERE gacl_aro.id = gacl_groups_aro_map.aro_id \
                 AND gacl_groups_aro_map.group_id = gacl_aro_groups.id \
                 AND gacl_aro_groups.value = 'breakglass'",
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("value"), Some(&SqlValue::Text(ER_DOC.to_string())));
    }

    #[test]
    fn bad_sql_is_a_database_error() {
        let db = ClinicalDb::seeded().unwrap();
        assert!(matches!(db.execute("UPDATE nowhere SET x = 1", &[]), Err(AuditError::Database { .. })));
    }
}
