use rusqlite::params;

use crate::models::ReportRow;
use crate::{Database, DbError, Result};

impl Database {
    pub fn create_report(
        &self,
        reporter_id: i64,
        reported_id: i64,
        report_type: &str,
        description: Option<&str>,
    ) -> Result<ReportRow> {
        self.with_conn_mut(|conn| {
            for uid in [reporter_id, reported_id] {
                if super::users::query_user_by_id(conn, uid)?.is_none() {
                    return Err(DbError::UserNotFound);
                }
            }
            conn.execute(
                "INSERT INTO reports (reporter_id, reported_id, type, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![reporter_id, reported_id, report_type, description],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("{REPORT_COLUMNS} WHERE id = ?1"),
                [id],
                map_report_row,
            )
            .map_err(DbError::from)
        })
    }

    /// Reports filed against a user, newest first. Append-only: there is no
    /// update or delete path.
    pub fn reports_against_user(&self, reported_id: i64) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REPORT_COLUMNS} WHERE reported_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([reported_id], map_report_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const REPORT_COLUMNS: &str =
    "SELECT id, reporter_id, reported_id, type, description, created_at FROM reports";

fn map_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        reported_id: row.get(2)?,
        report_type: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}
