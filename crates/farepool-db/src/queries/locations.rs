use rusqlite::{Connection, OptionalExtension, params};

use crate::models::LocationRow;
use crate::{Database, DbError, Result};

impl Database {
    pub fn create_location(
        &self,
        latitude: f64,
        longitude: f64,
        user_id: Option<i64>,
        post_id: Option<i64>,
    ) -> Result<LocationRow> {
        self.with_conn_mut(|conn| {
            if let Some(uid) = user_id
                && super::users::query_user_by_id(conn, uid)?.is_none()
            {
                return Err(DbError::UserNotFound);
            }
            conn.execute(
                "INSERT INTO locations (latitude, longitude, user_id, post_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![latitude, longitude, user_id, post_id],
            )?;
            let id = conn.last_insert_rowid();
            query_location(conn, id)?.ok_or(DbError::LocationNotFound)
        })
    }

    pub fn get_location(&self, id: i64) -> Result<LocationRow> {
        self.with_conn(|conn| query_location(conn, id)?.ok_or(DbError::LocationNotFound))
    }
}

fn query_location(conn: &Connection, id: i64) -> Result<Option<LocationRow>> {
    let row = conn
        .query_row(
            "SELECT id, latitude, longitude, user_id, post_id, created_at
             FROM locations WHERE id = ?1",
            [id],
            |row| {
                Ok(LocationRow {
                    id: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                    user_id: row.get(3)?,
                    post_id: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}
