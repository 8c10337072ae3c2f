use rusqlite::{Connection, OptionalExtension, params};

use crate::models::GroupRow;
use crate::{Database, DbError, Result};

impl Database {
    /// Direct group creation for an existing post. The post-creation flow is
    /// the intended path; this endpoint is kept for parity and can produce a
    /// second group for a post, which is why lookups always take the first
    /// group by id.
    pub fn create_group(
        &self,
        post_id: i64,
        max_member_count: i64,
        current_member_count: i64,
        status: &str,
    ) -> Result<GroupRow> {
        self.with_conn_mut(|conn| {
            let post_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
                [post_id],
                |row| row.get(0),
            )?;
            if !post_exists {
                return Err(DbError::PostNotFound);
            }
            conn.execute(
                "INSERT INTO ride_groups (post_id, max_member_count, current_member_count, status)
                 VALUES (?1, ?2, ?3, ?4)",
                params![post_id, max_member_count, current_member_count, status],
            )?;
            let id = conn.last_insert_rowid();
            query_group(conn, id)?.ok_or(DbError::GroupNotFound)
        })
    }

    pub fn get_group(&self, id: i64) -> Result<GroupRow> {
        self.with_conn(|conn| query_group(conn, id)?.ok_or(DbError::GroupNotFound))
    }

    pub fn list_groups(&self) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{GROUP_COLUMNS} ORDER BY id"))?;
            let rows = stmt
                .query_map([], map_group_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn group_by_post(&self, post_id: i64) -> Result<GroupRow> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{GROUP_COLUMNS} WHERE post_id = ?1 ORDER BY id LIMIT 1"),
                    [post_id],
                    map_group_row,
                )
                .optional()?;
            row.ok_or(DbError::GroupNotFound)
        })
    }

    pub fn groups_for_user(&self, user_id: i64) -> Result<Vec<GroupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{GROUP_COLUMNS} WHERE id IN (
                     SELECT group_id FROM group_members WHERE user_id = ?1)
                 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_group_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// (total, active) group participations for the recommendation stats view.
    /// Active means the group is still WAITING or IN_PROGRESS.
    pub fn participation_counts(&self, user_id: i64) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM group_members WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            let active: i64 = conn.query_row(
                "SELECT COUNT(*) FROM group_members gm
                 JOIN ride_groups g ON g.id = gm.group_id
                 WHERE gm.user_id = ?1 AND g.status IN ('WAITING', 'IN_PROGRESS')",
                [user_id],
                |row| row.get(0),
            )?;
            Ok((total as usize, active as usize))
        })
    }
}

const GROUP_COLUMNS: &str = "SELECT id, post_id, max_member_count, current_member_count, status, created_at
 FROM ride_groups";

pub(crate) fn query_group(conn: &Connection, id: i64) -> Result<Option<GroupRow>> {
    let row = conn
        .query_row(&format!("{GROUP_COLUMNS} WHERE id = ?1"), [id], map_group_row)
        .optional()?;
    Ok(row)
}

fn map_group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        max_member_count: row.get(2)?,
        current_member_count: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}
