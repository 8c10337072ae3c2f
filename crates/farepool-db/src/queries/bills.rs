use rusqlite::{Connection, OptionalExtension, params};

use crate::models::BillRow;
use crate::{Database, DbError, Result};

impl Database {
    /// Stores the full, unsplit amount. The member count at creation time is
    /// captured alongside so the share can be computed against either basis.
    pub fn create_bill(&self, group_id: i64, user_id: i64, amount: i64) -> Result<(BillRow, i64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if super::groups::query_group(&tx, group_id)?.is_none() {
                return Err(DbError::GroupNotFound);
            }
            if super::users::query_user_by_id(&tx, user_id)?.is_none() {
                return Err(DbError::UserNotFound);
            }
            let is_member: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2)",
                params![group_id, user_id],
                |row| row.get(0),
            )?;
            if !is_member {
                return Err(DbError::NotGroupMember);
            }
            if amount < 0 {
                return Err(DbError::InvalidAmount);
            }

            let member_count = live_member_count(&tx, group_id)?;
            tx.execute(
                "INSERT INTO bills (group_id, user_id, amount, member_count_at_creation, status)
                 VALUES (?1, ?2, ?3, ?4, 'PENDING')",
                params![group_id, user_id, amount, member_count],
            )?;
            let id = tx.last_insert_rowid();
            let bill = query_bill(&tx, id)?.ok_or(DbError::BillNotFound)?;

            tx.commit()?;
            Ok((bill, member_count))
        })
    }

    /// Bill plus the group's live member count, which the API layer needs to
    /// compute the visible share.
    pub fn get_bill(&self, id: i64) -> Result<(BillRow, i64)> {
        self.with_conn(|conn| {
            let bill = query_bill(conn, id)?.ok_or(DbError::BillNotFound)?;
            let count = live_member_count(conn, bill.group_id)?;
            Ok((bill, count))
        })
    }

    pub fn list_bills(
        &self,
        group_id: Option<i64>,
        user_id: Option<i64>,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(BillRow, i64)>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "{BILL_COLUMNS},
                 (SELECT COUNT(*) FROM group_members gm WHERE gm.group_id = b.group_id)
                 FROM bills b WHERE 1=1"
            );
            let mut bind: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(g) = group_id {
                bind.push(Box::new(g));
                sql.push_str(&format!(" AND b.group_id = ?{}", bind.len()));
            }
            if let Some(u) = user_id {
                bind.push(Box::new(u));
                sql.push_str(&format!(" AND b.user_id = ?{}", bind.len()));
            }
            if let Some(s) = status {
                bind.push(Box::new(s.to_string()));
                sql.push_str(&format!(" AND b.status = ?{}", bind.len()));
            }
            bind.push(Box::new(limit));
            sql.push_str(&format!(" ORDER BY b.created_at DESC LIMIT ?{}", bind.len()));
            bind.push(Box::new(offset));
            sql.push_str(&format!(" OFFSET ?{}", bind.len()));

            let mut stmt = conn.prepare(&sql)?;
            let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
                bind.iter().map(|b| b.as_ref()).collect();
            let rows = stmt
                .query_map(bind_refs.as_slice(), |row| {
                    Ok((map_bill_row(row)?, row.get::<_, i64>(7)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_bill_amount(&self, id: i64, amount: i64) -> Result<(BillRow, i64)> {
        if amount < 0 {
            return Err(DbError::InvalidAmount);
        }
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE bills SET amount = ?2 WHERE id = ?1",
                params![id, amount],
            )?;
            if updated == 0 {
                return Err(DbError::BillNotFound);
            }
            let bill = query_bill(conn, id)?.ok_or(DbError::BillNotFound)?;
            let count = live_member_count(conn, bill.group_id)?;
            Ok((bill, count))
        })
    }

    pub fn update_bill_status(&self, id: i64, status: &str) -> Result<(BillRow, i64)> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE bills SET status = ?2 WHERE id = ?1",
                params![id, status],
            )?;
            if updated == 0 {
                return Err(DbError::BillNotFound);
            }
            let bill = query_bill(conn, id)?.ok_or(DbError::BillNotFound)?;
            let count = live_member_count(conn, bill.group_id)?;
            Ok((bill, count))
        })
    }

    pub fn delete_bill(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM bills WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(DbError::BillNotFound);
            }
            Ok(())
        })
    }
}

const BILL_COLUMNS: &str = "SELECT b.id, b.group_id, b.user_id, b.amount, b.member_count_at_creation, b.status, b.created_at";

fn live_member_count(conn: &Connection, group_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM group_members WHERE group_id = ?1",
        [group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn query_bill(conn: &Connection, id: i64) -> Result<Option<BillRow>> {
    let row = conn
        .query_row(
            &format!("{BILL_COLUMNS} FROM bills b WHERE b.id = ?1"),
            [id],
            map_bill_row,
        )
        .optional()?;
    Ok(row)
}

fn map_bill_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillRow> {
    Ok(BillRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        user_id: row.get(2)?,
        amount: row.get(3)?,
        member_count_at_creation: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::NewPost;
    use crate::{Database, DbError};

    fn setup() -> (Database, i64, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let host = db
            .create_user("host", "hash", None, None, None, None)
            .unwrap()
            .id;
        let (post_id, group_id) = db
            .create_post_with_group(NewPost {
                host_id: host,
                start_latitude: 37.5,
                start_longitude: 127.0,
                end_latitude: 37.4,
                end_longitude: 126.7,
                start_address: None,
                end_address: None,
                desired_members: 4,
                estimated_price: Some(9000),
                departure_time: "2030-01-01 10:00:00".into(),
                duration_minutes: None,
            })
            .unwrap();
        (db, host, post_id, group_id)
    }

    #[test]
    fn bill_requires_membership_and_non_negative_amount() {
        let (db, host, _post, group) = setup();
        let outsider = db
            .create_user("outsider", "hash", None, None, None, None)
            .unwrap()
            .id;

        assert!(matches!(
            db.create_bill(group, outsider, 6000),
            Err(DbError::NotGroupMember)
        ));
        assert!(matches!(
            db.create_bill(group, host, -1),
            Err(DbError::InvalidAmount)
        ));

        let (bill, count) = db.create_bill(group, host, 6000).unwrap();
        assert_eq!(bill.amount, 6000);
        assert_eq!(bill.status, "PENDING");
        assert_eq!(bill.member_count_at_creation, 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn live_count_tracks_membership_changes() {
        let (db, host, _post, group) = setup();
        let rider = db
            .create_user("rider", "hash", None, None, None, None)
            .unwrap()
            .id;

        let (bill, _) = db.create_bill(group, host, 6000).unwrap();
        db.join_group(group, rider).unwrap();

        let (fetched, live) = db.get_bill(bill.id).unwrap();
        assert_eq!(fetched.member_count_at_creation, 1);
        assert_eq!(live, 2);
    }

    #[test]
    fn list_filters_by_group_user_and_status() {
        let (db, host, _post, group) = setup();
        let rider = db
            .create_user("rider", "hash", None, None, None, None)
            .unwrap()
            .id;
        db.join_group(group, rider).unwrap();

        let (b1, _) = db.create_bill(group, host, 6000).unwrap();
        let (b2, _) = db.create_bill(group, rider, 4000).unwrap();
        db.update_bill_status(b2.id, "PAID").unwrap();

        let all = db.list_bills(Some(group), None, None, 20, 0).unwrap();
        assert_eq!(all.len(), 2);

        let host_bills = db.list_bills(Some(group), Some(host), None, 20, 0).unwrap();
        assert_eq!(host_bills.len(), 1);
        assert_eq!(host_bills[0].0.id, b1.id);

        let paid = db.list_bills(None, None, Some("PAID"), 20, 0).unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].0.id, b2.id);
    }

    #[test]
    fn amount_update_revalidates() {
        let (db, host, _post, group) = setup();
        let (bill, _) = db.create_bill(group, host, 6000).unwrap();

        assert!(matches!(
            db.update_bill_amount(bill.id, -5),
            Err(DbError::InvalidAmount)
        ));
        let (updated, _) = db.update_bill_amount(bill.id, 7500).unwrap();
        assert_eq!(updated.amount, 7500);

        db.delete_bill(bill.id).unwrap();
        assert!(matches!(db.get_bill(bill.id), Err(DbError::BillNotFound)));
    }
}
