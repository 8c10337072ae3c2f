use rusqlite::{Connection, OptionalExtension, params};

use crate::models::UserRow;
use crate::{Database, DbError, Result};

impl Database {
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        trust_score: Option<f64>,
        money_weight: Option<f64>,
        distance_weight: Option<f64>,
        trust_weight: Option<f64>,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            if username_taken(conn, username)? {
                return Err(DbError::UsernameTaken);
            }
            conn.execute(
                "INSERT INTO users (username, password, trust_score, money_weight, distance_weight, trust_weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    username,
                    password_hash,
                    trust_score.unwrap_or(36.5),
                    money_weight.unwrap_or(0.33),
                    distance_weight.unwrap_or(0.33),
                    trust_weight.unwrap_or(0.34),
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or(DbError::UserNotFound)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<UserRow> {
        self.with_conn(|conn| query_user_by_id(conn, id)?.ok_or(DbError::UserNotFound))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{USER_COLUMNS} WHERE username = ?1"),
                    [username],
                    map_user_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn username_available(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(!username_taken(conn, username)?))
    }

    pub fn update_user(
        &self,
        id: i64,
        username: Option<&str>,
        trust_score: Option<f64>,
        penalty_count: Option<i64>,
        praise_count: Option<i64>,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let current = query_user_by_id(conn, id)?.ok_or(DbError::UserNotFound)?;
            if let Some(name) = username
                && name != current.username
                && username_taken(conn, name)?
            {
                return Err(DbError::UsernameTaken);
            }
            conn.execute(
                "UPDATE users SET
                     username = COALESCE(?2, username),
                     trust_score = COALESCE(?3, trust_score),
                     penalty_count = COALESCE(?4, penalty_count),
                     praise_count = COALESCE(?5, praise_count)
                 WHERE id = ?1",
                params![id, username, trust_score, penalty_count, praise_count],
            )?;
            query_user_by_id(conn, id)?.ok_or(DbError::UserNotFound)
        })
    }

    pub fn update_user_weights(
        &self,
        id: i64,
        money_weight: Option<f64>,
        distance_weight: Option<f64>,
        trust_weight: Option<f64>,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET
                     money_weight = COALESCE(?2, money_weight),
                     distance_weight = COALESCE(?3, distance_weight),
                     trust_weight = COALESCE(?4, trust_weight)
                 WHERE id = ?1",
                params![id, money_weight, distance_weight, trust_weight],
            )?;
            if updated == 0 {
                return Err(DbError::UserNotFound);
            }
            query_user_by_id(conn, id)?.ok_or(DbError::UserNotFound)
        })
    }

    /// Removes a user and everything they own, in dependency order, inside a
    /// single transaction. There are no FK cascades; the full scope of the
    /// deletion is visible here.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if query_user_by_id(&tx, id)?.is_none() {
                return Err(DbError::UserNotFound);
            }

            // Hosted posts take their groups, members and bills with them.
            tx.execute(
                "DELETE FROM bills WHERE group_id IN (
                     SELECT g.id FROM ride_groups g
                     JOIN posts p ON p.id = g.post_id
                     WHERE p.host_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM group_members WHERE group_id IN (
                     SELECT g.id FROM ride_groups g
                     JOIN posts p ON p.id = g.post_id
                     WHERE p.host_id = ?1)",
                [id],
            )?;
            tx.execute(
                "DELETE FROM ride_groups WHERE post_id IN (
                     SELECT id FROM posts WHERE host_id = ?1)",
                [id],
            )?;

            let post_location_ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT start_location_id, end_location_id FROM posts WHERE host_id = ?1",
                )?;
                let pairs = stmt
                    .query_map([id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                pairs.into_iter().flat_map(|(a, b)| [a, b]).collect()
            };

            tx.execute("DELETE FROM posts WHERE host_id = ?1", [id])?;
            for loc_id in post_location_ids {
                tx.execute("DELETE FROM locations WHERE id = ?1", [loc_id])?;
            }

            // Memberships in other hosts' groups release their seats.
            tx.execute(
                "UPDATE ride_groups SET current_member_count = MAX(current_member_count - 1, 0)
                 WHERE id IN (SELECT group_id FROM group_members WHERE user_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM group_members WHERE user_id = ?1", [id])?;

            tx.execute("DELETE FROM bills WHERE user_id = ?1", [id])?;
            tx.execute(
                "DELETE FROM reports WHERE reporter_id = ?1 OR reported_id = ?1",
                [id],
            )?;
            tx.execute("DELETE FROM locations WHERE user_id = ?1", [id])?;
            tx.execute("DELETE FROM users WHERE id = ?1", [id])?;

            tx.commit()?;
            Ok(())
        })
    }
}

const USER_COLUMNS: &str = "SELECT id, username, password, trust_score, penalty_count, praise_count,
        money_weight, distance_weight, trust_weight, created_at
 FROM users";

fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(&format!("{USER_COLUMNS} WHERE id = ?1"), [id], map_user_row)
        .optional()?;
    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        trust_score: row.get(3)?,
        penalty_count: row.get(4)?,
        praise_count: row.get(5)?,
        money_weight: row.get(6)?,
        distance_weight: row.get(7)?,
        trust_weight: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::NewPost;
    use crate::{Database, DbError};

    #[test]
    fn defaults_apply_at_signup() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user("newbie", "hash", None, None, None, None)
            .unwrap();
        assert_eq!(user.trust_score, 36.5);
        assert_eq!(user.money_weight, 0.33);
        assert_eq!(user.distance_weight, 0.33);
        assert_eq!(user.trust_weight, 0.34);
        assert_eq!(user.penalty_count, 0);

        assert!(matches!(
            db.create_user("newbie", "hash", None, None, None, None),
            Err(DbError::UsernameTaken)
        ));
        assert!(!db.username_available("newbie").unwrap());
        assert!(db.username_available("someone-else").unwrap());
    }

    #[test]
    fn weight_update_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user("tuner", "hash", None, None, None, None)
            .unwrap();
        let updated = db
            .update_user_weights(user.id, Some(0.5), None, Some(0.2))
            .unwrap();
        assert_eq!(updated.money_weight, 0.5);
        assert_eq!(updated.distance_weight, 0.33);
        assert_eq!(updated.trust_weight, 0.2);
    }

    #[test]
    fn delete_removes_owned_rows_and_releases_seats() {
        let db = Database::open_in_memory().unwrap();
        let host = db
            .create_user("host", "hash", None, None, None, None)
            .unwrap()
            .id;
        let rider = db
            .create_user("rider", "hash", None, None, None, None)
            .unwrap()
            .id;
        let (host_post, host_group) = db
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
        db.join_group(host_group, rider).unwrap();
        db.create_bill(host_group, rider, 5000).unwrap();

        // Rider also hosts their own post that host joins.
        let (_rider_post, rider_group) = db
            .create_post_with_group(NewPost {
                host_id: rider,
                start_latitude: 37.5,
                start_longitude: 127.0,
                end_latitude: 37.4,
                end_longitude: 126.7,
                start_address: None,
                end_address: None,
                desired_members: 3,
                estimated_price: Some(6000),
                departure_time: "2030-01-02 10:00:00".into(),
                duration_minutes: None,
            })
            .unwrap();
        db.join_group(rider_group, host).unwrap();

        db.delete_user(host).unwrap();

        assert!(matches!(db.get_user(host), Err(DbError::UserNotFound)));
        assert!(matches!(
            db.get_post_detail(host_post),
            Err(DbError::PostNotFound)
        ));
        assert!(matches!(
            db.get_group(host_group),
            Err(DbError::GroupNotFound)
        ));
        // Host's seat in the rider's group is released.
        assert_eq!(db.get_group(rider_group).unwrap().current_member_count, 1);
        assert!(db.memberships_of_user(host).unwrap().is_empty());
    }
}
