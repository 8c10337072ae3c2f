use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::models::{GroupChange, GroupMemberRow};
use crate::{Database, DbError, Result};

impl Database {
    /// Adds a user to a group inside one transaction. The capacity check is a
    /// conditional UPDATE with an affected-row check, so two concurrent joins
    /// cannot race past the limit. On success the post's per-member price
    /// estimate is recomputed from the new count.
    pub fn join_group(&self, group_id: i64, user_id: i64) -> Result<GroupChange> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let group =
                super::groups::query_group(&tx, group_id)?.ok_or(DbError::GroupNotFound)?;
            if super::users::query_user_by_id(&tx, user_id)?.is_none() {
                return Err(DbError::UserNotFound);
            }
            if super::posts::query_post_detail(&tx, group.post_id)?.is_none() {
                return Err(DbError::PostNotFound);
            }

            if query_member(&tx, group_id, user_id)?.is_some() {
                return Err(DbError::DuplicateJoin);
            }

            let claimed = tx.execute(
                "UPDATE ride_groups SET current_member_count = current_member_count + 1
                 WHERE id = ?1
                   AND current_member_count < max_member_count
                   AND status = 'WAITING'",
                [group_id],
            )?;
            if claimed == 0 {
                if group.current_member_count >= group.max_member_count {
                    warn!(
                        "Group {} is full: {}/{}",
                        group_id, group.current_member_count, group.max_member_count
                    );
                    return Err(DbError::GroupFull);
                }
                warn!("Group {} is not joinable in status {}", group_id, group.status);
                return Err(DbError::GroupNotJoinable);
            }

            tx.execute(
                "INSERT INTO group_members (group_id, user_id, is_host, payment_status)
                 VALUES (?1, ?2, 0, 'WAIT')",
                params![group_id, user_id],
            )?;

            let current = query_member_count(&tx, group_id)?;
            let per_member = recalc_per_member(&tx, group.post_id, current)?;

            tx.commit()?;

            info!(
                "User {} joined group {} ({}/{})",
                user_id, group_id, current, group.max_member_count
            );
            Ok(GroupChange {
                group_id,
                post_id: group.post_id,
                user_id,
                current_member_count: current,
                max_member_count: group.max_member_count,
                estimate_price_per_member: per_member,
            })
        })
    }

    /// Removes a member. The host can never leave their own group; the count
    /// is floored at zero and the per-member price is set back to NULL once
    /// nobody is left to split it.
    pub fn leave_group(&self, group_id: i64, user_id: i64) -> Result<GroupChange> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let member = query_member(&tx, group_id, user_id)?.ok_or(DbError::MemberNotFound)?;
            if member.is_host {
                warn!("Host {} attempted to leave group {}", user_id, group_id);
                return Err(DbError::HostCannotLeave);
            }

            let group =
                super::groups::query_group(&tx, group_id)?.ok_or(DbError::GroupNotFound)?;

            tx.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
            )?;
            tx.execute(
                "UPDATE ride_groups SET current_member_count = MAX(current_member_count - 1, 0)
                 WHERE id = ?1",
                [group_id],
            )?;

            let current = query_member_count(&tx, group_id)?;
            let per_member = recalc_per_member(&tx, group.post_id, current)?;

            tx.commit()?;

            info!(
                "User {} left group {} ({}/{})",
                user_id, group_id, current, group.max_member_count
            );
            Ok(GroupChange {
                group_id,
                post_id: group.post_id,
                user_id,
                current_member_count: current,
                max_member_count: group.max_member_count,
                estimate_price_per_member: per_member,
            })
        })
    }

    pub fn members_of_group(&self, group_id: i64) -> Result<Vec<GroupMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_COLUMNS} WHERE group_id = ?1 ORDER BY joined_at"
            ))?;
            let rows = stmt
                .query_map([group_id], map_member_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn memberships_of_user(&self, user_id: i64) -> Result<Vec<GroupMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_COLUMNS} WHERE user_id = ?1 ORDER BY joined_at"
            ))?;
            let rows = stmt
                .query_map([user_id], map_member_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_member(&self, group_id: i64, user_id: i64) -> Result<GroupMemberRow> {
        self.with_conn(|conn| {
            query_member(conn, group_id, user_id)?.ok_or(DbError::MemberNotFound)
        })
    }

    /// False for non-members rather than an error; the host check is a plain
    /// boolean question.
    pub fn is_group_host(&self, group_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(query_member(conn, group_id, user_id)?
                .map(|m| m.is_host)
                .unwrap_or(false))
        })
    }
}

const MEMBER_COLUMNS: &str =
    "SELECT group_id, user_id, is_host, payment_status, joined_at FROM group_members";

fn query_member(conn: &Connection, group_id: i64, user_id: i64) -> Result<Option<GroupMemberRow>> {
    let row = conn
        .query_row(
            &format!("{MEMBER_COLUMNS} WHERE group_id = ?1 AND user_id = ?2"),
            params![group_id, user_id],
            map_member_row,
        )
        .optional()?;
    Ok(row)
}

fn query_member_count(conn: &Connection, group_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT current_member_count FROM ride_groups WHERE id = ?1",
        [group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// `floor(estimated_price / count)` when both are usable, NULL otherwise.
fn recalc_per_member(conn: &Connection, post_id: i64, count: i64) -> Result<Option<i64>> {
    let price: Option<i64> = conn.query_row(
        "SELECT estimated_price FROM posts WHERE id = ?1",
        [post_id],
        |row| row.get(0),
    )?;
    let per_member = match price {
        Some(p) if count > 0 => Some(p / count),
        _ => None,
    };
    conn.execute(
        "UPDATE posts SET estimate_price_per_member = ?2 WHERE id = ?1",
        params![post_id, per_member],
    )?;
    Ok(per_member)
}

fn map_member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMemberRow> {
    Ok(GroupMemberRow {
        group_id: row.get(0)?,
        user_id: row.get(1)?,
        is_host: row.get(2)?,
        payment_status: row.get(3)?,
        joined_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::NewPost;
    use crate::{Database, DbError};

    fn new_user(db: &Database, name: &str) -> i64 {
        db.create_user(name, "hash", None, None, None, None)
            .unwrap()
            .id
    }

    fn new_post(db: &Database, host: i64, desired: i64, price: Option<i64>) -> (i64, i64) {
        db.create_post_with_group(NewPost {
            host_id: host,
            start_latitude: 37.5,
            start_longitude: 127.0,
            end_latitude: 37.4,
            end_longitude: 126.7,
            start_address: None,
            end_address: None,
            desired_members: desired,
            estimated_price: price,
            departure_time: "2030-01-01 10:00:00".into(),
            duration_minutes: None,
        })
        .unwrap()
    }

    #[test]
    fn join_and_leave_resplit_the_price() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (post_id, group_id) = new_post(&db, host, 4, Some(9000));

        assert_eq!(
            db.get_post_detail(post_id).unwrap().estimate_price_per_member,
            Some(9000)
        );

        let change = db.join_group(group_id, rider).unwrap();
        assert_eq!(change.current_member_count, 2);
        assert_eq!(change.estimate_price_per_member, Some(4500));

        let change = db.leave_group(group_id, rider).unwrap();
        assert_eq!(change.current_member_count, 1);
        assert_eq!(change.estimate_price_per_member, Some(9000));
    }

    #[test]
    fn per_member_price_floors_remainder() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let a = new_user(&db, "a");
        let b = new_user(&db, "b");
        let (_post, group) = new_post(&db, host, 4, Some(10000));

        db.join_group(group, a).unwrap();
        let change = db.join_group(group, b).unwrap();
        // 10000 / 3 = 3333, remainder undistributed
        assert_eq!(change.estimate_price_per_member, Some(3333));
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (_post, group) = new_post(&db, host, 4, Some(9000));

        db.join_group(group, rider).unwrap();
        assert!(matches!(
            db.join_group(group, rider),
            Err(DbError::DuplicateJoin)
        ));
        // The host is a member too.
        assert!(matches!(
            db.join_group(group, host),
            Err(DbError::DuplicateJoin)
        ));
    }

    #[test]
    fn full_group_rejects_join_and_keeps_state() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let second = new_user(&db, "second");
        let third = new_user(&db, "third");
        let (post_id, group) = new_post(&db, host, 2, Some(8000));

        db.join_group(group, second).unwrap();
        assert!(matches!(
            db.join_group(group, third),
            Err(DbError::GroupFull)
        ));

        let g = db.get_group(group).unwrap();
        assert_eq!(g.current_member_count, 2);
        assert_eq!(g.max_member_count, 2);
        assert_eq!(
            db.get_post_detail(post_id).unwrap().estimate_price_per_member,
            Some(4000)
        );
        assert_eq!(db.members_of_group(group).unwrap().len(), 2);
    }

    #[test]
    fn non_waiting_group_is_not_joinable() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (post_id, _group) = new_post(&db, host, 4, None);
        let closed = db.create_group(post_id, 4, 0, "COMPLETED").unwrap();

        assert!(matches!(
            db.join_group(closed.id, rider),
            Err(DbError::GroupNotJoinable)
        ));
    }

    #[test]
    fn host_can_never_leave() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (_post, group) = new_post(&db, host, 4, Some(9000));
        db.join_group(group, rider).unwrap();

        assert!(matches!(
            db.leave_group(group, host),
            Err(DbError::HostCannotLeave)
        ));
        assert_eq!(db.get_group(group).unwrap().current_member_count, 2);
    }

    #[test]
    fn leaving_without_membership_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let stranger = new_user(&db, "stranger");
        let (_post, group) = new_post(&db, host, 4, Some(9000));

        assert!(matches!(
            db.leave_group(group, stranger),
            Err(DbError::MemberNotFound)
        ));
    }

    #[test]
    fn per_member_price_is_null_when_group_empties() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (post_id, _) = new_post(&db, host, 4, Some(9000));

        // Direct group with no host member: the sole member leaving empties it.
        let side_group = db.create_group(post_id, 3, 0, "WAITING").unwrap();
        db.join_group(side_group.id, rider).unwrap();
        let change = db.leave_group(side_group.id, rider).unwrap();
        assert_eq!(change.current_member_count, 0);
        assert_eq!(change.estimate_price_per_member, None);
        assert_eq!(
            db.get_post_detail(post_id).unwrap().estimate_price_per_member,
            None
        );
    }

    #[test]
    fn count_never_exceeds_max() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let (_post, group) = new_post(&db, host, 3, Some(9000));

        for i in 0..5 {
            let rider = new_user(&db, &format!("rider{}", i));
            let _ = db.join_group(group, rider);
        }
        let g = db.get_group(group).unwrap();
        assert!(g.current_member_count <= g.max_member_count);
        assert_eq!(g.current_member_count, 3);
    }

    #[test]
    fn host_check_and_membership_reads() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let rider = new_user(&db, "rider");
        let (_post, group) = new_post(&db, host, 4, Some(9000));
        db.join_group(group, rider).unwrap();

        assert!(db.is_group_host(group, host).unwrap());
        assert!(!db.is_group_host(group, rider).unwrap());
        assert!(!db.is_group_host(group, 9999).unwrap());

        assert_eq!(db.memberships_of_user(rider).unwrap().len(), 1);
        assert!(!db.get_member(group, rider).unwrap().is_host);
    }
}
