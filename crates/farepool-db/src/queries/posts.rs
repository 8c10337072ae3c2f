use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{CandidatePostRow, NewPost, PostDetailRow};
use crate::{Database, DbError, Result};

impl Database {
    /// Creates a post together with its group and the host's membership in one
    /// transaction. The host is seeded as the first member, so the group
    /// starts at 1/`desired_members` and the per-member estimate starts at the
    /// full estimated price.
    pub fn create_post_with_group(&self, new: NewPost) -> Result<(i64, i64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if super::users::query_user_by_id(&tx, new.host_id)?.is_none() {
                return Err(DbError::UserNotFound);
            }

            tx.execute(
                "INSERT INTO locations (latitude, longitude) VALUES (?1, ?2)",
                params![new.start_latitude, new.start_longitude],
            )?;
            let start_location_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO locations (latitude, longitude) VALUES (?1, ?2)",
                params![new.end_latitude, new.end_longitude],
            )?;
            let end_location_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO posts (host_id, start_location_id, end_location_id, desired_members,
                                    estimated_price, estimate_price_per_member, departure_time,
                                    duration_minutes, start_address, end_address, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?9, 'OPEN')",
                params![
                    new.host_id,
                    start_location_id,
                    end_location_id,
                    new.desired_members,
                    new.estimated_price,
                    new.departure_time,
                    new.duration_minutes,
                    new.start_address,
                    new.end_address,
                ],
            )?;
            let post_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO ride_groups (post_id, max_member_count, current_member_count, status)
                 VALUES (?1, ?2, 1, 'WAITING')",
                params![post_id, new.desired_members],
            )?;
            let group_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO group_members (group_id, user_id, is_host, payment_status)
                 VALUES (?1, ?2, 1, 'WAIT')",
                params![group_id, new.host_id],
            )?;

            tx.commit()?;
            Ok((post_id, group_id))
        })
    }

    pub fn get_post_detail(&self, id: i64) -> Result<PostDetailRow> {
        self.with_conn(|conn| {
            query_post_detail(conn, id)?.ok_or(DbError::PostNotFound)
        })
    }

    /// OPEN posts departing after `now` whose group still has room, soonest first.
    pub fn available_posts(&self, now: &str) -> Result<Vec<PostDetailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_DETAIL_SELECT}
                 WHERE p.status = 'OPEN'
                   AND p.departure_time > ?1
                   AND (rg.id IS NULL OR rg.current_member_count < rg.max_member_count)
                 ORDER BY p.departure_time ASC"
            ))?;
            let rows = stmt
                .query_map([now], map_post_detail)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch detail fetch; callers re-order by their own id list.
    pub fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<PostDetailRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "{POST_DETAIL_SELECT} WHERE p.id IN ({})",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let bind: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
            let rows = stmt
                .query_map(bind.as_slice(), map_post_detail)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flips OPEN posts whose departure time has passed to EXPIRED, one UPDATE
    /// per post, and returns the affected ids.
    pub fn expire_due_posts(&self, now: &str) -> Result<Vec<i64>> {
        self.with_conn_mut(|conn| {
            let due: Vec<i64> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM posts WHERE status = 'OPEN' AND departure_time < ?1",
                )?;
                stmt.query_map([now], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            for id in &due {
                conn.execute("UPDATE posts SET status = 'EXPIRED' WHERE id = ?1", [id])?;
            }
            Ok(due)
        })
    }

    /// Recommendation candidates around a single point: OPEN, not departed,
    /// group not full, start location inside the bounding box, and the user is
    /// not already a member of any of the post's groups. The exact radius cut
    /// happens in the caller with the Haversine distance.
    pub fn nearby_open_candidates(
        &self,
        user_id: i64,
        now: &str,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Result<Vec<CandidatePostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CANDIDATE_SELECT}
                 WHERE {CANDIDATE_FILTER}
                   AND sl.latitude BETWEEN ?3 AND ?4
                   AND sl.longitude BETWEEN ?5 AND ?6"
            ))?;
            let rows = stmt
                .query_map(
                    params![user_id, now, min_lat, max_lat, min_lng, max_lng],
                    map_candidate,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Route variant: start location inside the departure box AND end location
    /// inside the destination box.
    #[allow(clippy::too_many_arguments)]
    pub fn route_open_candidates(
        &self,
        user_id: i64,
        now: &str,
        dep_box: (f64, f64, f64, f64),
        dest_box: (f64, f64, f64, f64),
    ) -> Result<Vec<CandidatePostRow>> {
        let (dep_min_lat, dep_max_lat, dep_min_lng, dep_max_lng) = dep_box;
        let (dest_min_lat, dest_max_lat, dest_min_lng, dest_max_lng) = dest_box;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{CANDIDATE_SELECT}
                 WHERE {CANDIDATE_FILTER}
                   AND sl.latitude BETWEEN ?3 AND ?4
                   AND sl.longitude BETWEEN ?5 AND ?6
                   AND el.latitude BETWEEN ?7 AND ?8
                   AND el.longitude BETWEEN ?9 AND ?10"
            ))?;
            let rows = stmt
                .query_map(
                    params![
                        user_id,
                        now,
                        dep_min_lat,
                        dep_max_lat,
                        dep_min_lng,
                        dep_max_lng,
                        dest_min_lat,
                        dest_max_lat,
                        dest_min_lng,
                        dest_max_lng,
                    ],
                    map_candidate,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const POST_DETAIL_SELECT: &str = "SELECT p.id, p.host_id, u.username,
        sl.latitude, sl.longitude, el.latitude, el.longitude,
        p.start_address, p.end_address, p.desired_members,
        p.estimated_price, p.estimate_price_per_member,
        p.departure_time, p.duration_minutes, p.status, p.created_at,
        rg.id, rg.current_member_count, rg.max_member_count
 FROM posts p
 JOIN users u ON u.id = p.host_id
 JOIN locations sl ON sl.id = p.start_location_id
 JOIN locations el ON el.id = p.end_location_id
 LEFT JOIN ride_groups rg
   ON rg.id = (SELECT id FROM ride_groups WHERE post_id = p.id ORDER BY id LIMIT 1)";

const CANDIDATE_SELECT: &str = "SELECT p.id, p.estimated_price,
        sl.latitude, sl.longitude, el.latitude, el.longitude,
        u.trust_score,
        (SELECT AVG(mu.trust_score)
           FROM group_members gm
           JOIN users mu ON mu.id = gm.user_id
           JOIN ride_groups g2 ON g2.id = gm.group_id
          WHERE g2.post_id = p.id) AS member_trust
 FROM posts p
 JOIN users u ON u.id = p.host_id
 JOIN locations sl ON sl.id = p.start_location_id
 JOIN locations el ON el.id = p.end_location_id
 LEFT JOIN ride_groups rg
   ON rg.id = (SELECT id FROM ride_groups WHERE post_id = p.id ORDER BY id LIMIT 1)";

const CANDIDATE_FILTER: &str = "p.status = 'OPEN'
   AND p.departure_time > ?2
   AND (rg.id IS NULL OR rg.current_member_count < rg.max_member_count)
   AND NOT EXISTS (
        SELECT 1 FROM group_members gm
        JOIN ride_groups g3 ON g3.id = gm.group_id
        WHERE g3.post_id = p.id AND gm.user_id = ?1)";

pub(crate) fn query_post_detail(conn: &Connection, id: i64) -> Result<Option<PostDetailRow>> {
    let row = conn
        .query_row(
            &format!("{POST_DETAIL_SELECT} WHERE p.id = ?1"),
            [id],
            map_post_detail,
        )
        .optional()?;
    Ok(row)
}

fn map_post_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostDetailRow> {
    Ok(PostDetailRow {
        id: row.get(0)?,
        host_id: row.get(1)?,
        host_username: row.get(2)?,
        start_latitude: row.get(3)?,
        start_longitude: row.get(4)?,
        end_latitude: row.get(5)?,
        end_longitude: row.get(6)?,
        start_address: row.get(7)?,
        end_address: row.get(8)?,
        desired_members: row.get(9)?,
        estimated_price: row.get(10)?,
        estimate_price_per_member: row.get(11)?,
        departure_time: row.get(12)?,
        duration_minutes: row.get(13)?,
        status: row.get(14)?,
        created_at: row.get(15)?,
        group_id: row.get(16)?,
        current_member_count: row.get(17)?,
        max_member_count: row.get(18)?,
    })
}

fn map_candidate(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidatePostRow> {
    Ok(CandidatePostRow {
        post_id: row.get(0)?,
        estimated_price: row.get(1)?,
        start_latitude: row.get(2)?,
        start_longitude: row.get(3)?,
        end_latitude: row.get(4)?,
        end_longitude: row.get(5)?,
        host_trust: row.get(6)?,
        member_trust: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::NewPost;

    fn sample_post(host_id: i64, departure: &str) -> NewPost {
        NewPost {
            host_id,
            start_latitude: 37.5665,
            start_longitude: 126.9780,
            end_latitude: 37.4563,
            end_longitude: 126.7052,
            start_address: Some("City Hall".into()),
            end_address: Some("Station".into()),
            desired_members: 4,
            estimated_price: Some(9000),
            departure_time: departure.into(),
            duration_minutes: Some(40),
        }
    }

    fn new_user(db: &Database, name: &str) -> i64 {
        db.create_user(name, "hash", None, None, None, None)
            .unwrap()
            .id
    }

    #[test]
    fn create_seeds_group_and_host_member() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let (post_id, group_id) = db
            .create_post_with_group(sample_post(host, "2030-01-01 10:00:00"))
            .unwrap();

        let detail = db.get_post_detail(post_id).unwrap();
        assert_eq!(detail.group_id, Some(group_id));
        assert_eq!(detail.current_member_count, Some(1));
        assert_eq!(detail.max_member_count, Some(4));
        // Host alone: per-member estimate is the full price.
        assert_eq!(detail.estimate_price_per_member, Some(9000));

        let members = db.members_of_group(group_id).unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_host);
    }

    #[test]
    fn expiry_sweep_flips_only_due_open_posts() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let (past, _) = db
            .create_post_with_group(sample_post(host, "2020-01-01 10:00:00"))
            .unwrap();
        let (future, _) = db
            .create_post_with_group(sample_post(host, "2030-01-01 10:00:00"))
            .unwrap();

        let expired = db.expire_due_posts("2025-06-01 00:00:00").unwrap();
        assert_eq!(expired, vec![past]);
        assert_eq!(db.get_post_detail(past).unwrap().status, "EXPIRED");
        assert_eq!(db.get_post_detail(future).unwrap().status, "OPEN");

        // Second sweep finds nothing: EXPIRED posts are not OPEN anymore.
        assert!(db.expire_due_posts("2025-06-01 00:00:00").unwrap().is_empty());
    }

    #[test]
    fn candidates_exclude_joined_full_and_departed_posts() {
        let db = Database::open_in_memory().unwrap();
        let host = new_user(&db, "host");
        let seeker = new_user(&db, "seeker");

        let (open_id, _) = db
            .create_post_with_group(sample_post(host, "2030-01-01 10:00:00"))
            .unwrap();
        let (_departed, _) = db
            .create_post_with_group(sample_post(host, "2020-01-01 10:00:00"))
            .unwrap();
        let (joined_id, joined_group) = db
            .create_post_with_group(sample_post(host, "2030-01-01 11:00:00"))
            .unwrap();
        db.join_group(joined_group, seeker).unwrap();

        let rows = db
            .nearby_open_candidates(seeker, "2025-06-01 00:00:00", 37.0, 38.0, 126.0, 127.5)
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.post_id).collect();
        assert_eq!(ids, vec![open_id]);
        assert!(!ids.contains(&joined_id));
    }

    #[test]
    fn member_trust_averages_over_group() {
        let db = Database::open_in_memory().unwrap();
        let host = db
            .create_user("host", "hash", Some(50.0), None, None, None)
            .unwrap()
            .id;
        let rider = db
            .create_user("rider", "hash", Some(30.0), None, None, None)
            .unwrap()
            .id;
        let seeker = new_user(&db, "seeker");

        let (_post, group) = db
            .create_post_with_group(sample_post(host, "2030-01-01 10:00:00"))
            .unwrap();
        db.join_group(group, rider).unwrap();

        let rows = db
            .nearby_open_candidates(seeker, "2025-06-01 00:00:00", 37.0, 38.0, 126.0, 127.5)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].member_trust, Some(40.0));
    }
}
