use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            username         TEXT NOT NULL UNIQUE,
            password         TEXT NOT NULL,
            trust_score      REAL NOT NULL DEFAULT 36.5,
            penalty_count    INTEGER NOT NULL DEFAULT 0,
            praise_count     INTEGER NOT NULL DEFAULT 0,
            money_weight     REAL NOT NULL DEFAULT 0.33,
            distance_weight  REAL NOT NULL DEFAULT 0.33,
            trust_weight     REAL NOT NULL DEFAULT 0.34,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS locations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            latitude    REAL NOT NULL,
            longitude   REAL NOT NULL,
            user_id     INTEGER REFERENCES users(id),
            post_id     INTEGER,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS posts (
            id                          INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id                     INTEGER NOT NULL REFERENCES users(id),
            start_location_id           INTEGER NOT NULL REFERENCES locations(id),
            end_location_id             INTEGER NOT NULL REFERENCES locations(id),
            desired_members             INTEGER NOT NULL,
            estimated_price             INTEGER,
            estimate_price_per_member   INTEGER,
            departure_time              TEXT NOT NULL,
            duration_minutes            INTEGER,
            start_address               TEXT,
            end_address                 TEXT,
            status                      TEXT NOT NULL DEFAULT 'OPEN',
            created_at                  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status_departure
            ON posts(status, departure_time);

        CREATE TABLE IF NOT EXISTS ride_groups (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id               INTEGER NOT NULL REFERENCES posts(id),
            max_member_count      INTEGER NOT NULL,
            current_member_count  INTEGER NOT NULL DEFAULT 0,
            status                TEXT NOT NULL DEFAULT 'WAITING',
            created_at            TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_ride_groups_post
            ON ride_groups(post_id);

        CREATE TABLE IF NOT EXISTS group_members (
            group_id        INTEGER NOT NULL REFERENCES ride_groups(id),
            user_id         INTEGER NOT NULL REFERENCES users(id),
            is_host         INTEGER NOT NULL DEFAULT 0,
            payment_status  TEXT NOT NULL DEFAULT 'WAIT',
            joined_at       TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (group_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_group_members_user
            ON group_members(user_id);

        CREATE TABLE IF NOT EXISTS bills (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id                  INTEGER NOT NULL REFERENCES ride_groups(id),
            user_id                   INTEGER NOT NULL REFERENCES users(id),
            amount                    INTEGER NOT NULL,
            member_count_at_creation  INTEGER NOT NULL,
            status                    TEXT NOT NULL DEFAULT 'PENDING',
            created_at                TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_bills_group
            ON bills(group_id);

        CREATE TABLE IF NOT EXISTS reports (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            reporter_id  INTEGER NOT NULL REFERENCES users(id),
            reported_id  INTEGER NOT NULL REFERENCES users(id),
            type         TEXT NOT NULL,
            description  TEXT,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
