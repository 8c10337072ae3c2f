use std::time::Duration;

use tracing::{info, warn};

use farepool_api::auth::AppState;
use farepool_db::fmt_db_time;

/// Background task that expires stale ride offers.
///
/// Runs on an interval, flips OPEN posts whose departure time has passed to
/// EXPIRED, and closes their chat rooms best-effort.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: expired {} departed posts", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

async fn sweep_once(state: &AppState) -> anyhow::Result<usize> {
    let now = fmt_db_time(chrono::Utc::now());
    let expired = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || state.db.expire_due_posts(&now)).await??
    };

    for post_id in &expired {
        state.chat.close_room(*post_id).await;
    }

    Ok(expired.len())
}
