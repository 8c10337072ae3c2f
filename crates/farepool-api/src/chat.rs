use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

/// Best-effort mirror of group membership into the external chat document
/// store, keyed by post id. Every operation logs failures and returns
/// nothing: chat problems must never break the main flow, and no call is
/// retried.
#[derive(Clone)]
pub struct ChatMirror {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl ChatMirror {
    /// `base_url = None` disables the mirror entirely.
    pub fn new(base_url: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base_url })
    }

    pub async fn create_room(&self, post_id: i64, host_user_id: i64) {
        let Some(base) = &self.base_url else {
            debug!("Chat mirror disabled, skipping room creation for post {}", post_id);
            return;
        };
        let res = self
            .http
            .post(format!("{base}/rooms"))
            .json(&json!({
                "post_id": post_id,
                "created_by": host_user_id,
                "status": "OPEN",
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match res {
            Ok(_) => debug!("Chat room created for post {} (host {})", post_id, host_user_id),
            Err(e) => warn!("Chat room creation failed for post {}: {}", post_id, e),
        }
    }

    pub async fn add_member(&self, post_id: i64, user_id: i64) {
        let Some(base) = &self.base_url else {
            return;
        };
        let res = self
            .http
            .put(format!("{base}/rooms/{post_id}/members/{user_id}"))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("Chat member add failed for post {} user {}: {}", post_id, user_id, e);
        }
    }

    pub async fn remove_member(&self, post_id: i64, user_id: i64) {
        let Some(base) = &self.base_url else {
            return;
        };
        let res = self
            .http
            .delete(format!("{base}/rooms/{post_id}/members/{user_id}"))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("Chat member removal failed for post {} user {}: {}", post_id, user_id, e);
        }
    }

    pub async fn kick_member(&self, post_id: i64, host_user_id: i64, target_user_id: i64) {
        let Some(base) = &self.base_url else {
            return;
        };
        let res = self
            .http
            .post(format!("{base}/rooms/{post_id}/kick"))
            .json(&json!({
                "host_user_id": host_user_id,
                "target_user_id": target_user_id,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("Chat kick failed for post {} target {}: {}", post_id, target_user_id, e);
        }
    }

    pub async fn close_room(&self, post_id: i64) {
        let Some(base) = &self.base_url else {
            return;
        };
        let res = self
            .http
            .post(format!("{base}/rooms/{post_id}/close"))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("Chat room close failed for post {}: {}", post_id, e);
        }
    }
}
