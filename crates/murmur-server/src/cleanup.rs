use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use murmur_api::AppState;

/// Background task that drops revocation entries whose token has expired.
///
/// An expired token fails signature validation on its own, so its
/// revocation row is dead weight once `expires_at` has passed.
pub async fn run_purge_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let now = Utc::now().timestamp();
        match state
            .store(move |db| Ok(db.purge_expired_revocations(now)?))
            .await
        {
            Ok(0) => debug!("Purge: no expired revocations"),
            Ok(count) => info!("Purge: removed {} expired revocations", count),
            Err(e) => warn!("Purge error: {}", e),
        }
    }
}
