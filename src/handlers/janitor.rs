use crate::admin::expire_idle;
use crate::BotState;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Hourly sweep of admin flows and name prompts idle past the configured
/// time-to-live.
pub async fn start_admin_janitor(state: Arc<BotState>) {
    let mut ticker = interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        sweep_admin_flows(&state).await;
        sweep_pending_names(&state).await;
    }
}

pub async fn sweep_admin_flows(state: &BotState) -> usize {
    let mut flows = match state.acquire_flows_lock().await {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("Failed to acquire lock in admin janitor: {}", e);
            return 0;
        }
    };
    let removed = expire_idle(&mut flows, Instant::now(), state.config.admin_flow_ttl);
    if removed > 0 {
        log::info!("Expired {} idle admin flows", removed);
    }
    removed
}

pub async fn sweep_pending_names(state: &BotState) -> usize {
    let removed = state
        .expire_pending_names(Instant::now(), state.config.admin_flow_ttl)
        .await;
    if removed > 0 {
        log::info!("Dropped {} unanswered name prompts", removed);
    }
    removed
}
