use std::sync::Arc;
use std::time::Duration;

use hearsay_bot::BotRuntime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically drops conversations that have been idle past the configured timeout.
pub fn spawn(runtime: Arc<BotRuntime>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let expired = runtime.sweep_expired();
            if expired > 0 {
                info!(
                    event_name = "dialogue.session.swept",
                    correlation_id = "sweeper",
                    expired,
                    active = runtime.active_sessions(),
                    "expired idle conversations"
                );
            } else {
                debug!(
                    event_name = "dialogue.session.sweep_idle",
                    correlation_id = "sweeper",
                    "nothing to sweep"
                );
            }
        }
    })
}
