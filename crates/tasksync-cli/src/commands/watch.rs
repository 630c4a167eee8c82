use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use super::{load_config, reconciler, CliResult};

/// Run a pass every `interval_secs` forever. A failed pass is logged and the
/// next tick runs as usual.
pub async fn run(interval_secs: Option<u64>) -> CliResult {
    let config = load_config()?;
    let secs = interval_secs.unwrap_or(config.trigger.interval_secs).max(1);
    let reconciler = reconciler(&config, false)?;

    let mut ticker = interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_secs = secs, "watching");

    loop {
        ticker.tick().await;
        match reconciler.run().await {
            Ok(summary) => tracing::debug!(%summary, "scheduled run done"),
            Err(err) => tracing::error!(error = %err, "scheduled run failed"),
        }
    }
}
