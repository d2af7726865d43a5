//! The notification watcher: registers the squad, makes sure every agent
//! has a heartbeat job, then delivers notifications until shut down.

mod cron;
mod delivery;
#[cfg(test)]
pub(crate) mod fakes;
mod registry;

pub use cron::{BootstrapReport, ensure_heartbeats, heartbeat_job};
pub use delivery::{CycleReport, DeliveryLoop};
pub use registry::{register_agents, registration};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{Endpoints, SquadConfig};
use crate::error::ExitError;
use crate::gateway::{Gateway, GatewayClient};
use crate::store::{ConvexClient, NotificationStore};
use crate::template::NotificationFormatter;

/// Granularity of shutdown checks while sleeping between cycles.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Start the watcher against the endpoints in the environment.
///
/// Fails before doing any work when an endpoint variable is missing or the
/// notification template does not compile. Otherwise only returns once
/// `shutdown` is set.
pub fn run(config: &SquadConfig, shutdown: &AtomicBool) -> anyhow::Result<()> {
    let endpoints = Endpoints::for_watcher()?;
    let formatter = NotificationFormatter::new(config.delivery.template.as_deref())
        .map_err(|e| ExitError::Config(format!("invalid delivery.template: {e}")))?;

    tracing::info!(
        convex = %endpoints.convex_url,
        openclaw = %endpoints.openclaw_url,
        poll_interval_ms = config.delivery.poll_interval_ms,
        "watcher starting"
    );

    let store = ConvexClient::new(&endpoints.convex_url);
    let gateway = GatewayClient::new(&endpoints.openclaw_url, &endpoints.openclaw_token);

    let cycles = serve(&store, &gateway, &formatter, config, shutdown);
    tracing::info!(cycles, "watcher stopped");
    Ok(())
}

/// Startup (registration, heartbeat bootstrap) followed by the delivery
/// loop. Returns the number of completed cycles.
pub fn serve<S: NotificationStore, G: Gateway>(
    store: &S,
    gateway: &G,
    formatter: &NotificationFormatter,
    config: &SquadConfig,
    shutdown: &AtomicBool,
) -> u64 {
    let registered = register_agents(store, &config.agents);
    tracing::info!(registered, total = config.agents.len(), "agent registration complete");

    let bootstrap = ensure_heartbeats(gateway, &config.agents, &config.heartbeat);
    tracing::info!(
        existing = bootstrap.existing.len(),
        added = bootstrap.added.len(),
        failed = bootstrap.failed.len(),
        skipped = bootstrap.skipped,
        "heartbeat setup complete"
    );

    let delivery = DeliveryLoop::new(store, gateway, formatter, config.delivery.send_timeout_secs);
    tracing::info!("starting notification delivery loop");

    let mut cycles = 0;
    while !shutdown.load(Ordering::Relaxed) {
        let _span = tracing::debug_span!("cycle", n = cycles).entered();
        match delivery.run_cycle() {
            Ok(report) => tracing::debug!(
                agents = report.agents_checked,
                delivered = report.delivered,
                failed = report.failed,
                agent_errors = report.agent_errors,
                "cycle complete"
            ),
            Err(e) => tracing::error!(error = %e, "delivery cycle failed"),
        }
        cycles += 1;
        sleep_unless_shutdown(config.delivery.poll_interval(), shutdown);
    }
    cycles
}

/// Sleep for `duration`, waking early once `shutdown` is set.
fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(SHUTDOWN_POLL));
    }
}
