pub mod agent;
pub mod chat;
pub mod cron;
pub mod feed;
pub mod init;
pub mod schema;
pub mod tasks;
pub mod watch;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use serde::Serialize;

use crate::config;
use crate::store::ConvexClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Store client for `CONVEX_URL`.
pub fn store() -> anyhow::Result<ConvexClient> {
    Ok(ConvexClient::new(&config::convex_url()?))
}

/// A flag raised on Ctrl-C or SIGTERM.
pub fn interrupt_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("installing Ctrl-C handler")?;
    Ok(flag)
}

/// Local wall-clock rendering of a store timestamp (ms since epoch).
#[allow(clippy::cast_possible_truncation)]
pub fn local_time(ms: f64, with_date: bool) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64).map_or_else(
        || "unknown".to_string(),
        |t| {
            let local = t.with_timezone(&chrono::Local);
            if with_date {
                local.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                local.format("%H:%M:%S").to_string()
            }
        },
    )
}
