//! Binary runner utilities
//!
//! A binary implements [`BinaryRunner`]; `execute` wraps its main loop with
//! the startup banner, a final status report and the shutdown summary.
//! [`RunConfig::status_ticker`] paces the periodic `report_status` calls
//! inside the loop.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Seconds between status reports; clamped to at least one
    pub status_interval_secs: u64,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_interval_secs: 60,
        }
    }

    pub fn with_status_interval(mut self, secs: u64) -> Self {
        self.status_interval_secs = secs;
        self
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    /// Ticker for periodic status reports
    ///
    /// The first tick fires one interval from now rather than immediately,
    /// and ticks missed while the loop was busy are skipped.
    pub fn status_ticker(&self) -> Interval {
        let period = self.status_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }
}

/// Trait for binary applications
pub trait BinaryRunner {
    /// Run the application main loop
    async fn run(&mut self) -> anyhow::Result<()>;

    fn config(&self) -> &RunConfig;

    /// Log a one-line status report
    fn report_status(&self) {}

    /// Summary line printed on shutdown
    fn stats(&self) -> Option<String> {
        None
    }

    fn print_banner(&self) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("Starting {}", config.name);
        info!("Status every {}s, Ctrl+C to stop", config.status_interval().as_secs());
        info!("========================================");
        info!("");
    }

    fn print_shutdown(&self, stats: Option<&str>) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", config.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }

    /// Banner, main loop, final status, shutdown summary
    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let result = self.run().await;
        self.report_status();
        let stats = self.stats();
        self.print_shutdown(stats.as_deref());
        result
    }
}
