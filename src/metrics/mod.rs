// Private module declaration
mod server;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Declaration commands accepted and rejected
// - Status transitions
// - Tracking number collisions
// - Company stats refreshes (outcome and duration)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Command Metrics
    pub declaration_commands: IntCounterVec,
    pub declaration_rejections: IntCounterVec,
    pub status_transitions: IntCounterVec,

    // Numbering Metrics
    pub tracking_number_collisions: IntCounter,

    // Projection Metrics
    pub stats_refresh: IntCounterVec,
    pub stats_refresh_duration: Histogram,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let declaration_commands = IntCounterVec::new(
            Opts::new("declaration_commands_total", "Declaration commands accepted"),
            &["command"],
        )?;
        registry.register(Box::new(declaration_commands.clone()))?;

        let declaration_rejections = IntCounterVec::new(
            Opts::new("declaration_rejections_total", "Declaration commands rejected, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(declaration_rejections.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("declaration_status_transitions_total", "Declaration status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let tracking_number_collisions = IntCounter::new(
            "tracking_number_collisions_total",
            "Tracking numbers drawn that were already in use",
        )?;
        registry.register(Box::new(tracking_number_collisions.clone()))?;

        let stats_refresh = IntCounterVec::new(
            Opts::new("stats_refresh_total", "Company stats refreshes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(stats_refresh.clone()))?;

        let stats_refresh_duration = Histogram::with_opts(
            HistogramOpts::new("stats_refresh_duration_seconds", "Company stats refresh duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(stats_refresh_duration.clone()))?;

        Ok(Self {
            registry,
            declaration_commands,
            declaration_rejections,
            status_transitions,
            tracking_number_collisions,
            stats_refresh,
            stats_refresh_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_command(&self, command: &str) {
        self.declaration_commands.with_label_values(&[command]).inc();
    }

    pub fn record_rejection(&self, kind: &str) {
        self.declaration_rejections.with_label_values(&[kind]).inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_collision(&self) {
        self.tracking_number_collisions.inc();
    }

    pub fn record_stats_refresh(&self, duration_secs: f64, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.stats_refresh.with_label_values(&[outcome]).inc();
        self.stats_refresh_duration.observe(duration_secs);
    }
}
