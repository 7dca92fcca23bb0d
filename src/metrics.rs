// Service metrics — per-component request counters and latency histograms.
//
// Instruments are OpenTelemetry counters and histograms. A Prometheus
// exporter reads them into a private registry, and GET /metrics serves that
// registry in the text exposition format. One Metrics value is created in
// main and shared via Arc.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Registry, TextEncoder};

/// Upper bounds (seconds) of the latency histogram buckets. +Inf is implicit.
pub const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// The components whose work is counted and timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    ImageAnalysis,
    TextAnalysis,
    Context,
    Fusion,
    Orchestrator,
    Feedback,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::ImageAnalysis,
        Component::TextAnalysis,
        Component::Context,
        Component::Fusion,
        Component::Orchestrator,
        Component::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::ImageAnalysis => "image",
            Component::TextAnalysis => "text",
            Component::Context => "context",
            Component::Fusion => "fusion",
            Component::Orchestrator => "orchestrator",
            Component::Feedback => "feedback",
        }
    }

    fn label(&self) -> [KeyValue; 1] {
        [KeyValue::new("component", self.as_str())]
    }
}

/// Point-in-time counters for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSnapshot {
    pub requests: u64,
    pub failures: u64,
    pub observations: u64,
}

pub struct Metrics {
    registry: Registry,
    // Dropping the provider shuts the exporter down
    _provider: SdkMeterProvider,
    requests: Counter<u64>,
    failures: Counter<u64>,
    latency: Histogram<f64>,
    persistence_failures: Counter<u64>,
    retraining_triggers: Counter<u64>,
    retraining_failures: Counter<u64>,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .without_scope_info()
            .without_target_info()
            .build()
            .context("Failed to build Prometheus exporter")?;
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("crossmodal");

        let requests = meter
            .u64_counter("crossmodal.requests")
            .with_description("Units of work handled per component")
            .build();
        let failures = meter
            .u64_counter("crossmodal.failures")
            .with_description("Failed units of work per component")
            .build();
        let latency = meter
            .f64_histogram("crossmodal.latency.seconds")
            .with_description("Latency per component")
            .with_boundaries(LATENCY_BUCKETS.to_vec())
            .build();
        let persistence_failures = meter
            .u64_counter("crossmodal.persistence.failures")
            .with_description("Decisions that could not be written to the result store")
            .build();
        let retraining_triggers = meter
            .u64_counter("crossmodal.retraining.triggers")
            .with_description("Retraining runs started")
            .build();
        let retraining_failures = meter
            .u64_counter("crossmodal.retraining.failures")
            .with_description("Retraining runs that failed")
            .build();

        // Service-wide counters are exposed from the start, at zero
        for counter in [&persistence_failures, &retraining_triggers, &retraining_failures] {
            counter.add(0, &[]);
        }

        Ok(Self {
            registry,
            _provider: provider,
            requests,
            failures,
            latency,
            persistence_failures,
            retraining_triggers,
            retraining_failures,
        })
    }

    /// Count one unit of work and its latency. Failures are counted as
    /// requests too.
    pub fn record(&self, component: Component, elapsed: Duration, success: bool) {
        let label = component.label();
        self.requests.add(1, &label);
        if !success {
            self.failures.add(1, &label);
        }
        self.latency.record(elapsed.as_secs_f64(), &label);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.add(1, &[]);
    }

    pub fn record_retraining_trigger(&self) {
        self.retraining_triggers.add(1, &[]);
    }

    pub fn record_retraining_failure(&self) {
        self.retraining_failures.add(1, &[]);
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .context("Failed to encode metrics")
    }

    /// Current value of one exposed sample, e.g.
    /// `crossmodal_requests_total{component="image"}`. Series that have not
    /// been recorded yet read as 0.
    pub fn sample(&self, series: &str) -> Result<f64> {
        let text = self.render_prometheus()?;
        for line in text.lines().filter(|l| !l.starts_with('#')) {
            if let Some((name, value)) = line.rsplit_once(' ') {
                if name == series {
                    return value
                        .parse()
                        .with_context(|| format!("Bad sample value for {series}: {value}"));
                }
            }
        }
        Ok(0.0)
    }

    pub fn snapshot(&self, component: Component) -> Result<ComponentSnapshot> {
        let c = component.as_str();
        Ok(ComponentSnapshot {
            requests: self.sample(&format!("crossmodal_requests_total{{component=\"{c}\"}}"))? as u64,
            failures: self.sample(&format!("crossmodal_failures_total{{component=\"{c}\"}}"))? as u64,
            observations: self
                .sample(&format!("crossmodal_latency_seconds_count{{component=\"{c}\"}}"))?
                as u64,
        })
    }

    pub fn persistence_failures(&self) -> Result<u64> {
        Ok(self.sample("crossmodal_persistence_failures_total")? as u64)
    }

    pub fn retraining_triggers(&self) -> Result<u64> {
        Ok(self.sample("crossmodal_retraining_triggers_total")? as u64)
    }

    pub fn retraining_failures(&self) -> Result<u64> {
        Ok(self.sample("crossmodal_retraining_failures_total")? as u64)
    }
}
