//! Prometheus metrics for the assistant.
//!
//! HTTP request metrics come from the `metrics` facade via the recorder
//! installed here; question and publish counters live in a dedicated
//! registry and are appended to the same exposition.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static QUESTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static DOCUMENT_UPLOADS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GITHUB_PUSHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the recorder and register the custom collectors. Safe to call twice.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
        }
    }

    REGISTRY.get_or_init(build_registry);
}

fn build_registry() -> Registry {
    let registry = Registry::new();

    let questions = IntCounterVec::new(
        Opts::new("payguide_questions_total", "Questions answered by outcome"),
        &["status"],
    )
    .expect("Failed to create payguide_questions_total metric");

    let latency = HistogramVec::new(
        HistogramOpts::new(
            "payguide_provider_latency_seconds",
            "Model API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model"],
    )
    .expect("Failed to create payguide_provider_latency_seconds metric");

    // direction: input, output
    let tokens = IntCounterVec::new(
        Opts::new("payguide_tokens_total", "Tokens exchanged with the model"),
        &["direction"],
    )
    .expect("Failed to create payguide_tokens_total metric");

    let uploads = IntCounterVec::new(
        Opts::new(
            "payguide_document_uploads_total",
            "Pay Guide uploads to the model file store",
        ),
        &["status"],
    )
    .expect("Failed to create payguide_document_uploads_total metric");

    let pushes = IntCounterVec::new(
        Opts::new("payguide_github_pushes_total", "Pay Guide pushes to GitHub"),
        &["status"],
    )
    .expect("Failed to create payguide_github_pushes_total metric");

    for collector in [&questions, &tokens, &uploads, &pushes] {
        registry
            .register(Box::new(collector.clone()))
            .expect("Failed to register counter");
    }
    registry
        .register(Box::new(latency.clone()))
        .expect("Failed to register payguide_provider_latency_seconds");

    let _ = QUESTIONS_TOTAL.set(questions);
    let _ = PROVIDER_LATENCY_SECONDS.set(latency);
    let _ = TOKENS_TOTAL.set(tokens);
    let _ = DOCUMENT_UPLOADS_TOTAL.set(uploads);
    let _ = GITHUB_PUSHES_TOTAL.set(pushes);

    registry
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    if let Some(registry) = REGISTRY.get() {
        let mut buffer = Vec::new();
        if TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .is_ok()
        {
            output.push_str(&String::from_utf8_lossy(&buffer));
        }
    }

    if output.is_empty() {
        output.push_str("# Metrics not initialized\n");
    }
    output
}

pub fn record_question(status: &str) {
    if let Some(counter) = QUESTIONS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

pub fn record_provider_latency(model: &str, seconds: f64) {
    if let Some(histogram) = PROVIDER_LATENCY_SECONDS.get() {
        histogram.with_label_values(&[model]).observe(seconds);
    }
}

pub fn record_tokens(input: i32, output: i32) {
    if let Some(counter) = TOKENS_TOTAL.get() {
        counter
            .with_label_values(&["input"])
            .inc_by(input.max(0) as u64);
        counter
            .with_label_values(&["output"])
            .inc_by(output.max(0) as u64);
    }
}

pub fn record_document_upload(status: &str) {
    if let Some(counter) = DOCUMENT_UPLOADS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

pub fn record_github_push(status: &str) {
    if let Some(counter) = GITHUB_PUSHES_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}
