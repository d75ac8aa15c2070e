// Prometheus-tellere i et eget crate-register.
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("valid counter definition");
    REGISTRY.register(Box::new(c.clone())).expect("counter registered once");
    c
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let c = IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition");
    REGISTRY.register(Box::new(c.clone())).expect("counter registered once");
    c
}

static REPS_EMITTED: Lazy<IntCounter> =
    Lazy::new(|| counter("velox_reps_emitted_total", "Completed reps emitted by the segmenter"));

static INTEGRITY_VIOLATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "velox_integrity_violations_total",
        "Integrity gate violations by reason",
        &["reason"],
    )
});

static VALIDATION_OUTLIERS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "velox_validation_outliers_total",
        "Trajectory samples flagged by the velocity validator",
        &["reason"],
    )
});

static BYLS_EVALUATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "velox_byls_evaluations_total",
        "Beat-your-last-score comparisons by outcome",
        &["outcome"],
    )
});

static CALLOUT_DENIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "velox_callout_denials_total",
        "Call-out quota denials by reason",
        &["reason"],
    )
});

pub fn record_rep_emitted() {
    REPS_EMITTED.inc();
}

pub fn record_integrity_violation(reason: &str) {
    INTEGRITY_VIOLATIONS.with_label_values(&[reason]).inc();
}

pub fn record_outlier(reason: &str) {
    VALIDATION_OUTLIERS.with_label_values(&[reason]).inc();
}

pub fn record_byls(outcome: &str) {
    BYLS_EVALUATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_callout_denial(reason: &str) {
    CALLOUT_DENIALS.with_label_values(&[reason]).inc();
}

pub fn reps_emitted_total() -> u64 {
    REPS_EMITTED.get()
}

/// Registeret i Prometheus tekstformat.
pub fn gather_text() -> String {
    // Sørg for at alle familier finnes selv før første hendelse
    Lazy::force(&REPS_EMITTED);
    Lazy::force(&INTEGRITY_VIOLATIONS);
    Lazy::force(&VALIDATION_OUTLIERS);
    Lazy::force(&BYLS_EVALUATIONS);
    Lazy::force(&CALLOUT_DENIALS);

    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&REGISTRY.gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
