//! Call-out kvoter: avgjør om neste utfordring er tillatt gitt periodens tellere.
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalloutQuotaLimits {
    pub max_calls_per_period: u32,
    pub min_accept_rate: f64,
    /// Akseptraten vurderes først etter så mange kall
    pub min_calls_for_rate: u32,
    pub max_rejections: u32,
    pub period_hours: i64,
}

impl Default for CalloutQuotaLimits {
    fn default() -> Self {
        Self {
            max_calls_per_period: 5,
            min_accept_rate: 0.3,
            min_calls_for_rate: 3,
            max_rejections: 3,
            period_hours: 24,
        }
    }
}

/// Rullerende tellere per bruker. Eies og persisteres av kalleren.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalloutQuotaState {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "periodCalls")]
    pub period_calls: u32,
    #[serde(alias = "periodAccepted")]
    pub period_accepted: u32,
    #[serde(alias = "periodRejected")]
    pub period_rejected: u32,
    pub period_started_at: Option<DateTime<Utc>>,
    /// Overstyring per bruker; `None` = globale grenser
    pub limits: Option<CalloutQuotaLimits>,
}

impl CalloutQuotaState {
    /// Perioden er utløpt og tellerne skal regnes som null.
    /// En periodelengde chrono ikke kan representere utløper aldri.
    pub fn period_expired(&self, now: DateTime<Utc>, limits: &CalloutQuotaLimits) -> bool {
        match (self.period_started_at, Duration::try_hours(limits.period_hours)) {
            (Some(start), Some(period)) => now - start >= period,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaReason {
    QuotaExceeded,
    LowAcceptRate,
    TooManyRejections,
}

impl QuotaReason {
    pub fn code(&self) -> &'static str {
        match self {
            QuotaReason::QuotaExceeded => "quota_exceeded",
            QuotaReason::LowAcceptRate => "low_accept_rate",
            QuotaReason::TooManyRejections => "too_many_rejections",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reasons: Vec<QuotaReason>,
}

/// Evaluer tellerne som de står, uten periodeutløp.
pub fn enforce_callout_quotas(state: &CalloutQuotaState, limits: &CalloutQuotaLimits) -> QuotaDecision {
    let limits = state.limits.as_ref().unwrap_or(limits);
    let mut reasons = Vec::new();

    if state.period_calls >= limits.max_calls_per_period {
        reasons.push(QuotaReason::QuotaExceeded);
    }
    let accept_rate = state.period_accepted as f64 / state.period_calls.max(1) as f64;
    if state.period_calls >= limits.min_calls_for_rate && accept_rate < limits.min_accept_rate {
        reasons.push(QuotaReason::LowAcceptRate);
    }
    if state.period_rejected >= limits.max_rejections {
        reasons.push(QuotaReason::TooManyRejections);
    }

    for r in &reasons {
        telemetry::record_callout_denial(r.code());
    }
    debug!(
        "callout quota for '{}': calls={} accepted={} rejected={} -> {} reason(s)",
        state.user_id,
        state.period_calls,
        state.period_accepted,
        state.period_rejected,
        reasons.len()
    );
    QuotaDecision { allowed: reasons.is_empty(), reasons }
}

/// Som `enforce_callout_quotas`, men en utløpt periode nullstiller tellerne.
pub fn enforce_callout_quotas_at(
    state: &CalloutQuotaState,
    limits: &CalloutQuotaLimits,
    now: DateTime<Utc>,
) -> QuotaDecision {
    let effective = state.limits.as_ref().unwrap_or(limits);
    if state.period_expired(now, effective) {
        let fresh = CalloutQuotaState {
            period_calls: 0,
            period_accepted: 0,
            period_rejected: 0,
            period_started_at: Some(now),
            ..state.clone()
        };
        return enforce_callout_quotas(&fresh, limits);
    }
    enforce_callout_quotas(state, limits)
}
