//! Sanity-gate for én rep: er metrikkene fysiologisk plausible?
//!
//! Hver sjekk legger til én uavhengig årsakskode. Policy-brudd er aldri feil,
//! de returneres som en liste slik at kalleren kan vise alle.
use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::models::RepMetrics;
use crate::telemetry;

/// Kostnad per brudd i integritetsscoren.
pub const PENALTY_PER_REASON: f64 = 0.2;

/// Minste form-score (ekstern) for leaderboard.
pub const LEADERBOARD_FORM_MIN: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementCategory {
    Bench,
    SquatDl,
    Olympic,
    Plyo,
    Isolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    Squat,
    Bench,
    Deadlift,
    Curl,
    Ohp,
    Row,
    HipThrust,
    Clean,
    Snatch,
    BoxJump,
    /// Generisk hengsel (RDL, good morning osv.)
    Hinge,
}

impl Exercise {
    pub fn category(&self) -> MovementCategory {
        match self {
            Exercise::Squat | Exercise::Deadlift | Exercise::HipThrust | Exercise::Hinge => {
                MovementCategory::SquatDl
            }
            Exercise::Bench | Exercise::Ohp | Exercise::Row => MovementCategory::Bench,
            Exercise::Clean | Exercise::Snatch => MovementCategory::Olympic,
            Exercise::BoxJump => MovementCategory::Plyo,
            Exercise::Curl => MovementCategory::Isolation,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        serde_json::from_value(serde_json::Value::String(key)).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityCeiling {
    pub concentric: f64,
    pub eccentric: f64,
}

/// Tak og grenser. Empiriske standardverdier, ikke verifiserte fysiologiske grenser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityLimits {
    pub velocity_ceilings: BTreeMap<MovementCategory, VelocityCeiling>,
    pub rom_min_fraction: BTreeMap<Exercise, f64>,
    pub default_rom_fraction: f64,
    pub default_rom_goal_m: f64,
    /// Lateral jerk-tak i centimeter, samme enhet som `IntegrityContext::lateral_jerk_cm`
    #[serde(alias = "lateral_jerk_max", alias = "lateralJerkCm")]
    pub lateral_jerk_max_cm: f64,
    pub min_fps: f64,
}

impl Default for IntegrityLimits {
    fn default() -> Self {
        let ceil = |concentric, eccentric| VelocityCeiling { concentric, eccentric };
        let velocity_ceilings = BTreeMap::from([
            (MovementCategory::SquatDl, ceil(2.0, 1.6)),
            (MovementCategory::Bench, ceil(1.8, 1.5)),
            (MovementCategory::Olympic, ceil(3.0, 2.5)),
            (MovementCategory::Plyo, ceil(3.5, 3.0)),
            (MovementCategory::Isolation, ceil(1.5, 1.5)),
        ]);
        let rom_min_fraction = BTreeMap::from([
            (Exercise::Squat, 0.9),
            (Exercise::Bench, 0.8),
            (Exercise::Deadlift, 0.9),
            (Exercise::Curl, 0.85),
            (Exercise::Ohp, 0.85),
            (Exercise::Row, 0.8),
            (Exercise::HipThrust, 0.85),
        ]);
        Self {
            velocity_ceilings,
            rom_min_fraction,
            default_rom_fraction: 0.9,
            default_rom_goal_m: 0.3,
            lateral_jerk_max_cm: 0.05,
            min_fps: 30.0,
        }
    }
}

impl IntegrityLimits {
    pub fn ceiling(&self, category: MovementCategory) -> Option<VelocityCeiling> {
        self.velocity_ceilings.get(&category).copied()
    }

    pub fn rom_fraction(&self, exercise: Exercise) -> f64 {
        self.rom_min_fraction
            .get(&exercise)
            .copied()
            .unwrap_or(self.default_rom_fraction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrityContext {
    pub category: MovementCategory,
    /// Sideveis jerk i centimeter, målt av kalleren
    #[serde(default, alias = "lateral_jerk", alias = "lateralJerkCm")]
    pub lateral_jerk_cm: Option<f64>,
    pub fps: f64,
    #[serde(default)]
    pub rom_goal_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityReason {
    PeakConVelExceeded,
    PeakEccVelExceeded,
    RomBelowMin,
    LateralJerkExceeded,
    LowFps,
    NonFiniteMetrics,
}

impl IntegrityReason {
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityReason::PeakConVelExceeded => "peak_con_vel_exceeded",
            IntegrityReason::PeakEccVelExceeded => "peak_ecc_vel_exceeded",
            IntegrityReason::RomBelowMin => "rom_below_min",
            IntegrityReason::LateralJerkExceeded => "lateral_jerk_exceeded",
            IntegrityReason::LowFps => "low_fps",
            IntegrityReason::NonFiniteMetrics => "non_finite_metrics",
        }
    }
}

impl fmt::Display for IntegrityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityVerdict {
    pub ok: bool,
    pub reasons: Vec<IntegrityReason>,
    pub score: f64,
}

impl IntegrityVerdict {
    pub fn from_reasons(reasons: Vec<IntegrityReason>) -> Self {
        Self { ok: reasons.is_empty(), score: integrity_score(reasons.len()), reasons }
    }
}

/// `max(0, 1 − 0.2·k)`.
pub fn integrity_score(reason_count: usize) -> f64 {
    (1.0 - PENALTY_PER_REASON * reason_count as f64).max(0.0)
}

/// Kjør alle sjekker på én rep.
pub fn check_rep(
    exercise: Exercise,
    metrics: &RepMetrics,
    ctx: &IntegrityContext,
    limits: &IntegrityLimits,
) -> IntegrityVerdict {
    let mut reasons = Vec::new();

    if let Some(ceiling) = limits.ceiling(ctx.category) {
        if metrics.peak_con_vel > ceiling.concentric {
            reasons.push(IntegrityReason::PeakConVelExceeded);
        }
        if metrics.peak_ecc_vel.abs() > ceiling.eccentric {
            reasons.push(IntegrityReason::PeakEccVelExceeded);
        }
    }

    let goal = ctx
        .rom_goal_m
        .filter(|g| g.is_finite() && *g > 0.0)
        .unwrap_or(limits.default_rom_goal_m);
    let rom_min = limits.rom_fraction(exercise) * goal;
    if metrics.rom_m.is_finite() && metrics.rom_m < rom_min {
        reasons.push(IntegrityReason::RomBelowMin);
    }

    if let Some(jerk) = ctx.lateral_jerk_cm {
        if jerk > limits.lateral_jerk_max_cm {
            reasons.push(IntegrityReason::LateralJerkExceeded);
        }
    }

    if !(ctx.fps >= limits.min_fps) {
        reasons.push(IntegrityReason::LowFps);
    }

    // NaN sammenlignes alltid falskt over; fang det eksplisitt
    if [metrics.rom_m, metrics.peak_con_vel, metrics.peak_ecc_vel]
        .iter()
        .any(|v| !v.is_finite())
    {
        reasons.push(IntegrityReason::NonFiniteMetrics);
    }

    for r in &reasons {
        telemetry::record_integrity_violation(r.code());
    }
    debug!("integrity {:?}: {} reason(s)", exercise, reasons.len());
    IntegrityVerdict::from_reasons(reasons)
}

/// Integritet og form er uavhengige porter; begge må passere.
pub fn is_leaderboard_eligible(verdict: &IntegrityVerdict, form_score: f64) -> bool {
    verdict.ok && form_score >= LEADERBOARD_FORM_MIN
}
