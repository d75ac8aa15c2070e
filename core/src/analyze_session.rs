//! Sett-pipeline: kondisjonering → segmentering → metrikker → validering → integritet.
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::calibration::{frames_to_meters, Calibration};
use crate::config::CoreConfig;
use crate::integrity::{check_rep, is_leaderboard_eligible, Exercise, IntegrityContext, IntegrityVerdict};
use crate::io::rep_inputs_from_window;
use crate::metrics::{compute_set_metrics_with, fit_load_velocity, LoadVelocityProfile, RepInputs};
use crate::models::{FrameSample, Phase, RepEvent, RepMetrics, ValidationResult};
use crate::segmentation::RepSegmenter;
use crate::smoothing::{compute_kinematics_with, frame_rate, mean_dt_s};
use crate::validation::validate_frames;

fn default_exercise() -> Exercise {
    Exercise::Squat
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInputs {
    #[serde(default = "default_exercise")]
    pub exercise: Exercise,
    #[serde(default)]
    pub mass_kg: f64,
    /// `None` = `position` er allerede i meter
    #[serde(default)]
    pub calibration: Option<Calibration>,
    /// Forventet samplingsintervall; `None` = målt snitt
    #[serde(default)]
    pub expected_interval_ms: Option<f64>,
    /// Sideveis jerk i centimeter
    #[serde(default, alias = "lateral_jerk")]
    pub lateral_jerk_cm: Option<f64>,
    #[serde(default)]
    pub rom_goal_m: Option<f64>,
    /// Ekstern form-score; uten den er ingen rep leaderboard-kvalifisert
    #[serde(default)]
    pub form_score: Option<f64>,
    #[serde(default)]
    pub config: CoreConfig,
}

impl SessionInputs {
    pub fn new(exercise: Exercise, mass_kg: f64) -> Self {
        Self {
            exercise,
            mass_kg,
            calibration: None,
            expected_interval_ms: None,
            lateral_jerk_cm: None,
            rom_goal_m: None,
            form_score: None,
            config: CoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepReport {
    pub index: usize,
    pub event: RepEvent,
    pub metrics: RepMetrics,
    pub validation: ValidationResult,
    pub integrity: IntegrityVerdict,
    pub leaderboard_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetReport {
    pub exercise: Exercise,
    pub mass_kg: f64,
    pub fps: f64,
    pub reps: Vec<RepReport>,
    pub load_velocity: Option<LoadVelocityProfile>,
}

impl SetReport {
    pub fn rep_count(&self) -> usize {
        self.reps.len()
    }

    pub fn mean_confidence(&self) -> f64 {
        if self.reps.is_empty() {
            return f64::NAN;
        }
        self.reps.iter().map(|r| r.validation.confidence).sum::<f64>() / self.reps.len() as f64
    }
}

/// Kjør hele kjeden på ett bufret sett.
pub fn analyze_set(frames: &[FrameSample], inputs: &SessionInputs) -> SetReport {
    let cfg = &inputs.config;

    // 1) Kalibrer til meter; segmenteringen ser samme enheter som metrikkene
    let meters = frames_to_meters(frames, inputs.calibration.as_ref());
    let calibrated: Vec<FrameSample> = frames
        .iter()
        .zip(meters.iter())
        .map(|(f, &y)| FrameSample { position: y, pixel: None, ..*f })
        .collect();
    let ts: Vec<f64> = calibrated.iter().map(|f| f.t_ms).collect();
    let kin = compute_kinematics_with(&meters, &ts, &cfg.kinematics);

    let dt_ms = inputs
        .expected_interval_ms
        .filter(|d| d.is_finite() && *d > 0.0)
        .or_else(|| mean_dt_s(&ts).map(|s| s * 1000.0))
        .unwrap_or(f64::NAN);
    let fps = frame_rate(dt_ms);

    // 2) Segmenter på kondisjonert hastighet, og merk fasen per sample
    let mut seg = RepSegmenter::with_thresholds(cfg.segmentation.effective_thresholds());
    let mut labels: Vec<Option<Phase>> = Vec::with_capacity(calibrated.len());
    for (i, f) in calibrated.iter().enumerate() {
        match kin.velocity.get(i) {
            Some(&v) => seg.ingest_with_velocity(f, v),
            None => seg.ingest(f),
        };
        labels.push(seg.phase());
    }
    let events = seg.finish();
    info!(
        "analyze_set: {} frames, {} reps ({:?}, {:.1} kg)",
        frames.len(),
        events.len(),
        inputs.exercise,
        inputs.mass_kg
    );

    // 3) Rep-vinduer
    let windows: Vec<(usize, usize)> = events
        .iter()
        .map(|ev| {
            let lo = ts.partition_point(|t| *t < ev.start_ms);
            let hi = ts.partition_point(|t| *t <= ev.end_ms);
            (lo, hi)
        })
        .collect();

    let rep_inputs: Vec<RepInputs> = windows
        .iter()
        .map(|&(lo, hi)| rep_inputs_from_window(&kin, &ts, &labels, lo..hi, inputs.mass_kg))
        .collect();

    // 4) Metrikker (sett-nivå felter skrives på alle reps)
    let metrics = compute_set_metrics_with(&rep_inputs, &cfg.metrics);

    let points: Vec<(f64, f64)> = rep_inputs
        .iter()
        .zip(metrics.iter())
        .map(|(r, m)| (r.mass_kg, m.mean_con_vel))
        .collect();
    let load_velocity = fit_load_velocity(&points);

    // 5–6) Validering og integritet per rep
    let ctx = IntegrityContext {
        category: inputs.exercise.category(),
        lateral_jerk_cm: inputs.lateral_jerk_cm,
        fps,
        rom_goal_m: inputs.rom_goal_m,
    };
    let reps: Vec<RepReport> = events
        .iter()
        .zip(windows.iter())
        .zip(metrics.iter())
        .enumerate()
        .map(|(index, ((event, &(lo, hi)), m))| {
            let validation = validate_frames(&calibrated[lo..hi], dt_ms, None, &cfg.validation);
            let integrity = check_rep(inputs.exercise, m, &ctx, &cfg.integrity);
            let leaderboard_eligible = inputs
                .form_score
                .map(|form| is_leaderboard_eligible(&integrity, form))
                .unwrap_or(false);
            debug!(
                "rep {}: mean_con_vel={:.3} confidence={:.2} integrity={:.2}",
                index, m.mean_con_vel, validation.confidence, integrity.score
            );
            RepReport {
                index,
                event: *event,
                metrics: *m,
                validation,
                integrity,
                leaderboard_eligible,
            }
        })
        .collect();

    SetReport { exercise: inputs.exercise, mass_kg: inputs.mass_kg, fps, reps, load_velocity }
}
