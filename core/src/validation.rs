//! Velocity Validator: vurderer datakvaliteten i en rå trajectory.
//!
//! Resultatet er rådgivende. Input muteres aldri; en reparert hastighetsserie
//! rapporteres ved siden av outlier-listen, men alle `Jump` står alltid i listen.

use log::warn;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::models::{FrameSample, Outlier, OutlierReason, ValidationResult};
use crate::smoothing::{differentiate, frame_rate, savgol_smooth};
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub t_ms: f64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub score: Option<f64>,
}

impl From<&FrameSample> for TrajectoryPoint {
    fn from(f: &FrameSample) -> Self {
        match f.pixel {
            Some(p) => TrajectoryPoint { t_ms: f.t_ms, x: p.x, y: p.y, score: f.score },
            None => TrajectoryPoint { t_ms: f.t_ms, x: 0.0, y: f.position, score: f.score },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Fysisk plausibel maks-hastighet; én-frame forflytning over dette = Jump (m/s)
    pub max_speed_mps: f64,
    /// Antall påfølgende Jump-frames før nytt nivå aksepteres
    pub jump_accept_after: usize,
    /// Halvvindu for lokal median (Spike)
    pub spike_half_window: usize,
    /// Avvik fra lokal trend som regnes som Spike (m)
    pub spike_threshold_m: f64,
    /// Minste lengde på en "frossen" serie (identiske verdier) som regnes som Gap
    pub frozen_run: usize,
    pub frozen_eps: f64,
    /// En frossen serie er bare Gap når tracker-scoren i serien er under dette.
    /// Et ekte hold med god score er stillstand, ikke tapt tracking.
    pub frozen_max_score: f64,
    /// Grid-lengde over dette × antall punkter gir degenerert resultat
    pub max_grid_factor: f64,
    /// Snap-toleranse mot grid, andel av dt
    pub snap_fraction: f64,
    /// Hull større enn dette (× dt) gir Gap
    pub gap_factor: f64,
    pub smooth_window: usize,
    pub poly_order: usize,
    pub min_fps: f64,
    pub outlier_weight: f64,
    pub gap_weight: f64,
    pub score_weight: f64,
    pub fps_weight: f64,
    pub roughness_weight: f64,
    pub heavy_gap_rate: f64,
    pub heavy_gap_penalty: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_speed_mps: 5.0,
            jump_accept_after: 3,
            spike_half_window: 3,
            spike_threshold_m: 0.02,
            frozen_run: 5,
            frozen_eps: 1e-6,
            frozen_max_score: 0.5,
            max_grid_factor: 4.0,
            snap_fraction: 0.25,
            gap_factor: 1.5,
            smooth_window: 9,
            poly_order: 3,
            min_fps: 30.0,
            outlier_weight: 0.5,
            gap_weight: 0.8,
            score_weight: 0.1,
            fps_weight: 0.5,
            roughness_weight: 0.3,
            heavy_gap_rate: 0.25,
            heavy_gap_penalty: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GridSample {
    y: f64,
    score: Option<f64>,
    missing: bool,
}

/// Resample til fast grid. Hull > `gap_factor`·dt markeres som manglende.
/// `None` når tidsaksen spenner urimelig mange grid-steg i forhold til antall punkter.
fn resample_to_grid(points: &[TrajectoryPoint], dt_ms: f64, cfg: &ValidatorConfig) -> Option<Vec<GridSample>> {
    let t0 = points[0].t_ms;
    let t_end = points[points.len() - 1].t_ms;
    let steps = ((t_end - t0) / dt_ms + 1e-6).floor();
    let limit = cfg.max_grid_factor.max(1.0) * points.len() as f64;
    if !steps.is_finite() || steps + 1.0 > limit {
        warn!(
            "validation: {:.0} ms span at {:.2} ms interval is too long for {} points",
            t_end - t0,
            dt_ms,
            points.len()
        );
        return None;
    }
    let count = steps as usize + 1;
    let snap = dt_ms * cfg.snap_fraction;
    let last = points.len() - 1;

    let mut grid = Vec::with_capacity(count);
    let mut j = 0usize;
    for k in 0..count {
        let t = t0 + k as f64 * dt_ms;
        while j < last && points[j + 1].t_ms < t {
            j += 1;
        }
        let p0 = points[j];
        let p1 = points[(j + 1).min(last)];

        if (p0.t_ms - t).abs() <= snap {
            grid.push(GridSample { y: p0.y, score: p0.score, missing: false });
        } else if (p1.t_ms - t).abs() <= snap {
            grid.push(GridSample { y: p1.y, score: p1.score, missing: false });
        } else if p0.t_ms <= t && t <= p1.t_ms && p1.t_ms > p0.t_ms {
            let r = (t - p0.t_ms) / (p1.t_ms - p0.t_ms);
            let score = match (p0.score, p1.score) {
                (Some(a), Some(b)) => Some(a * (1.0 - r) + b * r),
                (a, b) => a.or(b),
            };
            grid.push(GridSample {
                y: p0.y + r * (p1.y - p0.y),
                score,
                missing: (p1.t_ms - p0.t_ms) > dt_ms * cfg.gap_factor,
            });
        } else {
            let src = if p1.t_ms < t { p1 } else { p0 };
            grid.push(GridSample { y: src.y, score: src.score, missing: true });
        }
    }
    Some(grid)
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by_key(|v| OrderedFloat(*v));
    values[values.len() / 2]
}

fn mean_std(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    (mean, var.max(0.0).sqrt())
}

/// Lineær reparasjon av flaggede samples mellom nærmeste gode naboer.
fn repair(values: &[f64], bad: &[bool]) -> Vec<f64> {
    let good: Vec<usize> = (0..values.len()).filter(|&i| !bad[i]).collect();
    if good.is_empty() {
        return values.to_vec();
    }
    let mut out = values.to_vec();
    for i in 0..values.len() {
        if !bad[i] {
            continue;
        }
        let right = good.partition_point(|&g| g < i);
        out[i] = match (right.checked_sub(1).map(|l| good[l]), good.get(right).copied()) {
            (Some(l), Some(r)) => {
                let f = (i - l) as f64 / (r - l) as f64;
                values[l] + f * (values[r] - values[l])
            }
            (Some(l), None) => values[l],
            (None, Some(r)) => values[r],
            (None, None) => values[i],
        };
    }
    out
}

/// Snitt-score under grensen. Uten score finnes ingen indikasjon på tapt tracking.
fn weak_tracking(run: &[GridSample], max_score: f64) -> bool {
    let scores: Vec<f64> = run.iter().filter_map(|g| g.score).collect();
    !scores.is_empty() && scores.iter().sum::<f64>() / (scores.len() as f64) < max_score
}

#[inline]
fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Vurder en rå `(t, x, y, score)`-trajectory mot forventet samplingsintervall.
pub fn validate_trajectory(
    points: &[TrajectoryPoint],
    expected_interval_ms: f64,
    calibration: Option<&Calibration>,
    cfg: &ValidatorConfig,
) -> ValidationResult {
    if !expected_interval_ms.is_finite() || expected_interval_ms <= 0.0 {
        return ValidationResult::degenerate();
    }

    // Kalibrer til meter og sorter på tid
    let mut pts: Vec<TrajectoryPoint> = points
        .iter()
        .filter(|p| p.t_ms.is_finite() && p.x.is_finite() && p.y.is_finite())
        .map(|p| match calibration {
            Some(cal) => {
                let proj = cal.project(p.x, p.y);
                TrajectoryPoint { y: if proj.degenerate { f64::NAN } else { proj.y }, ..*p }
            }
            None => *p,
        })
        .filter(|p| p.y.is_finite())
        .collect();
    if pts.len() < 2 {
        return ValidationResult::degenerate();
    }
    pts.sort_by_key(|p| OrderedFloat(p.t_ms));

    let dt_ms = expected_interval_ms;
    let dt_s = dt_ms / 1000.0;
    let grid = match resample_to_grid(&pts, dt_ms, cfg) {
        Some(g) => g,
        None => return ValidationResult::degenerate(),
    };
    let n = grid.len();
    let y: Vec<f64> = grid.iter().map(|g| g.y).collect();
    let mut reasons: Vec<Option<OutlierReason>> = vec![None; n];

    // 1) Jump: forflytning over fysisk plausibel grense mot siste aksepterte sample
    let max_step = cfg.max_speed_mps * dt_s;
    let mut reference = 0usize;
    let mut streak = 0usize;
    for i in 1..n {
        let allowed = max_step * (i - reference) as f64;
        if (y[i] - y[reference]).abs() > allowed {
            reasons[i] = Some(OutlierReason::Jump);
            streak += 1;
            if streak > cfg.jump_accept_after {
                reference = i;
                streak = 0;
            }
        } else {
            reference = i;
            streak = 0;
        }
    }

    // 2) Gap: manglende frames, eller frossen tracker (identiske verdier med svak score)
    for (i, g) in grid.iter().enumerate() {
        if g.missing && reasons[i].is_none() {
            reasons[i] = Some(OutlierReason::Gap);
        }
    }
    let mut run_start = 0usize;
    for i in 1..=n {
        let frozen = i < n
            && !grid[i].missing
            && !grid[i - 1].missing
            && (y[i] - y[i - 1]).abs() < cfg.frozen_eps;
        if !frozen {
            if i - run_start >= cfg.frozen_run.max(2)
                && weak_tracking(&grid[run_start..i], cfg.frozen_max_score)
            {
                for r in reasons.iter_mut().take(i).skip(run_start) {
                    if r.is_none() {
                        *r = Some(OutlierReason::Gap);
                    }
                }
            }
            run_start = i;
        }
    }

    // 3) Spike: isolert avvik fra lokal median
    let hw = cfg.spike_half_window.max(1);
    let mut roughness_acc = 0.0;
    let mut roughness_n = 0usize;
    for i in 0..n {
        if grid[i].missing {
            continue;
        }
        let lo = i.saturating_sub(hw);
        let hi = (i + hw).min(n - 1);
        let mut window: Vec<f64> = y[lo..=hi].to_vec();
        let residual = (y[i] - median(&mut window)).abs();

        let capped = residual.min(cfg.spike_threshold_m);
        roughness_acc += capped * capped;
        roughness_n += 1;

        if reasons[i].is_none() && residual > cfg.spike_threshold_m {
            reasons[i] = Some(OutlierReason::Spike);
        }
    }

    let outliers: Vec<Outlier> = reasons
        .iter()
        .enumerate()
        .filter_map(|(index, r)| r.map(|reason| Outlier { index, reason }))
        .collect();
    for o in &outliers {
        telemetry::record_outlier(o.reason.code());
    }

    // 4) Reparer Jump/Spike, glatt og derivér
    let bad: Vec<bool> = reasons
        .iter()
        .map(|r| matches!(r, Some(OutlierReason::Jump) | Some(OutlierReason::Spike)))
        .collect();
    let repaired = repair(&y, &bad);
    let smoothed = savgol_smooth(&repaired, cfg.smooth_window, cfg.poly_order);
    let velocity = differentiate(&smoothed, dt_s);
    let (velocity_mean, velocity_std) = mean_std(&velocity);

    // 5) Confidence
    let total = n.max(1) as f64;
    let outlier_rate = bad.iter().filter(|b| **b).count() as f64 / total;
    let gap_rate = outliers.iter().filter(|o| o.reason == OutlierReason::Gap).count() as f64 / total;
    let mean_score = grid.iter().map(|g| g.score.unwrap_or(1.0)).sum::<f64>() / total;
    let fps = frame_rate(dt_ms);
    let fps_shortfall = clamp01(1.0 - fps / cfg.min_fps);
    let roughness = if roughness_n > 0 {
        (roughness_acc / roughness_n as f64).sqrt() / cfg.spike_threshold_m
    } else {
        0.0
    };

    let mut penalty = cfg.outlier_weight * outlier_rate
        + cfg.gap_weight * gap_rate
        + cfg.score_weight * clamp01(1.0 - mean_score)
        + cfg.fps_weight * fps_shortfall
        + cfg.roughness_weight * clamp01(roughness);
    if gap_rate > cfg.heavy_gap_rate {
        penalty += cfg.heavy_gap_penalty;
    }

    let half = (cfg.smooth_window / 2) as f64;
    ValidationResult {
        confidence: clamp01(1.0 - penalty),
        velocity_std,
        velocity_mean,
        outliers,
        velocity,
        latency_ms: half * dt_ms,
        window_ms: cfg.smooth_window as f64 * dt_ms,
    }
}

/// Bekvemmelighet: valider en frame-serie direkte.
pub fn validate_frames(
    frames: &[FrameSample],
    expected_interval_ms: f64,
    calibration: Option<&Calibration>,
    cfg: &ValidatorConfig,
) -> ValidationResult {
    let points: Vec<TrajectoryPoint> = frames.iter().map(TrajectoryPoint::from).collect();
    validate_trajectory(&points, expected_interval_ms, calibration, cfg)
}
