use log::warn;
use serde::{Deserialize, Serialize};

use crate::models::{Phase, RepMetrics};

/// Standard tyngdeakselerasjon brukt i kraftberegningen (m/s²).
pub const G: f64 = 9.81;

/// Generisk minimum velocity threshold ved 1RM (m/s).
pub const MVT_DEFAULT: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Hastighet ved 1RM (m/s) for LV-ekstrapolering
    pub one_rm_velocity: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { one_rm_velocity: MVT_DEFAULT }
    }
}

/// Kanonisk input for én rep. Alle serier har samme lengde.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepInputs {
    pub mass_kg: f64,
    pub position_m: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub t_ms: Vec<f64>,
    pub phases: Vec<Phase>,
}

impl RepInputs {
    fn is_well_formed(&self) -> bool {
        let n = self.t_ms.len();
        n > 0
            && self.velocity.len() == n
            && self.acceleration.len() == n
            && self.position_m.len() == n
            && self.phases.len() == n
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() { f64::NAN } else { xs.iter().sum::<f64>() / xs.len() as f64 }
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NAN, f64::max)
}

/// Per-rep metrikker. Feilformet input gir NaN-metrikker, aldri panikk.
pub fn compute_rep_metrics(inputs: &RepInputs) -> RepMetrics {
    if !inputs.is_well_formed() {
        return RepMetrics::nan();
    }
    let n = inputs.t_ms.len();

    let mut v_con = Vec::new();
    let mut v_ecc_abs = Vec::new();
    for (v, phase) in inputs.velocity.iter().zip(inputs.phases.iter()) {
        match phase {
            Phase::Concentric => v_con.push(*v),
            Phase::Eccentric => v_ecc_abs.push(v.abs()),
            Phase::Isometric => {}
        }
    }

    // MPV: snitt av alle positive hastighetssamples
    let positive: Vec<f64> = inputs.velocity.iter().copied().filter(|v| *v > 0.0).collect();

    let pos_max = inputs.position_m.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let pos_min = inputs.position_m.iter().copied().fold(f64::INFINITY, f64::min);

    // P = F · v = m · (g + a) · v, toppverdi
    let power_w = if inputs.mass_kg > 0.0 {
        inputs
            .velocity
            .iter()
            .zip(inputs.acceleration.iter())
            .map(|(v, a)| inputs.mass_kg * (G + a) * v)
            .fold(0.0, f64::max)
    } else {
        f64::NAN
    };

    RepMetrics {
        mean_con_vel: mean(&v_con),
        peak_con_vel: max(&v_con),
        mean_ecc_vel: mean(&v_ecc_abs),
        peak_ecc_vel: max(&v_ecc_abs),
        mpv: mean(&positive),
        rom_m: pos_max - pos_min,
        tut_ms: inputs.t_ms[n - 1] - inputs.t_ms[0],
        power_w,
        vel_loss_pct: f64::NAN,
        lv_slope: None,
        est_1rm: None,
    }
}

/// Lineær last–hastighet-profil: v = slope · kg + intercept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadVelocityProfile {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n: usize,
}

impl LoadVelocityProfile {
    /// Hastigheten må falle med økende last.
    pub fn is_plausible(&self) -> bool {
        self.slope < 0.0
    }
}

/// Enkel lineær regresjon av hastighet mot last.
/// `None` ved < 2 punkter eller < 2 distinkte laster.
pub fn fit_load_velocity(points: &[(f64, f64)]) -> Option<LoadVelocityProfile> {
    let pts: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(m, v)| m.is_finite() && v.is_finite())
        .collect();
    if pts.len() < 2 {
        return None;
    }
    let first_mass = pts[0].0;
    if pts.iter().all(|(m, _)| *m == first_mass) {
        return None;
    }

    let n = pts.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (x, y) in &pts {
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    let denom = n * sxx - sx * sx;
    if denom.abs() < 1e-12 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / n;

    let y_mean = sy / n;
    let ss_tot: f64 = pts.iter().map(|(_, y)| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = pts.iter().map(|(x, y)| (y - (slope * x + intercept)).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Some(LoadVelocityProfile { slope, intercept, r_squared, n: pts.len() })
}

/// Løs profilen for `v_threshold`: (v − b) / a.
pub fn estimate_one_rep_max(profile: &LoadVelocityProfile, v_threshold: f64) -> Option<f64> {
    if profile.slope == 0.0 || !profile.slope.is_finite() {
        return None;
    }
    let est = (v_threshold - profile.intercept) / profile.slope;
    if est.is_finite() { Some(est) } else { None }
}

/// Sett-nivå: velocity loss mot første rep, LV-slope og estimert 1RM på hver rep.
pub fn compute_set_metrics(reps: &[RepInputs]) -> Vec<RepMetrics> {
    compute_set_metrics_with(reps, &MetricsConfig::default())
}

pub fn compute_set_metrics_with(reps: &[RepInputs], cfg: &MetricsConfig) -> Vec<RepMetrics> {
    if reps.is_empty() {
        return Vec::new();
    }
    let mut per_rep: Vec<RepMetrics> = reps.iter().map(compute_rep_metrics).collect();

    let base = per_rep[0].mean_con_vel;
    if base.is_finite() && base > 0.0 {
        for m in per_rep.iter_mut() {
            m.vel_loss_pct = if m.mean_con_vel.is_finite() {
                (base - m.mean_con_vel) / base * 100.0
            } else {
                f64::NAN
            };
        }
    }

    let points: Vec<(f64, f64)> = reps
        .iter()
        .zip(per_rep.iter())
        .map(|(r, m)| (r.mass_kg, m.mean_con_vel))
        .collect();

    if let Some(profile) = fit_load_velocity(&points) {
        if !profile.is_plausible() {
            warn!(
                "load-velocity slope {:.5} is non-negative over {} reps; est. 1RM not trustworthy",
                profile.slope, profile.n
            );
        }
        let est = estimate_one_rep_max(&profile, cfg.one_rm_velocity);
        for m in per_rep.iter_mut() {
            m.lv_slope = Some(profile.slope);
            m.est_1rm = est;
        }
    }

    per_rep
}
