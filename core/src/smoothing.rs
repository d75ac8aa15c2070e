use serde::{Deserialize, Serialize};

use crate::calibration::{frames_to_meters, Calibration};
use crate::linalg::solve_linear_system;
use crate::models::{FrameSample, KinematicSeries};

/// Vindu for glatting av posisjon/hastighet, uttrykt i tid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub window_s: f64,
    pub min_window: usize,
    pub max_window: usize,
    pub poly_order: usize,
    pub smooth_velocity: bool,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            window_s: 0.2,
            min_window: 5,
            max_window: 31,
            poly_order: 3,
            smooth_velocity: true,
        }
    }
}

impl KinematicsConfig {
    /// Oddetallsvindu (antall samples) for gitt samplingsintervall.
    pub fn window_for(&self, dt_s: f64) -> usize {
        let raw = if dt_s.is_finite() && dt_s > 0.0 {
            (self.window_s / dt_s).round() as usize
        } else {
            self.min_window
        };
        let lo = force_odd(self.min_window.max(3));
        let hi = force_odd(self.max_window.max(lo));
        force_odd(raw).clamp(lo, hi)
    }
}

#[inline]
fn force_odd(w: usize) -> usize {
    if w % 2 == 0 { w + 1 } else { w }
}

/// Sentrerte Savitzky–Golay-vekter: minste kvadraters polynom evaluert i midtpunktet.
fn savgol_weights(window: usize, order: usize) -> Option<Vec<f64>> {
    let half = (window / 2) as i64;
    let p = order + 1;

    // Vandermonde-rader for x = -half..=half
    let rows: Vec<Vec<f64>> = (-half..=half)
        .map(|x| (0..p).map(|c| (x as f64).powi(c as i32)).collect())
        .collect();

    let mut ata = vec![vec![0.0; p]; p];
    for row in &rows {
        for i in 0..p {
            for j in 0..p {
                ata[i][j] += row[i] * row[j];
            }
        }
    }
    let mut e0 = vec![0.0; p];
    e0[0] = 1.0;

    let b = solve_linear_system(&ata, &e0)?;
    Some(
        rows.iter()
            .map(|row| row.iter().zip(b.iter()).map(|(a, bc)| a * bc).sum())
            .collect(),
    )
}

/// Savitzky–Golay-glatting med kant-klemming, så output har samme lengde som input.
/// Vinduet tvinges til oddetall og kappes til serielengden; for korte serier er no-op.
pub fn savgol_smooth(series: &[f64], window: usize, poly_order: usize) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    if n < poly_order + 1 {
        return series.to_vec();
    }

    let largest_odd = if n % 2 == 0 { n - 1 } else { n };
    let w = force_odd(window).min(largest_odd);
    if w < 3 {
        return series.to_vec();
    }
    let order = poly_order.min(w - 1);

    let weights = match savgol_weights(w, order) {
        Some(ws) => ws,
        None => return series.to_vec(),
    };

    let half = (w / 2) as i64;
    let last = (n - 1) as i64;
    (0..n as i64)
        .map(|i| {
            (-half..=half)
                .map(|k| {
                    let idx = (i + k).clamp(0, last) as usize;
                    series[idx] * weights[(k + half) as usize]
                })
                .sum()
        })
        .collect()
}

/// Sentraldifferanser i interiøret, en-sidige differanser i endepunktene.
/// Ikke-positiv (eller ikke-finit) `dt` gir tom serie.
pub fn differentiate(series: &[f64], dt: f64) -> Vec<f64> {
    let n = series.len();
    if n == 0 || !dt.is_finite() || dt <= 0.0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.0];
    }

    let mut out = vec![0.0; n];
    out[0] = (series[1] - series[0]) / dt;
    for i in 1..n - 1 {
        out[i] = (series[i + 1] - series[i - 1]) / (2.0 * dt);
    }
    out[n - 1] = (series[n - 1] - series[n - 2]) / dt;
    out
}

/// Kumulativ trapes-integrasjon (invers av `differentiate`).
pub fn integrate(series: &[f64], dt: f64, initial: f64) -> Vec<f64> {
    if series.is_empty() || !dt.is_finite() || dt <= 0.0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(series.len());
    let mut acc = initial;
    out.push(acc);
    for w in series.windows(2) {
        acc += 0.5 * (w[0] + w[1]) * dt;
        out.push(acc);
    }
    out
}

/// Gjennomsnittlig samplingsintervall i sekunder (timestamps i ms).
pub fn mean_dt_s(timestamps_ms: &[f64]) -> Option<f64> {
    if timestamps_ms.len() < 2 {
        return None;
    }
    let span = timestamps_ms[timestamps_ms.len() - 1] - timestamps_ms[0];
    let dt = span / (timestamps_ms.len() - 1) as f64 / 1000.0;
    if dt.is_finite() && dt > 0.0 { Some(dt) } else { None }
}

/// Bildefrekvens fra samplingsintervall (ms), avrundet til 0.01 fps.
/// 1000 / 33.333… blir ellers 29.999… og faller under en 30 fps-grense.
pub fn frame_rate(interval_ms: f64) -> f64 {
    if interval_ms.is_finite() && interval_ms > 0.0 {
        (1000.0 / interval_ms * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Posisjon → hastighet → akselerasjon med standard vindu.
pub fn compute_kinematics(positions: &[f64], timestamps_ms: &[f64]) -> KinematicSeries {
    compute_kinematics_with(positions, timestamps_ms, &KinematicsConfig::default())
}

/// Glatt posisjon først, derivér, glatt hastighet, derivér igjen.
/// Rekkefølgen er påkrevd: rå posisjon derivert direkte gir ubrukelig hastighet.
pub fn compute_kinematics_with(
    positions: &[f64],
    timestamps_ms: &[f64],
    cfg: &KinematicsConfig,
) -> KinematicSeries {
    let n = positions.len();
    if n == 0 || timestamps_ms.len() != n {
        return KinematicSeries::empty();
    }
    if n == 1 {
        return KinematicSeries {
            position: positions.to_vec(),
            velocity: vec![0.0],
            acceleration: vec![0.0],
            dt_s: 0.0,
        };
    }

    let dt = match mean_dt_s(timestamps_ms) {
        Some(dt) => dt,
        None => return KinematicSeries::empty(),
    };
    let window = cfg.window_for(dt);

    let position = savgol_smooth(positions, window, cfg.poly_order);
    let v_raw = differentiate(&position, dt);
    let velocity = if cfg.smooth_velocity {
        savgol_smooth(&v_raw, window, cfg.poly_order)
    } else {
        v_raw
    };
    let acceleration = differentiate(&velocity, dt);

    KinematicSeries { position, velocity, acceleration, dt_s: dt }
}

/// Kalibrer rå frames til meter og kjør kinematikk-pipelinen.
/// `None` kalibrering betyr at `position` allerede er i meter.
pub fn condition_frames(
    frames: &[FrameSample],
    calibration: Option<&Calibration>,
    cfg: &KinematicsConfig,
) -> KinematicSeries {
    let positions = frames_to_meters(frames, calibration);
    let ts: Vec<f64> = frames.iter().map(|f| f.t_ms).collect();
    compute_kinematics_with(&positions, &ts, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_is_rounded() {
        assert_eq!(frame_rate(1000.0 / 30.0), 30.0);
        assert_eq!(frame_rate(2000.0 / 60.0), 30.0);
        assert_eq!(frame_rate(40.0), 25.0);
        assert_eq!(frame_rate(0.0), 0.0);
        assert_eq!(frame_rate(f64::NAN), 0.0);
    }

    #[test]
    fn weights_sum_to_one() {
        let w = savgol_weights(9, 3).unwrap();
        let s: f64 = w.iter().sum();
        assert!((s - 1.0).abs() < 1e-9);
        // Kjente koeffisienter: [-21, 14, 39, 54, 59, ...] / 231
        assert!((w[4] - 59.0 / 231.0).abs() < 1e-9);
    }

    #[test]
    fn window_follows_sample_rate() {
        let cfg = KinematicsConfig::default();
        assert_eq!(cfg.window_for(0.01), 21);
        assert_eq!(cfg.window_for(1.0 / 60.0), 13);
        assert_eq!(cfg.window_for(1.0 / 15.0), 5);
        assert_eq!(cfg.window_for(0.001), 31);
    }
}
