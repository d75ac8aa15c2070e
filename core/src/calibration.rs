// core/src/calibration.rs
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::linalg::solve_linear_system;
use crate::models::{FrameSample, PixelPoint};

/// Kalibrering for én opptakssesjon. Eies av sesjonen og sendes eksplisitt inn –
/// ingen global skala-tilstand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calibration {
    /// piksler per meter (én-akse måling)
    Scalar(f64),
    /// 3x3 planar homografi, rad-major, h[8] = 1
    Homography([f64; 9]),
}

/// Resultat av en projeksjon. `degenerate` = homogen vekt var eksakt 0,
/// punktet er da origo og skal ikke stoles på.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f64,
    pub y: f64,
    pub degenerate: bool,
}

impl Calibration {
    pub fn scalar(pixels_per_meter: f64) -> CoreResult<Self> {
        if pixels_per_meter.is_finite() && pixels_per_meter > 0.0 {
            Ok(Calibration::Scalar(pixels_per_meter))
        } else {
            Err(CoreError::InvalidScale(pixels_per_meter))
        }
    }

    pub fn from_correspondences(src: &[(f64, f64)], dst: &[(f64, f64)]) -> CoreResult<Self> {
        compute_homography(src, dst).map(Calibration::Homography)
    }

    /// Piksel-forskyvning → meter (kun skalar; homografi krever punktprojeksjon).
    pub fn pixels_to_meters(&self, pixels: f64) -> Option<f64> {
        match self {
            Calibration::Scalar(ppm) if pixels.is_finite() => Some(pixels / ppm),
            _ => None,
        }
    }

    /// Bildepunkt → planet (meter).
    pub fn project(&self, x: f64, y: f64) -> Projected {
        match self {
            Calibration::Scalar(ppm) => Projected { x: x / ppm, y: y / ppm, degenerate: false },
            Calibration::Homography(h) => project_point(h, x, y),
        }
    }

    /// Vertikal posisjon i meter for én frame.
    pub fn vertical_meters(&self, frame: &FrameSample) -> f64 {
        match (self, frame.pixel) {
            (Calibration::Scalar(ppm), _) => frame.position / ppm,
            (Calibration::Homography(_), Some(PixelPoint { x, y })) => {
                let p = self.project(x, y);
                if p.degenerate { f64::NAN } else { p.y }
            }
            (Calibration::Homography(_), None) => {
                let p = self.project(0.0, frame.position);
                if p.degenerate { f64::NAN } else { p.y }
            }
        }
    }
}

/// Frames → vertikal posisjon i meter. `None` = allerede i meter.
pub fn frames_to_meters(frames: &[FrameSample], calibration: Option<&Calibration>) -> Vec<f64> {
    match calibration {
        Some(cal) => frames.iter().map(|f| cal.vertical_meters(f)).collect(),
        None => frames.iter().map(|f| f.position).collect(),
    }
}

/// DLT-homografi som mapper `src` → `dst`, h[8] fast lik 1.
/// Nøyaktig 4 punkter løses direkte (8x8); flere løses med minste kvadrater.
pub fn compute_homography(src: &[(f64, f64)], dst: &[(f64, f64)]) -> CoreResult<[f64; 9]> {
    if src.len() != dst.len() {
        return Err(CoreError::CorrespondenceMismatch { src: src.len(), dst: dst.len() });
    }
    if src.len() < 4 {
        return Err(CoreError::TooFewCorrespondences(src.len()));
    }

    let mut a: Vec<Vec<f64>> = Vec::with_capacity(src.len() * 2);
    let mut b: Vec<f64> = Vec::with_capacity(src.len() * 2);
    for (&(x, y), &(u, v)) in src.iter().zip(dst.iter()) {
        // u·(h6 x + h7 y + 1) = h0 x + h1 y + h2
        a.push(vec![x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
        b.push(u);
        // v·(h6 x + h7 y + 1) = h3 x + h4 y + h5
        a.push(vec![0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
        b.push(v);
    }

    let h = if a.len() == 8 {
        solve_linear_system(&a, &b)
    } else {
        // Normallikninger: AᵀA h = Aᵀb
        let mut ata = vec![vec![0.0; 8]; 8];
        let mut atb = vec![0.0; 8];
        for (row, &bi) in a.iter().zip(b.iter()) {
            for i in 0..8 {
                atb[i] += row[i] * bi;
                for j in 0..8 {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }
        solve_linear_system(&ata, &atb)
    };

    match h {
        Some(h) => Ok([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]),
        None => {
            warn!("homography: singular system for {} correspondences", src.len());
            Err(CoreError::SingularSystem)
        }
    }
}

/// Projektiv transform av (x, y). Vekt eksakt 0 → origo, flagget som degenerert.
pub fn project_point(h: &[f64; 9], x: f64, y: f64) -> Projected {
    let px = h[0] * x + h[1] * y + h[2];
    let py = h[3] * x + h[4] * y + h[5];
    let w = h[6] * x + h[7] * y + h[8];
    if w == 0.0 {
        warn!("homography: zero homogeneous weight at ({x:.3}, {y:.3})");
        return Projected { x: 0.0, y: 0.0, degenerate: true };
    }
    Projected { x: px / w, y: py / w, degenerate: false }
}

/// Piksler per meter fra et objekt med kjent høyde. NaN ved ugyldig input.
pub fn pixels_per_meter_from_known(height_mm: f64, pixels: f64) -> f64 {
    if !height_mm.is_finite() || height_mm <= 0.0 || !pixels.is_finite() || pixels <= 0.0 {
        return f64::NAN;
    }
    pixels / (height_mm / 1000.0)
}

/// Standard vektskive (450 mm) eller annen kjent diameter.
pub fn pixels_per_meter_from_plate(diameter_mm: f64, pixels: f64) -> f64 {
    pixels_per_meter_from_known(diameter_mm, pixels)
}

/// Velg beste tilgjengelige skala: `pref_a` hvis gyldig, ellers `pref_b`.
pub fn compose_scale(pref_a: f64, pref_b: Option<f64>) -> Option<f64> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if valid(pref_a) {
        Some(pref_a)
    } else {
        pref_b.filter(|&b| valid(b))
    }
}

pub const SWEEP_MIN_POINTS: usize = 10;
pub const SWEEP_MIN_PATH_PX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepCalibration {
    pub pixels_per_meter: f64,
    pub confidence: f64,
}

/// Kalibrering fra et sveip der et referanseobjekt med kjent lengde følges.
pub fn calibrate_from_sweep(points: &[(f64, f64)], reference_m: f64) -> Option<SweepCalibration> {
    if points.len() < SWEEP_MIN_POINTS || !reference_m.is_finite() || reference_m <= 0.0 {
        return None;
    }
    let path_px: f64 = points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
        .sum();
    if path_px < SWEEP_MIN_PATH_PX {
        return None;
    }

    let confidence = ((points.len() as f64 / SWEEP_MIN_POINTS as f64)
        * (path_px / SWEEP_MIN_PATH_PX))
        .min(1.0);
    Some(SweepCalibration { pixels_per_meter: path_px / reference_m, confidence })
}
