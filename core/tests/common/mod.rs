// Delte syntetiske strømmer for integrasjonstestene.
#![allow(dead_code)]

use std::f64::consts::PI;

use velox_core::models::FrameSample;

pub const FPS: f64 = 60.0;

pub fn dt_ms(fps: f64) -> f64 {
    1000.0 / fps
}

/// Liten deterministisk generator (LCG + Box–Muller), samme sekvens for samme seed.
pub struct Noise {
    state: u64,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407) }
    }

    /// Uniform i (0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    pub fn gaussian(&mut self) -> f64 {
        let u1 = self.uniform();
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

/// Én rep i en syntetisk knebøy: høyder i meter, fleksjon i grader.
#[derive(Clone, Copy)]
pub struct SquatRep {
    pub descent_m: f64,
    pub peak_flex_deg: f64,
    pub eccentric_ms: f64,
    pub bottom_ms: f64,
    pub concentric_ms: f64,
    pub top_ms: f64,
}

impl Default for SquatRep {
    fn default() -> Self {
        Self {
            descent_m: 0.4,
            peak_flex_deg: 100.0,
            eccentric_ms: 1000.0,
            bottom_ms: 300.0,
            concentric_ms: 800.0,
            top_ms: 400.0,
        }
    }
}

/// Cosinus-overgang 0 → 1.
fn ease(s: f64) -> f64 {
    (1.0 - (PI * s.clamp(0.0, 1.0)).cos()) / 2.0
}

/// Stående start (300 ms), deretter repene etter hverandre.
pub fn squat_stream(reps: &[SquatRep], fps: f64) -> Vec<FrameSample> {
    squat_stream_noisy(reps, fps, 0.0, 1)
}

/// Som `squat_stream`, med uniform posisjonsstøy ±`jitter_m`.
pub fn squat_stream_noisy(reps: &[SquatRep], fps: f64, jitter_m: f64, seed: u64) -> Vec<FrameSample> {
    const TOP: f64 = 1.0;
    const LEAD_IN_MS: f64 = 300.0;

    // (slutt-tid, rep) for hvert segment
    let mut total = LEAD_IN_MS;
    for r in reps {
        total += r.eccentric_ms + r.bottom_ms + r.concentric_ms + r.top_ms;
    }

    let dt = dt_ms(fps);
    let n = (total / dt).floor() as usize + 1;
    let mut noise = Noise::new(seed);
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let t = i as f64 * dt;
        let mut height = TOP;
        let mut flex = 0.0;

        let mut t0 = LEAD_IN_MS;
        for r in reps {
            let ecc_end = t0 + r.eccentric_ms;
            let bottom_end = ecc_end + r.bottom_ms;
            let con_end = bottom_end + r.concentric_ms;
            let rep_end = con_end + r.top_ms;
            if t >= t0 && t < rep_end {
                let depth = if t < ecc_end {
                    ease((t - t0) / r.eccentric_ms)
                } else if t < bottom_end {
                    1.0
                } else if t < con_end {
                    1.0 - ease((t - bottom_end) / r.concentric_ms)
                } else {
                    0.0
                };
                height = TOP - r.descent_m * depth;
                flex = r.peak_flex_deg * depth;
                break;
            }
            t0 = rep_end;
        }

        let jitter = if jitter_m > 0.0 { (noise.uniform() * 2.0 - 1.0) * jitter_m } else { 0.0 };
        out.push(FrameSample {
            t_ms: t,
            position: height + jitter,
            knee_flex_deg: Some(flex),
            hip_flex_deg: Some(flex * 0.8),
            score: Some(0.95),
            ..Default::default()
        });
    }
    out
}

/// Sinus-trajectory (meter), valgfri gaussisk støy.
pub fn sine_positions(n: usize, fps: f64, amplitude: f64, period_s: f64, noise_sd: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut noise = Noise::new(seed);
    (0..n)
        .map(|i| {
            let t_s = i as f64 / fps;
            let y = 1.0 + amplitude * (2.0 * PI * t_s / period_s).sin() + noise_sd * noise.gaussian();
            (t_s * 1000.0, y)
        })
        .collect()
}
