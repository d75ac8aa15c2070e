//! Rep-segmentering som en eksplisitt tilstandsmaskin.
//!
//! `Idle → Eccentric → BottomIsometric → Concentric → TopIsometric → Idle`.
//! Hver tilstand bærer kun feltene den trenger; `transition` er ren og
//! `RepSegmenter` er en tynn strøm-innpakning rundt den. Ikke trådsikker for
//! samtidig inntak – én produsent, ikke-synkende timestamps.
//!
//! Hastigheten maskinen ser er helst den kondisjonerte (SG-glattet) fra
//! `smoothing`; uten den faller vi tilbake på rå frame-differanse.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::{FrameSample, Phase, RepEvent};
use crate::smoothing::compute_kinematics;
use crate::telemetry;

/// Faktor som strammer inn alle terskler i `Strict`.
pub const STRICT_FACTOR: f64 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    #[default]
    Balanced,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_rom_deg: f64,          // minste totale ROM for å telle
    pub min_depth_deg: f64,        // minste topp-fleksjon for "dybde"
    pub min_pause_ms: f64,         // dwell i bunn/topp mot bounce-telling
    pub min_con_velocity: f64,     // units/s opp for å starte konsentrisk
    pub min_ecc_velocity: f64,     // units/s ned for å starte eksentrisk
    /// Snitt av |akselerasjon| over repen (units/s²) som gir stabilitet 0.
    /// Jerk akkumuleres som ∫|a|·dt, så scoren er uavhengig av fps.
    pub stability_norm: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_rom_deg: 45.0,
            min_depth_deg: 70.0,
            min_pause_ms: 80.0,
            min_con_velocity: 0.05,
            min_ecc_velocity: 0.05,
            stability_norm: 10.0,
        }
    }
}

impl Thresholds {
    pub fn for_strictness(strictness: Strictness) -> Self {
        Self::default().scaled(strictness)
    }

    /// Skaler terskelsettet. `stability_norm` er en normalisering, ikke en terskel.
    pub fn scaled(self, strictness: Strictness) -> Self {
        match strictness {
            Strictness::Balanced => self,
            Strictness::Strict => Self {
                min_rom_deg: self.min_rom_deg * STRICT_FACTOR,
                min_depth_deg: self.min_depth_deg * STRICT_FACTOR,
                min_pause_ms: (self.min_pause_ms * STRICT_FACTOR).round(),
                min_con_velocity: self.min_con_velocity * STRICT_FACTOR,
                min_ecc_velocity: self.min_ecc_velocity * STRICT_FACTOR,
                stability_norm: self.stability_norm,
            },
        }
    }
}

/// Forrige sample; bæres gjennom alle tilstander etter første frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastSample {
    pub t_ms: f64,
    pub position: f64,
    pub flexion_deg: f64,
    pub velocity: Option<f64>,
}

/// Rep-scoped akkumulatorer; finnes bare mens en rep pågår.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepProgress {
    pub start_ms: f64,
    pub phase_start_ms: f64,
    pub eccentric_ms: f64,
    pub isometric_ms: f64,
    pub concentric_ms: f64,
    pub peak_flexion_deg: f64,
    pub rom_deg: f64,
    pub jerk: f64,
}

impl RepProgress {
    fn start(t_ms: f64, flexion_deg: f64) -> Self {
        Self {
            start_ms: t_ms,
            phase_start_ms: t_ms,
            eccentric_ms: 0.0,
            isometric_ms: 0.0,
            concentric_ms: 0.0,
            peak_flexion_deg: flexion_deg,
            rom_deg: 0.0,
            jerk: 0.0,
        }
    }

    /// `accel` i units/s², `dt_s` i sekunder.
    fn absorb(&mut self, flexion_deg: f64, accel: f64, dt_s: f64) {
        self.peak_flexion_deg = self.peak_flexion_deg.max(flexion_deg);
        self.jerk += accel.abs() * dt_s;
    }

    fn enter_phase(mut self, t_ms: f64) -> Self {
        self.phase_start_ms = t_ms;
        self
    }

    fn dwell_ms(&self, t_ms: f64) -> f64 {
        t_ms - self.phase_start_ms
    }

    fn finish(&self, end_ms: f64, th: &Thresholds) -> RepEvent {
        let total_s = (end_ms - self.start_ms).max(1.0) / 1000.0;
        let stability = 1.0 - self.jerk / (total_s * th.stability_norm);
        RepEvent {
            start_ms: self.start_ms,
            end_ms,
            eccentric_ms: self.eccentric_ms,
            isometric_ms: self.isometric_ms,
            concentric_ms: self.concentric_ms,
            rom: self.rom_deg,
            depth_score: clamp01(self.peak_flexion_deg / th.min_depth_deg.max(1.0)),
            stability_score: clamp01(stability),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentState {
    /// Ingen frame mottatt ennå
    Warmup,
    Idle { last: LastSample },
    Eccentric { last: LastSample, rep: RepProgress },
    BottomIsometric { last: LastSample, rep: RepProgress },
    Concentric { last: LastSample, rep: RepProgress },
    TopIsometric { last: LastSample, rep: RepProgress },
}

impl SegmentState {
    pub fn last(&self) -> Option<&LastSample> {
        match self {
            SegmentState::Warmup => None,
            SegmentState::Idle { last }
            | SegmentState::Eccentric { last, .. }
            | SegmentState::BottomIsometric { last, .. }
            | SegmentState::Concentric { last, .. }
            | SegmentState::TopIsometric { last, .. } => Some(last),
        }
    }

    /// Fase-etikett for metrics-motoren (`None` utenfor en rep).
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SegmentState::Warmup | SegmentState::Idle { .. } => None,
            SegmentState::Eccentric { .. } => Some(Phase::Eccentric),
            SegmentState::BottomIsometric { .. } | SegmentState::TopIsometric { .. } => {
                Some(Phase::Isometric)
            }
            SegmentState::Concentric { .. } => Some(Phase::Concentric),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SegmentState::Warmup => "warmup",
            SegmentState::Idle { .. } => "idle",
            SegmentState::Eccentric { .. } => "eccentric",
            SegmentState::BottomIsometric { .. } => "bottom_isometric",
            SegmentState::Concentric { .. } => "concentric",
            SegmentState::TopIsometric { .. } => "top_isometric",
        }
    }
}

/// Ren overgangsfunksjon: (tilstand, sample, hastighet) → (ny tilstand, ev. ferdig rep).
///
/// `velocity` er kondisjonert hastighet i units/s (opp = positiv). `None` gir
/// rå frame-differanse, som bare holder for allerede glatte strømmer.
pub fn transition(
    state: SegmentState,
    sample: &FrameSample,
    velocity: Option<f64>,
    th: &Thresholds,
) -> (SegmentState, Option<RepEvent>) {
    let prev = match state.last() {
        Some(last) => *last,
        None => {
            let last = LastSample {
                t_ms: sample.t_ms,
                position: sample.position,
                flexion_deg: sample.flexion_deg().unwrap_or(0.0),
                velocity: velocity.filter(|v| v.is_finite()),
            };
            return (SegmentState::Idle { last }, None);
        }
    };

    if sample.t_ms < prev.t_ms {
        warn!("segmentation: out-of-order sample {} < {}, ignored", sample.t_ms, prev.t_ms);
        return (state, None);
    }

    let dt = sample.t_ms - prev.t_ms;
    let dt_s = dt / 1000.0;
    let velocity = match velocity.filter(|v| v.is_finite()) {
        Some(v) => v,
        // opp = positiv; units per sekund
        None if dt > 0.0 => (sample.position - prev.position) / dt_s,
        // duplisert timestamp: ingen ny informasjon om hastighet
        None => prev.velocity.unwrap_or(0.0),
    };
    let accel = match prev.velocity {
        Some(v) if dt > 0.0 => (velocity - v) / dt_s,
        _ => 0.0,
    };
    let flexion = sample.flexion_deg().unwrap_or(prev.flexion_deg);
    let last = LastSample {
        t_ms: sample.t_ms,
        position: sample.position,
        flexion_deg: flexion,
        velocity: Some(velocity),
    };
    let t = sample.t_ms;

    match state {
        SegmentState::Warmup => (SegmentState::Idle { last }, None),

        SegmentState::Idle { .. } => {
            let going_down = -velocity > th.min_ecc_velocity;
            let flexing = flexion > prev.flexion_deg;
            if going_down && flexing {
                debug!("segmentation: idle -> eccentric at {t:.0} ms");
                let rep = RepProgress::start(t, flexion);
                (SegmentState::Eccentric { last, rep }, None)
            } else {
                (SegmentState::Idle { last }, None)
            }
        }

        SegmentState::Eccentric { mut rep, .. } => {
            rep.eccentric_ms += dt;
            rep.absorb(flexion, accel, dt_s);
            let deep_enough = rep.peak_flexion_deg >= th.min_depth_deg;
            if velocity.abs() < th.min_ecc_velocity && deep_enough {
                debug!("segmentation: eccentric -> bottom at {t:.0} ms (peak {:.1}°)", rep.peak_flexion_deg);
                (SegmentState::BottomIsometric { last, rep: rep.enter_phase(t) }, None)
            } else if velocity > th.min_con_velocity && !deep_enough {
                // snudde før dybde: delvis rep, forkastes
                debug!("segmentation: shallow eccentric aborted at {t:.0} ms");
                (SegmentState::Idle { last }, None)
            } else {
                (SegmentState::Eccentric { last, rep }, None)
            }
        }

        SegmentState::BottomIsometric { mut rep, .. } => {
            rep.isometric_ms += dt;
            rep.absorb(flexion, accel, dt_s);
            if rep.dwell_ms(t) >= th.min_pause_ms && velocity > th.min_con_velocity {
                debug!("segmentation: bottom -> concentric at {t:.0} ms");
                (SegmentState::Concentric { last, rep: rep.enter_phase(t) }, None)
            } else {
                (SegmentState::BottomIsometric { last, rep }, None)
            }
        }

        SegmentState::Concentric { mut rep, .. } => {
            rep.concentric_ms += dt;
            rep.absorb(flexion, accel, dt_s);
            rep.rom_deg = rep.rom_deg.max((rep.peak_flexion_deg - flexion).max(0.0));
            if velocity.abs() < th.min_con_velocity && rep.rom_deg >= th.min_rom_deg {
                debug!("segmentation: concentric -> top at {t:.0} ms (rom {:.1}°)", rep.rom_deg);
                (SegmentState::TopIsometric { last, rep: rep.enter_phase(t) }, None)
            } else {
                (SegmentState::Concentric { last, rep }, None)
            }
        }

        SegmentState::TopIsometric { mut rep, .. } => {
            rep.absorb(flexion, accel, dt_s);
            if rep.dwell_ms(t) >= th.min_pause_ms {
                let event = rep.finish(t, th);
                debug!(
                    "segmentation: rep {:.0}-{:.0} ms, rom {:.1}°, depth {:.2}, stability {:.2}",
                    event.start_ms, event.end_ms, event.rom, event.depth_score, event.stability_score
                );
                (SegmentState::Idle { last }, Some(event))
            } else {
                (SegmentState::TopIsometric { last, rep }, None)
            }
        }
    }
}

/// Strøm-innpakning: eier tilstand og emitterte reps.
#[derive(Debug, Clone)]
pub struct RepSegmenter {
    thresholds: Thresholds,
    state: SegmentState,
    events: Vec<RepEvent>,
}

impl RepSegmenter {
    pub fn new(strictness: Strictness) -> Self {
        Self::with_thresholds(Thresholds::for_strictness(strictness))
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self { thresholds, state: SegmentState::Warmup, events: Vec::new() }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn state(&self) -> &SegmentState {
        &self.state
    }

    /// Fase etter siste inntak.
    pub fn phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    /// Inntak med rå frame-differanse som hastighet.
    pub fn ingest(&mut self, sample: &FrameSample) -> Option<RepEvent> {
        self.step(sample, None)
    }

    /// Inntak med kondisjonert hastighet (units/s) for samplet.
    pub fn ingest_with_velocity(&mut self, sample: &FrameSample, velocity: f64) -> Option<RepEvent> {
        self.step(sample, Some(velocity))
    }

    fn step(&mut self, sample: &FrameSample, velocity: Option<f64>) -> Option<RepEvent> {
        let (next, event) = transition(self.state, sample, velocity, &self.thresholds);
        self.state = next;
        if let Some(ev) = event {
            telemetry::record_rep_emitted();
            self.events.push(ev);
        }
        event
    }

    pub fn events(&self) -> &[RepEvent] {
        &self.events
    }

    /// Avslutt strømmen. En påbegynt rep forkastes, den gjettes aldri ferdig.
    pub fn finish(self) -> Vec<RepEvent> {
        if self.state.phase().is_some() {
            debug!("segmentation: stream ended in {}, partial rep discarded", self.state.name());
        }
        self.events
    }
}

/// Segmenter en hel bufret serie. Posisjonen kondisjoneres først, så
/// maskinen ser glattet hastighet i stedet for rå frame-differanser.
pub fn segment(frames: &[FrameSample], thresholds: Thresholds) -> Vec<RepEvent> {
    let positions: Vec<f64> = frames.iter().map(|f| f.position).collect();
    let ts: Vec<f64> = frames.iter().map(|f| f.t_ms).collect();
    let kin = compute_kinematics(&positions, &ts);

    let mut seg = RepSegmenter::with_thresholds(thresholds);
    if kin.len() == frames.len() {
        for (f, &v) in frames.iter().zip(kin.velocity.iter()) {
            seg.ingest_with_velocity(f, v);
        }
    } else {
        for f in frames {
            seg.ingest(f);
        }
    }
    seg.finish()
}

#[inline]
fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}
