//! Beat-your-last-score: rettferdighetsvaktet sammenligning mot forrige forsøk.
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::RepMetrics;
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalMetric {
    #[serde(alias = "meanConVel")]
    MeanConVel,
    #[serde(alias = "peakConVel")]
    PeakConVel,
    #[serde(alias = "romM")]
    RomM,
    #[serde(alias = "powerW")]
    PowerW,
    #[serde(alias = "velLossPct")]
    VelLossPct,
    #[serde(rename = "est_1rm", alias = "est1RM")]
    Est1Rm,
}

impl CanonicalMetric {
    /// Alt unntatt velocity loss: større er bedre.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, CanonicalMetric::VelLossPct)
    }

    /// Plukk metrikken ut av en ferdig beregnet rep.
    pub fn value_of(&self, m: &RepMetrics) -> Option<f64> {
        let v = match self {
            CanonicalMetric::MeanConVel => m.mean_con_vel,
            CanonicalMetric::PeakConVel => m.peak_con_vel,
            CanonicalMetric::RomM => m.rom_m,
            CanonicalMetric::PowerW => m.power_w,
            CanonicalMetric::VelLossPct => m.vel_loss_pct,
            CanonicalMetric::Est1Rm => m.est_1rm.unwrap_or(f64::NAN),
        };
        v.is_finite().then_some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupField {
    Stance,
    Grip,
    BarPath,
    Tempo,
}

impl SetupField {
    pub const ALL: [SetupField; 4] =
        [SetupField::Stance, SetupField::Grip, SetupField::BarPath, SetupField::Tempo];

    pub fn name(&self) -> &'static str {
        match self {
            SetupField::Stance => "stance",
            SetupField::Grip => "grip",
            SetupField::BarPath => "bar_path",
            SetupField::Tempo => "tempo",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupDescriptor {
    pub stance: Option<String>,
    pub grip: Option<String>,
    #[serde(alias = "barPath")]
    pub bar_path: Option<String>,
    pub tempo: Option<String>,
}

impl SetupDescriptor {
    /// Tomme strenger regnes som "ikke oppgitt".
    pub fn get(&self, field: SetupField) -> Option<&str> {
        let v = match field {
            SetupField::Stance => &self.stance,
            SetupField::Grip => &self.grip,
            SetupField::BarPath => &self.bar_path,
            SetupField::Tempo => &self.tempo,
        };
        v.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BylsContext {
    pub previous: Option<f64>,
    pub current: f64,
    pub metric: CanonicalMetric,
    #[serde(default, alias = "massKg")]
    pub mass_kg: Option<f64>,
    #[serde(default, alias = "prevMassKg")]
    pub prev_mass_kg: Option<f64>,
    #[serde(default)]
    pub setup: Option<SetupDescriptor>,
    #[serde(default, alias = "prevSetup")]
    pub prev_setup: Option<SetupDescriptor>,
    #[serde(default, alias = "deviceTrusted")]
    pub device_trusted: Option<bool>,
    #[serde(default, alias = "formScore")]
    pub form_score: Option<f64>,
    #[serde(default, alias = "integrityScore")]
    pub integrity_score: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default, alias = "videoDurationS")]
    pub video_duration_s: Option<f64>,
    #[serde(default, alias = "locationHash")]
    pub location_hash: Option<String>,
    #[serde(default, alias = "prevLocationHash")]
    pub prev_location_hash: Option<String>,
}

impl BylsContext {
    pub fn new(previous: Option<f64>, current: f64, metric: CanonicalMetric) -> Self {
        Self {
            previous,
            current,
            metric,
            mass_kg: None,
            prev_mass_kg: None,
            setup: None,
            prev_setup: None,
            device_trusted: None,
            form_score: None,
            integrity_score: None,
            fps: None,
            video_duration_s: None,
            location_hash: None,
            prev_location_hash: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FairnessReason {
    LoadChanged,
    SetupChanged(SetupField),
    LowFormScore,
    LowIntegrityScore,
    LowFps,
    VideoTooShort,
    UntrustedDevice,
    LocationChanged,
}

impl FairnessReason {
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FairnessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FairnessReason::LoadChanged => f.write_str("load_changed"),
            FairnessReason::SetupChanged(field) => write!(f, "setup_{}_changed", field.name()),
            FairnessReason::LowFormScore => f.write_str("low_form_score"),
            FairnessReason::LowIntegrityScore => f.write_str("low_integrity_score"),
            FairnessReason::LowFps => f.write_str("low_fps"),
            FairnessReason::VideoTooShort => f.write_str("video_too_short"),
            FairnessReason::UntrustedDevice => f.write_str("untrusted_device"),
            FairnessReason::LocationChanged => f.write_str("location_changed"),
        }
    }
}

impl FromStr for FairnessReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let simple = match s {
            "load_changed" => Some(FairnessReason::LoadChanged),
            "low_form_score" => Some(FairnessReason::LowFormScore),
            "low_integrity_score" => Some(FairnessReason::LowIntegrityScore),
            "low_fps" => Some(FairnessReason::LowFps),
            "video_too_short" => Some(FairnessReason::VideoTooShort),
            "untrusted_device" => Some(FairnessReason::UntrustedDevice),
            "location_changed" => Some(FairnessReason::LocationChanged),
            _ => None,
        };
        if let Some(r) = simple {
            return Ok(r);
        }
        s.strip_prefix("setup_")
            .and_then(|rest| rest.strip_suffix("_changed"))
            .and_then(|name| SetupField::ALL.iter().find(|f| f.name() == name))
            .map(|f| FairnessReason::SetupChanged(*f))
            .ok_or_else(|| format!("unknown fairness reason: {s}"))
    }
}

impl Serialize for FairnessReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FairnessReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessLimits {
    /// Relativ lastforskjell som regnes som ny last
    pub load_rel_tolerance: f64,
    pub min_form_score: f64,
    pub min_integrity_score: f64,
    pub min_fps: f64,
    pub min_video_s: f64,
}

impl Default for FairnessLimits {
    fn default() -> Self {
        Self {
            load_rel_tolerance: 0.02,
            min_form_score: 0.5,
            min_integrity_score: 0.6,
            min_fps: 30.0,
            min_video_s: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessResult {
    pub ok: bool,
    pub reasons: Vec<FairnessReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BylsResult {
    pub ok: bool,
    pub reasons: Vec<FairnessReason>,
    pub improved: bool,
    /// current − previous; NaN uten forrige forsøk
    pub delta: f64,
}

/// Last, oppsett og moderasjon. Alle brudd rapporteres, uavhengig av hverandre.
pub fn check_fairness_guards(ctx: &BylsContext, limits: &FairnessLimits) -> FairnessResult {
    let mut reasons = Vec::new();

    if let (Some(m), Some(p)) = (ctx.mass_kg, ctx.prev_mass_kg) {
        let rel = (m - p).abs() / p.max(1.0);
        if rel >= limits.load_rel_tolerance {
            reasons.push(FairnessReason::LoadChanged);
        }
    }

    if let (Some(now), Some(before)) = (&ctx.setup, &ctx.prev_setup) {
        for field in SetupField::ALL {
            if let (Some(a), Some(b)) = (now.get(field), before.get(field)) {
                if a != b {
                    reasons.push(FairnessReason::SetupChanged(field));
                }
            }
        }
    }

    if ctx.form_score.is_some_and(|s| s < limits.min_form_score) {
        reasons.push(FairnessReason::LowFormScore);
    }
    if ctx.integrity_score.is_some_and(|s| s < limits.min_integrity_score) {
        reasons.push(FairnessReason::LowIntegrityScore);
    }
    if ctx.fps.is_some_and(|f| f < limits.min_fps) {
        reasons.push(FairnessReason::LowFps);
    }
    if ctx.video_duration_s.is_some_and(|d| d < limits.min_video_s) {
        reasons.push(FairnessReason::VideoTooShort);
    }
    if ctx.device_trusted == Some(false) {
        reasons.push(FairnessReason::UntrustedDevice);
    }
    match (ctx.location_hash.as_deref(), ctx.prev_location_hash.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() && a != b => {
            reasons.push(FairnessReason::LocationChanged)
        }
        _ => {}
    }

    FairnessResult { ok: reasons.is_empty(), reasons }
}

/// `ok` gjelder kun rettferdighet; `improved` kun metrikken. Begge må sjekkes.
pub fn evaluate_byls(ctx: &BylsContext, limits: &FairnessLimits) -> BylsResult {
    let fairness = check_fairness_guards(ctx, limits);

    let (improved, delta) = match ctx.previous {
        Some(prev) => {
            let delta = ctx.current - prev;
            let improved = if ctx.metric.higher_is_better() { delta > 0.0 } else { delta < 0.0 };
            (improved, delta)
        }
        // Første forsøk er baseline
        None => (true, f64::NAN),
    };

    let outcome = match (fairness.ok, improved) {
        (false, _) => "unfair",
        (true, true) => "improved",
        (true, false) => "not_improved",
    };
    telemetry::record_byls(outcome);
    debug!("byls {:?}: {} (delta {:.4})", ctx.metric, outcome, delta);

    BylsResult { ok: fairness.ok, reasons: fairness.reasons, improved, delta }
}
