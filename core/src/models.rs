use serde::{Deserialize, Deserializer, Serialize};

/// Pikselkoordinat fra pose-modellen (bilde-rom).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Én observasjon fra capture-laget. Muteres aldri etter inntak.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameSample {
    pub t_ms: f64,                   // ms, ikke-avtagende
    pub position: f64,               // vertikal posisjon (opp = positiv)
    #[serde(default)]
    pub pixel: Option<PixelPoint>,
    #[serde(default)]
    pub knee_flex_deg: Option<f64>,  // 0 strak → ~140 dyp
    #[serde(default)]
    pub hip_flex_deg: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,          // pose-confidence 0..1
}

impl FrameSample {
    /// Fleksjons-proxy: største av kne- og hoftevinkel.
    pub fn flexion_deg(&self) -> Option<f64> {
        match (self.knee_flex_deg, self.hip_flex_deg) {
            (Some(k), Some(h)) => Some(k.max(h)),
            (Some(k), None) => Some(k),
            (None, Some(h)) => Some(h),
            (None, None) => None,
        }
    }
}

/// Glattet posisjon + hastighet + akselerasjon, samme lengde som input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KinematicSeries {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub dt_s: f64,
}

impl KinematicSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }
}

/// Fase-etikett per sample, brukt av metrics-motoren.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[serde(alias = "ecc")]
    Eccentric,
    #[serde(alias = "iso")]
    Isometric,
    #[serde(alias = "con")]
    Concentric,
}

/// Én fullført repetisjon fra segmenteringen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    pub start_ms: f64,
    pub end_ms: f64,
    pub eccentric_ms: f64,
    pub isometric_ms: f64,
    pub concentric_ms: f64,
    pub rom: f64,             // grader (fleksjons-signal)
    pub depth_score: f64,     // 0..1
    pub stability_score: f64, // 0..1
}

impl RepEvent {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

fn nan() -> f64 {
    f64::NAN
}

/// `null` (slik serde_json skriver NaN) leses tilbake som NaN.
fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Per-rep VBT-metrikker. NaN betyr "ikke beregnbar" – sjekk før lagring/visning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepMetrics {
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub mean_con_vel: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub peak_con_vel: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub mean_ecc_vel: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub peak_ecc_vel: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub mpv: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub rom_m: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub tut_ms: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub power_w: f64,
    #[serde(default = "nan", deserialize_with = "nan_if_null")]
    pub vel_loss_pct: f64,
    #[serde(default)]
    pub lv_slope: Option<f64>,  // m/s per kg, forventet negativ
    #[serde(default)]
    pub est_1rm: Option<f64>,   // kg
}

impl RepMetrics {
    pub fn nan() -> Self {
        Self {
            mean_con_vel: f64::NAN,
            peak_con_vel: f64::NAN,
            mean_ecc_vel: f64::NAN,
            peak_ecc_vel: f64::NAN,
            mpv: f64::NAN,
            rom_m: f64::NAN,
            tut_ms: f64::NAN,
            power_w: f64::NAN,
            vel_loss_pct: f64::NAN,
            lv_slope: None,
            est_1rm: None,
        }
    }

    /// Kjernefeltene er beregnet (ikke NaN).
    pub fn is_complete(&self) -> bool {
        [self.mean_con_vel, self.peak_con_vel, self.rom_m, self.tut_ms]
            .iter()
            .all(|x| x.is_finite())
    }

    /// LV-slope er kun troverdig når den er negativ.
    pub fn lv_slope_is_plausible(&self) -> Option<bool> {
        self.lv_slope.map(|s| s < 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierReason {
    Gap,
    Spike,
    Jump,
}

impl OutlierReason {
    pub fn code(&self) -> &'static str {
        match self {
            OutlierReason::Gap => "gap",
            OutlierReason::Spike => "spike",
            OutlierReason::Jump => "jump",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub index: usize,
    pub reason: OutlierReason,
}

/// Rådgivende kvalitetsvurdering av en trajectory. Muterer aldri input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub confidence: f64,
    pub velocity_std: f64,
    pub velocity_mean: f64,
    pub outliers: Vec<Outlier>,
    /// Reparert hastighet på fast tidsgrid (kun informativt)
    pub velocity: Vec<f64>,
    pub latency_ms: f64,
    pub window_ms: f64,
}

impl ValidationResult {
    pub fn degenerate() -> Self {
        Self {
            confidence: 0.0,
            velocity_std: f64::NAN,
            velocity_mean: f64::NAN,
            outliers: Vec::new(),
            velocity: Vec::new(),
            latency_ms: 0.0,
            window_ms: 0.0,
        }
    }

    pub fn has_reason(&self, reason: OutlierReason) -> bool {
        self.outliers.iter().any(|o| o.reason == reason)
    }
}
