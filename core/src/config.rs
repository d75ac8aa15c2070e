use serde::{Deserialize, Serialize};

use crate::byls::FairnessLimits;
use crate::integrity::IntegrityLimits;
use crate::metrics::MetricsConfig;
use crate::quota::CalloutQuotaLimits;
use crate::segmentation::{Strictness, Thresholds};
use crate::smoothing::KinematicsConfig;
use crate::validation::ValidatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub strictness: Strictness,
    /// Eksplisitte terskler; skaleres fortsatt etter `strictness`
    pub thresholds: Option<Thresholds>,
}

impl SegmentationConfig {
    pub fn effective_thresholds(&self) -> Thresholds {
        match self.thresholds {
            Some(th) => th.scaled(self.strictness),
            None => Thresholds::for_strictness(self.strictness),
        }
    }
}

/// Alle justerbare terskler samlet. Manglende seksjoner får standardverdier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub kinematics: KinematicsConfig,
    pub segmentation: SegmentationConfig,
    pub validation: ValidatorConfig,
    pub integrity: IntegrityLimits,
    pub fairness: FairnessLimits,
    pub quota: CalloutQuotaLimits,
    pub metrics: MetricsConfig,
}
