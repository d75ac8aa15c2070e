//! Velox kjerne: kinematikk, rep-segmentering, VBT-metrikker og
//! integritets-/rettferdighetsporter for leaderboard og utfordringer.

pub mod analyze_session;
pub mod byls;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod error;
pub mod integrity;
pub mod io;
mod linalg;
pub mod metrics;
pub mod models;
pub mod quota;
pub mod segmentation;
pub mod smoothing;
pub mod storage;
pub mod telemetry;
pub mod validation;

#[cfg(feature = "python")]
mod py;

pub use analyze_session::{analyze_set, RepReport, SessionInputs, SetReport};
pub use byls::{check_fairness_guards, evaluate_byls, BylsContext, BylsResult, CanonicalMetric};
pub use calibration::{compute_homography, project_point, Calibration};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use integrity::{check_rep, is_leaderboard_eligible, Exercise, IntegrityVerdict};
pub use metrics::{compute_rep_metrics, compute_set_metrics, RepInputs};
pub use models::{
    FrameSample, KinematicSeries, Outlier, OutlierReason, Phase, PixelPoint, RepEvent, RepMetrics,
    ValidationResult,
};
pub use quota::{enforce_callout_quotas, enforce_callout_quotas_at, CalloutQuotaState};
pub use segmentation::{RepSegmenter, Strictness, Thresholds};
pub use smoothing::{compute_kinematics, differentiate, integrate, savgol_smooth};
pub use validation::validate_trajectory;
