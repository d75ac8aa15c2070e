//! Grensesnitt-adaptere: JSON-forespørsler med sti-presise feil, flate
//! tabellrader → `FrameSample`, og merkede kinematikk-vinduer → `RepInputs`.
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::analyze_session::SessionInputs;
use crate::error::CoreResult;
use crate::metrics::RepInputs;
use crate::models::{FrameSample, KinematicSeries, Phase, PixelPoint};

/// Én analyseforespørsel: rå frames + sesjonskontekst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub frames: Vec<FrameSample>,
    pub session: SessionInputs,
}

/// Deserialiser med `serde_path_to_error` slik at feilen peker på feltet.
pub fn parse_json<T>(json: &str) -> CoreResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    let mut de = serde_json::Deserializer::from_str(json);
    let value = serde_path_to_error::deserialize(&mut de)?;
    Ok(value)
}

pub fn parse_session_request(json: &str) -> CoreResult<SessionRequest> {
    parse_json(json)
}

/// Flat rad (CSV/tabell). Pikselpunktet brukes kun når begge koordinater finnes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(alias = "t", alias = "timestamp_ms")]
    pub t_ms: f64,
    #[serde(alias = "y")]
    pub position: f64,
    #[serde(default)]
    pub px: Option<f64>,
    #[serde(default)]
    pub py: Option<f64>,
    #[serde(default, alias = "knee")]
    pub knee_flex_deg: Option<f64>,
    #[serde(default, alias = "hip")]
    pub hip_flex_deg: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl From<FrameRecord> for FrameSample {
    fn from(r: FrameRecord) -> Self {
        let pixel = match (r.px, r.py) {
            (Some(x), Some(y)) => Some(PixelPoint { x, y }),
            _ => None,
        };
        FrameSample {
            t_ms: r.t_ms,
            position: r.position,
            pixel,
            knee_flex_deg: r.knee_flex_deg,
            hip_flex_deg: r.hip_flex_deg,
            score: r.score,
        }
    }
}

/// Klipp ut ett rep-vindu fra sett-kinematikken. Samples uten fase (hvile)
/// merkes isometrisk. Et vindu utenfor seriene gir tom (og dermed NaN) input.
pub fn rep_inputs_from_window(
    kin: &KinematicSeries,
    timestamps_ms: &[f64],
    labels: &[Option<Phase>],
    window: Range<usize>,
    mass_kg: f64,
) -> RepInputs {
    let n = kin.len().min(timestamps_ms.len()).min(labels.len());
    if window.start >= window.end || window.end > n {
        return RepInputs { mass_kg, ..RepInputs::default() };
    }
    RepInputs {
        mass_kg,
        position_m: kin.position[window.clone()].to_vec(),
        velocity: kin.velocity[window.clone()].to_vec(),
        acceleration: kin.acceleration[window.clone()].to_vec(),
        t_ms: timestamps_ms[window.clone()].to_vec(),
        phases: labels[window]
            .iter()
            .map(|p| p.unwrap_or(Phase::Isometric))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn bad_field_reports_its_path() {
        let json = r#"{ "frames": [ { "t_ms": 0, "position": "high" } ], "session": {} }"#;
        match parse_session_request(json) {
            Err(CoreError::Json { path, .. }) => assert_eq!(path, "frames[0].position"),
            other => panic!("expected json error, got {other:?}"),
        }
    }

    #[test]
    fn record_without_both_pixels_has_no_point() {
        let r = FrameRecord { px: Some(10.0), ..Default::default() };
        assert!(FrameSample::from(r).pixel.is_none());
    }
}
