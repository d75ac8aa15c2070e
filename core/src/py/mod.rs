// JSON inn / JSON ut. Python-siden snakker kun strenger, så kjernen trenger
// ingen pyo3-serde-feature.
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use serde::{Deserialize, Serialize};
use serde_json as json;

use crate::byls::{evaluate_byls, BylsContext, FairnessLimits};
use crate::calibration::compute_homography;
use crate::integrity::{check_rep, Exercise, IntegrityContext, IntegrityLimits};
use crate::io::{parse_json, parse_session_request};
use crate::models::RepMetrics;
use crate::quota::{enforce_callout_quotas_at, CalloutQuotaLimits, CalloutQuotaState};

fn py_err(what: &str, e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(format!("{what}: {e}"))
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    json::to_string(value).map_err(|e| py_err("serialize", e))
}

#[pyfunction]
fn analyze_set_json(json_in: &str) -> PyResult<String> {
    let req = parse_session_request(json_in).map_err(|e| py_err("parse error (SessionRequest)", e))?;
    let report = crate::analyze_set(&req.frames, &req.session);
    to_json(&report)
}

#[pyfunction]
fn check_rep_json(json_in: &str) -> PyResult<String> {
    #[derive(Deserialize)]
    struct CheckRepIn {
        exercise: Exercise,
        metrics: RepMetrics,
        context: IntegrityContext,
        #[serde(default)]
        limits: Option<IntegrityLimits>,
    }

    let parsed: CheckRepIn = parse_json(json_in).map_err(|e| py_err("parse error (CheckRepIn)", e))?;
    let limits = parsed.limits.unwrap_or_default();
    to_json(&check_rep(parsed.exercise, &parsed.metrics, &parsed.context, &limits))
}

#[pyfunction]
fn evaluate_byls_json(json_in: &str) -> PyResult<String> {
    let ctx: BylsContext = parse_json(json_in).map_err(|e| py_err("parse error (BylsContext)", e))?;
    to_json(&evaluate_byls(&ctx, &FairnessLimits::default()))
}

#[pyfunction]
fn enforce_callout_quotas_json(json_in: &str) -> PyResult<String> {
    let state: CalloutQuotaState =
        parse_json(json_in).map_err(|e| py_err("parse error (CalloutQuotaState)", e))?;
    let decision =
        enforce_callout_quotas_at(&state, &CalloutQuotaLimits::default(), chrono::Utc::now());
    to_json(&decision)
}

#[pyfunction]
fn compute_homography_py(src: Vec<(f64, f64)>, dst: Vec<(f64, f64)>) -> PyResult<Vec<f64>> {
    compute_homography(&src, &dst)
        .map(|h| h.to_vec())
        .map_err(|e| py_err("homography", e))
}

#[pymodule]
fn velox_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(analyze_set_json, m)?)?;
    m.add_function(wrap_pyfunction!(check_rep_json, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_byls_json, m)?)?;
    m.add_function(wrap_pyfunction!(enforce_callout_quotas_json, m)?)?;
    m.add_function(wrap_pyfunction!(compute_homography_py, m)?)?;
    Ok(())
}
