// core/tests/test_metrics.rs
use velox_core::metrics::{
    compute_rep_metrics, compute_set_metrics, estimate_one_rep_max, fit_load_velocity, RepInputs,
    G,
};
use velox_core::models::Phase;

/// Enkel rep: 10 eksentriske samples på −0.5 m/s, 5 isometriske, 10 konsentriske på +0.6 m/s.
fn simple_rep(mass_kg: f64, con_v: f64) -> RepInputs {
    let mut velocity = Vec::new();
    let mut phases = Vec::new();
    for _ in 0..10 {
        velocity.push(-0.5);
        phases.push(Phase::Eccentric);
    }
    for _ in 0..5 {
        velocity.push(0.0);
        phases.push(Phase::Isometric);
    }
    for _ in 0..10 {
        velocity.push(con_v);
        phases.push(Phase::Concentric);
    }
    let n = velocity.len();
    let t_ms: Vec<f64> = (0..n).map(|i| i as f64 * 20.0).collect();
    let position_m: Vec<f64> = (0..n)
        .map(|i| if i < 10 { 1.0 - 0.04 * i as f64 } else if i < 15 { 0.6 } else { 0.6 + 0.04 * (i - 14) as f64 })
        .collect();
    RepInputs {
        mass_kg,
        position_m,
        velocity,
        acceleration: vec![0.0; n],
        t_ms,
        phases,
    }
}

#[test]
fn rep_metrics_from_labelled_series() {
    let m = compute_rep_metrics(&simple_rep(100.0, 0.6));
    assert!((m.mean_con_vel - 0.6).abs() < 1e-12);
    assert!((m.peak_con_vel - 0.6).abs() < 1e-12);
    assert!((m.mean_ecc_vel - 0.5).abs() < 1e-12, "eccentric velocity is reported as magnitude");
    assert!((m.peak_ecc_vel - 0.5).abs() < 1e-12);
    assert!((m.mpv - 0.6).abs() < 1e-12);
    assert!((m.rom_m - 0.4).abs() < 1e-9);
    assert!((m.tut_ms - 480.0).abs() < 1e-12);
    // a = 0 → P = m·g·v
    assert!((m.power_w - 100.0 * G * 0.6).abs() < 1e-9);
    assert!(m.vel_loss_pct.is_nan(), "set-scoped field stays NaN on a lone rep");
    assert!(m.is_complete());
}

#[test]
fn malformed_inputs_give_nan_not_panic() {
    let mut bad = simple_rep(100.0, 0.6);
    bad.phases.pop();
    let m = compute_rep_metrics(&bad);
    assert!(m.mean_con_vel.is_nan() && m.rom_m.is_nan() && m.power_w.is_nan());
    assert!(!m.is_complete());

    let empty = RepInputs::default();
    assert!(compute_rep_metrics(&empty).tut_ms.is_nan());
}

#[test]
fn missing_concentric_phase_leaves_velocity_nan() {
    let mut r = simple_rep(60.0, 0.6);
    r.phases = vec![Phase::Eccentric; r.velocity.len()];
    let m = compute_rep_metrics(&r);
    assert!(m.mean_con_vel.is_nan());
    assert!(m.peak_con_vel.is_nan());
    assert!(m.mean_ecc_vel.is_finite());
}

#[test]
fn non_positive_mass_has_no_power() {
    let m = compute_rep_metrics(&simple_rep(0.0, 0.6));
    assert!(m.power_w.is_nan());
    assert!(m.mean_con_vel.is_finite());
}

#[test]
fn velocity_loss_is_relative_to_first_rep() {
    let reps = vec![simple_rep(100.0, 0.8), simple_rep(100.0, 0.6), simple_rep(100.0, 0.4)];
    let set = compute_set_metrics(&reps);
    assert_eq!(set.len(), 3);
    assert!(set[0].vel_loss_pct.abs() < 1e-12);
    assert!((set[1].vel_loss_pct - 25.0).abs() < 1e-9);
    assert!((set[2].vel_loss_pct - 50.0).abs() < 1e-9);
    // Én last: ingen profil
    assert!(set.iter().all(|m| m.lv_slope.is_none() && m.est_1rm.is_none()));
}

#[test]
fn load_velocity_profile_and_one_rep_max() {
    // v = 1.3 − 0.01·kg → 1RM ved 0.15 m/s = 115 kg
    let reps = vec![simple_rep(60.0, 0.7), simple_rep(80.0, 0.5), simple_rep(100.0, 0.3)];
    let set = compute_set_metrics(&reps);
    for m in &set {
        let slope = m.lv_slope.expect("distinct loads give a slope");
        assert!((slope + 0.01).abs() < 1e-9);
        assert_eq!(m.lv_slope_is_plausible(), Some(true));
        assert!((m.est_1rm.unwrap() - 115.0).abs() < 1e-6);
    }

    let profile = fit_load_velocity(&[(60.0, 0.7), (80.0, 0.5), (100.0, 0.3)]).unwrap();
    assert!(profile.is_plausible());
    assert!((profile.r_squared - 1.0).abs() < 1e-9);
    assert_eq!(profile.n, 3);
    assert!((estimate_one_rep_max(&profile, 0.3).unwrap() - 100.0).abs() < 1e-6);
}

#[test]
fn rising_velocity_with_load_is_flagged_implausible() {
    let reps = vec![simple_rep(60.0, 0.4), simple_rep(100.0, 0.6)];
    let set = compute_set_metrics(&reps);
    assert_eq!(set[0].lv_slope_is_plausible(), Some(false));
}

#[test]
fn profile_needs_two_distinct_loads() {
    assert!(fit_load_velocity(&[(100.0, 0.5)]).is_none());
    assert!(fit_load_velocity(&[(100.0, 0.5), (100.0, 0.4)]).is_none());
    assert!(fit_load_velocity(&[(f64::NAN, 0.5), (100.0, 0.4)]).is_none());
}
