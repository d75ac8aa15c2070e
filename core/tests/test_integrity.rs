// core/tests/test_integrity.rs
use velox_core::integrity::{
    check_rep, integrity_score, is_leaderboard_eligible, Exercise, IntegrityContext,
    IntegrityLimits, IntegrityReason, MovementCategory,
};
use velox_core::models::RepMetrics;

fn clean_squat() -> RepMetrics {
    RepMetrics {
        mean_con_vel: 0.55,
        peak_con_vel: 1.1,
        mean_ecc_vel: 0.4,
        peak_ecc_vel: 0.7,
        mpv: 0.6,
        rom_m: 0.45,
        tut_ms: 2100.0,
        power_w: 900.0,
        ..RepMetrics::nan()
    }
}

fn ctx(category: MovementCategory) -> IntegrityContext {
    IntegrityContext { category, lateral_jerk_cm: Some(0.01), fps: 60.0, rom_goal_m: None }
}

#[test]
fn clean_rep_passes_every_check() {
    let v = check_rep(Exercise::Squat, &clean_squat(), &ctx(MovementCategory::SquatDl), &IntegrityLimits::default());
    assert!(v.ok, "reasons: {:?}", v.reasons);
    assert_eq!(v.score, 1.0);
}

#[test]
fn each_violation_costs_twenty_percent() {
    let m = RepMetrics { peak_con_vel: 2.5, peak_ecc_vel: 2.0, rom_m: 0.1, ..clean_squat() };
    let c = IntegrityContext { lateral_jerk_cm: Some(0.2), fps: 24.0, ..ctx(MovementCategory::SquatDl) };
    let v = check_rep(Exercise::Squat, &m, &c, &IntegrityLimits::default());

    assert!(!v.ok);
    assert_eq!(
        v.reasons,
        vec![
            IntegrityReason::PeakConVelExceeded,
            IntegrityReason::PeakEccVelExceeded,
            IntegrityReason::RomBelowMin,
            IntegrityReason::LateralJerkExceeded,
            IntegrityReason::LowFps,
        ]
    );
    assert_eq!(v.score, 0.0, "five reasons floor the score at zero");
}

#[test]
fn score_formula_is_linear_then_floored() {
    for k in 0..8 {
        let expected = (1.0 - 0.2 * k as f64).max(0.0);
        assert!((integrity_score(k) - expected).abs() < 1e-12, "k={k}");
    }
}

#[test]
fn ceilings_depend_on_category() {
    // 2.5 m/s er for raskt for knebøy, men innenfor for olympiske løft
    let m = RepMetrics { peak_con_vel: 2.5, ..clean_squat() };
    let limits = IntegrityLimits::default();
    let squat = check_rep(Exercise::Squat, &m, &ctx(MovementCategory::SquatDl), &limits);
    let clean = check_rep(Exercise::Clean, &m, &ctx(MovementCategory::Olympic), &limits);
    assert_eq!(squat.reasons, vec![IntegrityReason::PeakConVelExceeded]);
    assert!((squat.score - 0.8).abs() < 1e-12);
    assert!(clean.ok);
}

#[test]
fn rom_minimum_scales_with_exercise_and_goal() {
    let limits = IntegrityLimits::default();
    // Benk: 0.8 × 0.3 = 0.24 m
    let m = RepMetrics { rom_m: 0.25, ..clean_squat() };
    assert!(check_rep(Exercise::Bench, &m, &ctx(MovementCategory::Bench), &limits).ok);
    // Knebøy: 0.9 × 0.3 = 0.27 m
    let squat = check_rep(Exercise::Squat, &m, &ctx(MovementCategory::SquatDl), &limits);
    assert_eq!(squat.reasons, vec![IntegrityReason::RomBelowMin]);

    // Eksplisitt mål
    let c = IntegrityContext { rom_goal_m: Some(0.2), ..ctx(MovementCategory::SquatDl) };
    assert!(check_rep(Exercise::Squat, &m, &c, &limits).ok);
    assert_eq!(limits.rom_fraction(Exercise::Hinge), 0.9);
}

#[test]
fn missing_jerk_is_not_a_violation_but_nan_metrics_are() {
    let limits = IntegrityLimits::default();
    let c = IntegrityContext { lateral_jerk_cm: None, ..ctx(MovementCategory::SquatDl) };
    assert!(check_rep(Exercise::Squat, &clean_squat(), &c, &limits).ok);

    let v = check_rep(Exercise::Squat, &RepMetrics::nan(), &c, &limits);
    assert_eq!(v.reasons, vec![IntegrityReason::NonFiniteMetrics]);
}

#[test]
fn leaderboard_needs_integrity_and_form() {
    let limits = IntegrityLimits::default();
    let good = check_rep(Exercise::Squat, &clean_squat(), &ctx(MovementCategory::SquatDl), &limits);
    assert!(is_leaderboard_eligible(&good, 0.8));
    assert!(!is_leaderboard_eligible(&good, 0.79), "perfect integrity does not excuse poor form");

    let bad = check_rep(
        Exercise::Squat,
        &clean_squat(),
        &IntegrityContext { fps: 20.0, ..ctx(MovementCategory::SquatDl) },
        &limits,
    );
    assert!(!is_leaderboard_eligible(&bad, 1.0));
}

#[test]
fn verdict_serialises_reason_codes() {
    let m = RepMetrics { rom_m: 0.05, ..clean_squat() };
    let v = check_rep(Exercise::Squat, &m, &ctx(MovementCategory::SquatDl), &IntegrityLimits::default());
    let json = serde_json::to_value(&v).unwrap();
    assert_eq!(json["reasons"][0], "rom_below_min");
    assert_eq!(json["ok"], false);
}

#[test]
fn limits_round_trip_through_json() {
    let limits = IntegrityLimits::default();
    let text = serde_json::to_string(&limits).unwrap();
    let back: IntegrityLimits = serde_json::from_str(&text).unwrap();
    assert_eq!(back, limits);
    assert_eq!(Exercise::Deadlift.category(), MovementCategory::SquatDl);
}

#[test]
fn lateral_jerk_is_compared_in_centimetres() {
    let limits: IntegrityLimits = serde_json::from_str(r#"{ "lateral_jerk_max": 0.5 }"#).unwrap();
    assert_eq!(limits.lateral_jerk_max_cm, 0.5);

    let c: IntegrityContext =
        serde_json::from_str(r#"{ "category": "squat_dl", "lateralJerkCm": 0.4, "fps": 60 }"#).unwrap();
    assert_eq!(c.lateral_jerk_cm, Some(0.4));
    assert!(check_rep(Exercise::Squat, &clean_squat(), &c, &limits).ok);

    let v = check_rep(Exercise::Squat, &clean_squat(), &c, &IntegrityLimits::default());
    assert_eq!(v.reasons, vec![IntegrityReason::LateralJerkExceeded]);
}
