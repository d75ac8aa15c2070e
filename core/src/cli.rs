use std::fmt::Write;

use crate::analyze_session::SetReport;

fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_finite() { format!("{:.*}", decimals, v) } else { "-".to_string() }
}

/// Lesbar sett-rapport. NaN vises som "-".
pub fn format_set_report(report: &SetReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Set Report ---");
    let _ = writeln!(
        out,
        "Exercise: {:?}  Load: {} kg  FPS: {}",
        report.exercise,
        fmt_num(report.mass_kg, 1),
        fmt_num(report.fps, 1)
    );
    let _ = writeln!(out, "Reps: {}", report.rep_count());

    for r in &report.reps {
        let m = &r.metrics;
        let reasons: Vec<&str> = r.integrity.reasons.iter().map(|x| x.code()).collect();
        let _ = writeln!(
            out,
            "#{:<2} mcv {} pcv {} mpv {} rom {} m  loss {}%  conf {}  integrity {}{}",
            r.index + 1,
            fmt_num(m.mean_con_vel, 2),
            fmt_num(m.peak_con_vel, 2),
            fmt_num(m.mpv, 2),
            fmt_num(m.rom_m, 2),
            fmt_num(m.vel_loss_pct, 1),
            fmt_num(r.validation.confidence, 2),
            fmt_num(r.integrity.score, 1),
            if reasons.is_empty() { String::new() } else { format!(" [{}]", reasons.join(", ")) }
        );
    }

    if let Some(lv) = &report.load_velocity {
        let _ = writeln!(
            out,
            "LV slope: {} m/s/kg (r² {})",
            fmt_num(lv.slope, 4),
            fmt_num(lv.r_squared, 2)
        );
    }
    let _ = writeln!(out, "Mean confidence: {}", fmt_num(report.mean_confidence(), 2));
    out
}

pub fn print_set_report(report: &SetReport) {
    print!("{}", format_set_report(report));
}
