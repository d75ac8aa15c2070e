//! velox-report <request.json> [--config <config.json>] [--json] [--metrics]
use anyhow::{bail, Context, Result};

use velox_core::cli::print_set_report;
use velox_core::io::parse_session_request;
use velox_core::storage::load_config;
use velox_core::{analyze_set, telemetry};

struct Args {
    request: String,
    config: Option<String>,
    json: bool,
    metrics: bool,
}

fn parse_args() -> Result<Args> {
    let mut request = None;
    let mut config = None;
    let mut json = false;
    let mut metrics = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => config = Some(it.next().context("--config needs a path")?),
            "--json" => json = true,
            "--metrics" => metrics = true,
            other if other.starts_with("--") => bail!("unknown flag {other}"),
            other => request = Some(other.to_string()),
        }
    }
    let request = request.context("usage: velox-report <request.json> [--config <path>] [--json] [--metrics]")?;
    Ok(Args { request, config, json, metrics })
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let raw = std::fs::read_to_string(&args.request)
        .with_context(|| format!("reading {}", args.request))?;
    let mut req = parse_session_request(&raw)
        .with_context(|| format!("parsing {}", args.request))?;
    if let Some(path) = &args.config {
        req.session.config = load_config(path).with_context(|| format!("loading config {path}"))?;
    }

    let report = analyze_set(&req.frames, &req.session);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_set_report(&report);
    }
    if args.metrics {
        print!("{}", telemetry::gather_text());
    }
    Ok(())
}
