use std::path::Path;

use log::info;

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::io::parse_json;

/// Leser inn config fra disk (JSON).
/// Hvis filen ikke finnes, returneres default-config.
pub fn load_config<P: AsRef<Path>>(path: P) -> CoreResult<CoreConfig> {
    let path = path.as_ref();
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let cfg: CoreConfig = parse_json(&contents)?;
        info!(
            "config loaded from {} (strictness={:?})",
            path.display(),
            cfg.segmentation.strictness
        );
        Ok(cfg)
    } else {
        info!("no config at {}, using defaults", path.display());
        Ok(CoreConfig::default())
    }
}

/// Lagrer config til disk som JSON (pretty-print).
pub fn save_config<P: AsRef<Path>>(cfg: &CoreConfig, path: P) -> CoreResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(cfg).map_err(|e| crate::error::CoreError::Json {
        path: String::from("."),
        source: e,
    })?;
    std::fs::write(path, json)?;
    info!(
        "config saved to {} (strictness={:?})",
        path.display(),
        cfg.segmentation.strictness
    );
    Ok(())
}
