// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ArisaError, Result};
use crate::watch::filter::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ArisaError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.log))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_paths(cfg)?;
    validate_exclude_patterns(cfg)?;
    Ok(())
}

fn ensure_has_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.paths.is_empty() {
        return Err(ArisaError::ConfigError(
            "[watch].paths must list at least one path".to_string(),
        ));
    }

    if cfg.watch.paths.iter().any(|p| p.as_os_str().is_empty()) {
        return Err(ArisaError::ConfigError(
            "[watch].paths must not contain empty paths".to_string(),
        ));
    }

    Ok(())
}

fn validate_exclude_patterns(cfg: &RawConfigFile) -> Result<()> {
    // Compiling the full set reports the first broken pattern.
    build_globset(&cfg.watch.exclude)?;
    Ok(())
}
