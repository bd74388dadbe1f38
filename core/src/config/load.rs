use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

pub const ENV_LOG_LEVEL: &str = "CADENCE_LOG_LEVEL";
pub const ENV_MAX_RETRIES: &str = "CADENCE_MAX_RETRIES";
pub const ENV_MAX_REFINEMENT_ATTEMPTS: &str = "CADENCE_MAX_REFINEMENT_ATTEMPTS";
pub const ENV_OUTPUT_FORMAT: &str = "CADENCE_OUTPUT_FORMAT";

/// Get the default cadence data directory: ~/.cadence
pub fn get_cadence_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::Invalid("cannot determine home directory".into()))?;
    Ok(PathBuf::from(home).join(".cadence"))
}

/// Load the effective configuration.
///
/// The first file found wins: `explicit`, then `~/.cadence/config.toml`, then
/// `./cadence.toml`; otherwise defaults. Environment overrides are applied last and
/// the result is validated.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut cfg = match explicit {
        Some(path) => read_file(path)?,
        None => load_default_file()?,
    };
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    load(None)
}

fn load_default_file() -> Result<AppConfig, ConfigError> {
    // A missing home directory only disables the user-level file.
    if let Ok(dir) = get_cadence_data_dir() {
        let user_config = dir.join("config.toml");
        if user_config.exists() {
            return read_file(&user_config);
        }
    }

    let local_config = Path::new("cadence.toml");
    if local_config.exists() {
        return read_file(local_config);
    }

    Ok(AppConfig::default())
}

pub fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Apply `CADENCE_*` overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_LOG_LEVEL) {
        cfg.logging.level = v.trim().to_string();
    }
    if let Some(v) = get(ENV_MAX_RETRIES) {
        cfg.retry.max_retries = parse_number(ENV_MAX_RETRIES, &v)?;
    }
    if let Some(v) = get(ENV_MAX_REFINEMENT_ATTEMPTS) {
        cfg.learning.max_refinement_attempts = parse_number(ENV_MAX_REFINEMENT_ATTEMPTS, &v)?;
    }
    if let Some(v) = get(ENV_OUTPUT_FORMAT) {
        cfg.output.format = v.parse()?;
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a non-negative integer, got '{value}'")))
}
