use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const APP_DIR_NAME: &str = "inbox-sync";
const TOKEN_ENV_VAR: &str = "INBOX_SYNC_TOKEN";

/// Loads the config file over defaults, then applies the token env override.
///
/// Without an explicit path, `./config.toml` is tried first and then
/// `<config dir>/inbox-sync/config.toml`. A missing file yields defaults.
pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    load_internal(&config_path, env::var(TOKEN_ENV_VAR).ok())
}

pub(crate) fn load_internal(
    config_path: &Path,
    token_override: Option<String>,
) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path).map_err(|source| AppError::ConfigRead {
            path: config_path.to_path_buf(),
            source,
        })?;

        let file_config: FileConfig =
            toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
                path: config_path.to_path_buf(),
                source,
            })?;

        file_config.merge_into(&mut config);
    }

    if let Some(token) = token_override.filter(|token| !token.trim().is_empty()) {
        config.api.token = token;
    }

    Ok(config)
}

fn default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(DEFAULT_CONFIG_PATH))
        .filter(|candidate| candidate.exists())
        .unwrap_or(local)
}
