//! Fns to read variables from the environment more conveniently. Every
//! variable this crate reads is optional and has a sensible default — the
//! public data sources need no API keys.

use std::env;

use lazy_static::lazy_static;
use tracing::debug;

const DEFAULT_MEMPOOL_API_URL: &str = "https://mempool.space/api";
const DEFAULT_ADDRESSES_CSV: &str = "cex_address.csv";

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(e) => panic!("{e}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        debug!("env var {key}: {existing_var}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

pub fn get_env_bool(key: &str) -> Option<bool> {
    get_env_var(key).map(|var| match var.to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        "t" => true,
        "f" => false,
        "1" => true,
        "0" => false,
        str => panic!("invalid bool value {str} for {key}"),
    })
}

pub struct EnvConfig {
    pub addresses_csv: String,
    pub log_json: bool,
    pub log_perf: bool,
    pub mempool_api_url: String,
}

pub fn get_env_config() -> EnvConfig {
    EnvConfig {
        addresses_csv: get_env_var("ADDRESSES_CSV")
            .unwrap_or_else(|| DEFAULT_ADDRESSES_CSV.to_string()),
        log_json: get_env_bool("LOG_JSON").unwrap_or(false),
        log_perf: get_env_bool("LOG_PERF").unwrap_or(false),
        mempool_api_url: get_env_var("MEMPOOL_API_URL")
            .unwrap_or_else(|| DEFAULT_MEMPOOL_API_URL.to_string()),
    }
}
