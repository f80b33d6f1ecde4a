use std::env;
use std::time::Duration;

use url::Url;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

const API_URL_VAR: &str = "ASSISTANT_API_URL";
const POLL_SECS_VAR: &str = "ASSISTANT_POLL_SECS";

const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
const DEFAULT_POLL_SECS: u64 = 30;

/// Timeout applied to every backend request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URL of the assistant backend, from ASSISTANT_API_URL.
pub fn api_base_url() -> anyhow::Result<Url> {
    let raw = env::var(API_URL_VAR).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let url = Url::parse(&raw)?;
    Ok(url)
}

/// Refresh interval for the background poller, from ASSISTANT_POLL_SECS.
pub fn poll_interval() -> Duration {
    match env::var(POLL_SECS_VAR) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                log::warn!("Ignoring invalid {} value {:?}", POLL_SECS_VAR, raw);
                Duration::from_secs(DEFAULT_POLL_SECS)
            }
        },
        Err(_) => Duration::from_secs(DEFAULT_POLL_SECS),
    }
}
