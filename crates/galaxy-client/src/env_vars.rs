//! Environment variable overrides for [`Settings`]

use std::env;

use crate::config::Settings;

/// Galaxy server URL
pub const ENV_URL: &str = "GALAXY_URL";
/// Galaxy API key
pub const ENV_API_KEY: &str = "GALAXY_API_KEY";
/// Per-attempt timeout in milliseconds
pub const ENV_TIMEOUT_MS: &str = "GALAXY_TIMEOUT_MS";
/// Retry count
pub const ENV_RETRY: &str = "GALAXY_RETRY";
/// Delay between attempts in milliseconds
pub const ENV_RETRY_DELAY_MS: &str = "GALAXY_RETRY_DELAY_MS";

impl Settings {
    /// Override settings with the `GALAXY_*` environment variables
    ///
    /// Numeric values that do not parse are ignored with a warning.
    pub fn from_env(mut self) -> Self {
        if let Ok(url) = env::var(ENV_URL) {
            self.galaxy.url = url;
        }

        if let Ok(api_key) = env::var(ENV_API_KEY) {
            self.galaxy.api_key = api_key;
        }

        if let Some(timeout) = parse_var(ENV_TIMEOUT_MS) {
            self.http.timeout_ms = Some(timeout);
        }

        if let Some(retry) = parse_var(ENV_RETRY) {
            self.http.retry = Some(retry);
        }

        if let Some(delay) = parse_var(ENV_RETRY_DELAY_MS) {
            self.http.retry_delay_ms = Some(delay);
        }

        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Invalid value '{}' for environment variable {}", value, name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_overrides() {
        env::set_var(ENV_URL, "https://usegalaxy.org");
        env::set_var(ENV_API_KEY, "from-env");
        env::set_var(ENV_RETRY, "3");
        env::set_var(ENV_TIMEOUT_MS, "not a number");

        let mut settings = Settings::default();
        settings.http.timeout_ms = Some(1000);
        let settings = settings.from_env();

        env::remove_var(ENV_URL);
        env::remove_var(ENV_API_KEY);
        env::remove_var(ENV_RETRY);
        env::remove_var(ENV_TIMEOUT_MS);

        assert_eq!(settings.galaxy.url, "https://usegalaxy.org");
        assert_eq!(settings.galaxy.api_key, "from-env");
        assert_eq!(settings.http.retry, Some(3));
        assert_eq!(settings.http.timeout_ms, Some(1000));
        assert_eq!(settings.http.retry_delay_ms, None);
    }
}
