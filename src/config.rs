use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{TapError, TapResult};

/// Tap configuration, loaded once at startup from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub start_date: DateTime<Utc>,
    pub user_agent: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    7
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load and validate configuration from a JSON file.
    ///
    /// Missing required keys (`client_id`, `client_secret`, `start_date`)
    /// fail here, before any network activity.
    pub fn from_file(path: &Path) -> TapResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TapError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| TapError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Read the optional state file as a whole JSON document.
pub fn load_state_file(path: &Path) -> TapResult<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| TapError::Config(format!("cannot read state {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| TapError::Config(format!("invalid state {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_temp(
            r#"{
                "client_id": "abc",
                "client_secret": "shh",
                "start_date": "2020-01-01T00:00:00Z",
                "user_agent": "tap-wootric test"
            }"#,
        );

        let cfg = Config::from_file(file.path()).expect("config should load");
        assert_eq!(cfg.client_id, "abc");
        assert_eq!(cfg.client_secret, "shh");
        assert_eq!(cfg.start_date.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert_eq!(cfg.user_agent.as_deref(), Some("tap-wootric test"));
        assert_eq!(cfg.max_retries, 7);
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn missing_required_key_fails() {
        let file = write_temp(r#"{"client_id": "abc", "start_date": "2020-01-01T00:00:00Z"}"#);
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, TapError::Config(_)), "got: {err}");
        assert!(err.to_string().contains("client_secret"), "got: {err}");
    }

    #[test]
    fn invalid_start_date_fails() {
        let file = write_temp(
            r#"{"client_id": "a", "client_secret": "b", "start_date": "not-a-date"}"#,
        );
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, TapError::Config(_)));
    }

    #[test]
    fn missing_file_fails() {
        let err = Config::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, TapError::Config(_)));
    }

    #[test]
    fn state_file_round_trips() {
        let file = write_temp(r#"{"end_users": "2021-06-01T00:00:00Z"}"#);
        let value = load_state_file(file.path()).expect("state should load");
        assert_eq!(value["end_users"], "2021-06-01T00:00:00Z");
    }

    #[test]
    fn malformed_state_file_fails() {
        let file = write_temp("not json");
        let err = load_state_file(file.path()).unwrap_err();
        assert!(matches!(err, TapError::Config(_)));
    }
}
