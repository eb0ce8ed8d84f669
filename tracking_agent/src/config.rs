use std::{path::Path, time::Duration};

use anyhow::{Context, bail};

/// Agent settings, read from a small key=value file. Lines starting with
/// `#` are comments.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_base: String,
    pub poll_interval: Duration,
    pub log_dir: String,
}

impl AgentConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut api_base = None;
        let mut poll_interval = Duration::from_secs(2 * 60);
        let mut log_dir = "log".to_string();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                bail!("malformed config line: {line}");
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "api_base" => api_base = Some(value.to_string()),
                "poll_interval_secs" => {
                    let secs: u64 = value
                        .parse()
                        .with_context(|| format!("invalid poll_interval_secs: {value}"))?;
                    poll_interval = Duration::from_secs(secs);
                }
                "log_dir" => log_dir = value.to_string(),
                _ => tracing::warn!("unknown config key: {key}"),
            }
        }

        Ok(Self {
            api_base: api_base.context("api_base missing from config")?,
            poll_interval,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = AgentConfig::parse(
            "# agent settings\n\
             api_base = https://tracker.example.com\n\
             poll_interval_secs = 30\n\
             log_dir = /var/log/agent\n",
        )
        .unwrap();

        assert_eq!(config.api_base, "https://tracker.example.com");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.log_dir, "/var/log/agent");
    }

    #[test]
    fn poll_interval_defaults_to_two_minutes() {
        let config = AgentConfig::parse("api_base = http://localhost:8080").unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(120));
    }

    #[test]
    fn api_base_is_required() {
        assert!(AgentConfig::parse("poll_interval_secs = 30").is_err());
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(AgentConfig::parse("api_base http://localhost").is_err());
    }
}
