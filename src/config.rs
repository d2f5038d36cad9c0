use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::resolver::FailureReport;

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_YT_DLP: &str = "yt-dlp";

/// One entry of the ordered strategy list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrategyConfig {
    Direct {
        #[serde(default)]
        lang: Option<String>,
    },
    Proxied {
        proxy: String,
        #[serde(default)]
        lang: Option<String>,
    },
    AlternateTool {
        #[serde(default)]
        lang: Option<String>,
    },
}

impl StrategyConfig {
    pub fn lang(&self) -> Option<&str> {
        match self {
            StrategyConfig::Direct { lang }
            | StrategyConfig::Proxied { lang, .. }
            | StrategyConfig::AlternateTool { lang } => lang.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub lang: Option<String>,
    pub model: Option<String>,
    pub attempt_timeout_secs: Option<u64>,
    pub failure_report: Option<FailureReport>,
    pub lenient_ids: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub yt_dlp_path: Option<String>,
    pub strategies: Option<Vec<StrategyConfig>>,
}

impl Config {
    /// Load config from ~/.config/ytsum/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            Self::parse(&content)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Configured strategies, or direct followed by the alternate tool.
    ///
    /// Extra proxies are tried right after the first direct entry (or first
    /// of all when there is none). Without fallback, alternate-tool entries
    /// are dropped.
    pub fn strategies(&self, extra_proxies: &[String], fallback: bool) -> Vec<StrategyConfig> {
        let mut strategies = self.strategies.clone().unwrap_or_else(|| {
            vec![
                StrategyConfig::Direct { lang: None },
                StrategyConfig::AlternateTool { lang: None },
            ]
        });

        let insert_at = strategies
            .iter()
            .position(|s| matches!(s, StrategyConfig::Direct { .. }))
            .map_or(0, |i| i + 1);
        for (offset, proxy) in extra_proxies.iter().enumerate() {
            strategies.insert(
                insert_at + offset,
                StrategyConfig::Proxied {
                    proxy: proxy.clone(),
                    lang: None,
                },
            );
        }

        if !fallback {
            strategies.retain(|s| !matches!(s, StrategyConfig::AlternateTool { .. }));
        }
        strategies
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytsum")
        .join("config.toml")
}
