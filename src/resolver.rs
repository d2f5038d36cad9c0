use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::error::ALL_STRATEGIES_FAILED;
use crate::youtube::CaptionFetcher;
use crate::ytdlp::YtDlpFetcher;
use crate::{Error, StrategyFailure, StrategyKind, Transcript};

/// One way of turning a video ID into a transcript
#[async_trait]
pub trait CaptionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Name used in logs and failure reports
    fn label(&self) -> String {
        self.kind().to_string()
    }

    async fn fetch(&self, video_id: &str) -> Result<Transcript>;
}

/// What message to surface once every strategy has failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReport {
    #[default]
    Aggregate,
    LastError,
}

/// Tries strategies in order until one produces a transcript.
///
/// Attempts are sequential and each one is bounded by `attempt_timeout`. The
/// first success wins; nothing after it is invoked.
pub struct Resolver {
    strategies: Vec<Box<dyn CaptionStrategy>>,
    attempt_timeout: Duration,
    report: FailureReport,
}

impl Resolver {
    pub fn new(strategies: Vec<Box<dyn CaptionStrategy>>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            attempt_timeout,
            report: FailureReport::default(),
        }
    }

    pub fn with_report(mut self, report: FailureReport) -> Self {
        self.report = report;
        self
    }

    pub fn strategy_labels(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.label()).collect()
    }

    pub async fn resolve(&self, video_id: &str) -> std::result::Result<Transcript, Error> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match self.attempt(&**strategy, video_id).await {
                Ok(transcript) => {
                    info!(
                        "{} succeeded for {video_id}: {} segments",
                        strategy.label(),
                        transcript.segments.len()
                    );
                    return Ok(transcript);
                }
                Err(Error::StrategyFailed(failure)) => {
                    warn!("{failure}");
                    failures.push(failure);
                }
                Err(e) => return Err(e),
            }
        }

        let message = match (self.report, failures.last()) {
            (FailureReport::LastError, Some(last)) => last.to_string(),
            _ => ALL_STRATEGIES_FAILED.to_string(),
        };

        Err(Error::AllStrategiesExhausted { message, failures })
    }

    /// Run one strategy under the attempt timeout
    pub async fn attempt(
        &self,
        strategy: &dyn CaptionStrategy,
        video_id: &str,
    ) -> std::result::Result<Transcript, Error> {
        let label = strategy.label();
        info!("Trying {label} for {video_id}");

        let cause = match tokio::time::timeout(self.attempt_timeout, strategy.fetch(video_id)).await {
            Ok(Ok(transcript)) => return Ok(transcript),
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("timed out after {:?}", self.attempt_timeout),
        };

        debug!("{label} error detail: {cause}");
        Err(Error::StrategyFailed(StrategyFailure {
            kind: strategy.kind(),
            label,
            cause,
        }))
    }
}

/// Build strategy objects from configuration, in configured order.
///
/// An unusable proxy address is reported here rather than per request.
pub fn build_strategies(
    configs: &[StrategyConfig],
    default_lang: &str,
    attempt_timeout: Duration,
    yt_dlp_path: &str,
) -> Result<Vec<Box<dyn CaptionStrategy>>> {
    configs
        .iter()
        .map(|config| -> Result<Box<dyn CaptionStrategy>> {
            let lang = config.lang().unwrap_or(default_lang);
            let strategy: Box<dyn CaptionStrategy> = match config {
                StrategyConfig::Direct { .. } => Box::new(CaptionFetcher::direct(lang, attempt_timeout)?),
                StrategyConfig::Proxied { proxy, .. } => {
                    Box::new(CaptionFetcher::proxied(proxy, lang, attempt_timeout)?)
                }
                StrategyConfig::AlternateTool { .. } => Box::new(YtDlpFetcher::new(yt_dlp_path, lang)),
            };
            Ok(strategy)
        })
        .collect()
}
