use std::sync::Arc;

use log::{error, info};
use serde::Serialize;

use crate::resolver::Resolver;
use crate::summarize::Summarizer;
use crate::{Error, Transcript, extract_video_id, legacy_video_id};

/// Result of a successful request
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub video_id: String,
    pub title: String,
    pub summary: String,
}

/// Extract -> resolve -> summarize, one request at a time.
///
/// Success and failure are told apart only by the `Result` variant; the
/// transcript text itself is never inspected.
pub struct SummaryService {
    resolver: Resolver,
    summarizer: Option<Arc<dyn Summarizer>>,
    lenient_ids: bool,
}

impl SummaryService {
    pub fn new(resolver: Resolver, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self {
            resolver,
            summarizer,
            lenient_ids: false,
        }
    }

    pub fn with_lenient_ids(mut self, lenient: bool) -> Self {
        self.lenient_ids = lenient;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn video_id(&self, url: &str) -> Result<String, Error> {
        extract_video_id(url)
            .or_else(|| if self.lenient_ids { legacy_video_id(url) } else { None })
            .ok_or_else(|| Error::InvalidUrl(url.trim().to_string()))
    }

    pub async fn transcript(&self, url: &str) -> Result<Transcript, Error> {
        let video_id = self.video_id(url)?;
        self.resolver.resolve(&video_id).await
    }

    pub async fn summarize(&self, url: &str) -> Result<Summary, Error> {
        // a bad URL is reported as such even when no summarizer is configured
        let video_id = self.video_id(url)?;
        let Some(summarizer) = &self.summarizer else {
            return Err(Error::ConfigMissing("summarizer API key".to_string()));
        };

        let transcript = self.resolver.resolve(&video_id).await?;
        let text = transcript.text();
        info!(
            "Summarizing {} ({} segments via {})",
            transcript.video_id,
            transcript.segments.len(),
            transcript.source
        );

        let summary = summarizer.summarize(&text).await.map_err(|e| {
            error!("Summarization of {} failed: {e:#}", transcript.video_id);
            Error::SummarizationFailed(format!("{e:#}"))
        })?;

        Ok(Summary {
            video_id: transcript.video_id,
            title: transcript.title,
            summary,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSummarizer, service};
    use super::*;
    use crate::error::ALL_STRATEGIES_FAILED;

    #[tokio::test]
    async fn test_summarize_success() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let svc = service(Ok(vec!["Hello", "world"]), Arc::clone(&summarizer));

        let summary = svc.summarize("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(summary.video_id, "dQw4w9WgXcQ");
        assert_eq!(summary.summary, "summary of: Hello world");
        assert_eq!(*summarizer.seen.lock().unwrap(), vec!["Hello world".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_resolver() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let svc = service(Ok(vec!["x"]), Arc::clone(&summarizer));

        let err = svc.summarize("https://example.com/video").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(summarizer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_is_not_summarized() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let svc = service(Err("no captions"), Arc::clone(&summarizer));

        let err = svc.summarize("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(err.user_message(), ALL_STRATEGIES_FAILED);
        assert!(summarizer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_word_in_transcript_is_forwarded() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let svc = service(Ok(vec!["Error:", "the", "talk", "begins"]), Arc::clone(&summarizer));

        let summary = svc.summarize("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(summary.summary, "summary of: Error: the talk begins");
    }

    #[tokio::test]
    async fn test_summarizer_failure() {
        let summarizer = Arc::new(RecordingSummarizer {
            fail: true,
            ..Default::default()
        });
        let svc = service(Ok(vec!["x"]), summarizer);

        let err = svc.summarize("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, Error::SummarizationFailed(_)));
        assert_eq!(err.user_message(), "Summarization failed.");
    }

    #[tokio::test]
    async fn test_lenient_ids() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let strict = service(Ok(vec!["x"]), Arc::clone(&summarizer));
        assert!(strict.video_id("https://example.com/?v=abc&x=1").is_err());

        let lenient = service(Ok(vec!["x"]), summarizer).with_lenient_ids(true);
        assert_eq!(lenient.video_id("https://example.com/?v=abc&x=1").unwrap(), "abc");
        // strict extraction still wins when it matches
        assert_eq!(
            lenient.video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_transcript_without_summarizer() {
        let strategy: Box<dyn crate::resolver::CaptionStrategy> =
            Box::new(super::testing::FixedStrategy(Ok(vec!["Hello", "world"])));
        let resolver = Resolver::new(vec![strategy], std::time::Duration::from_secs(5));
        let svc = SummaryService::new(resolver, None);

        let transcript = svc.transcript("https://www.youtube.com/shorts/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(transcript.text(), "Hello world");
        assert!(matches!(
            svc.summarize("https://www.youtube.com/shorts/dQw4w9WgXcQ").await,
            Err(Error::ConfigMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_without_summarizer() {
        let strategy: Box<dyn crate::resolver::CaptionStrategy> =
            Box::new(super::testing::FixedStrategy(Ok(vec!["x"])));
        let resolver = Resolver::new(vec![strategy], std::time::Duration::from_secs(5));
        let svc = SummaryService::new(resolver, None);

        let err = svc.summarize("not a youtube link").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(ref url) if url == "not a youtube link"));
    }
}
