pub mod config;
pub mod error;
pub mod resolver;
pub mod server;
pub mod service;
pub mod summarize;
pub mod youtube;
pub mod ytdlp;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use error::{Error, StrategyFailure};

/// A single captioned segment
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Which acquisition strategy produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Direct,
    Proxied,
    AlternateTool,
}

/// Complete transcript for a video
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub title: String,
    pub language: String,
    pub source: StrategyKind,
    pub segments: Vec<Segment>,
}

impl Transcript {
    /// Caption text joined with single spaces, in time order.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Direct => write!(f, "direct"),
            StrategyKind::Proxied => write!(f, "proxied"),
            StrategyKind::AlternateTool => write!(f, "alternate-tool"),
        }
    }
}

// watch, short link, embed, shorts; tried in this order
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?(?:.*&)?v=([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extract video ID from the recognized YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| caps[1].to_string())
}

/// Lenient ID derivation: whatever follows the last `v=`, up to the next `&`.
///
/// The token shape is not checked, so anything containing `v=` (or nothing at
/// all) produces an ID. Only used when `lenient_ids` is enabled.
pub fn legacy_video_id(input: &str) -> Option<String> {
    let tail = input.trim().rsplit("v=").next().unwrap_or_default();
    let id = tail.split('&').next().unwrap_or_default();
    if id.is_empty() { None } else { Some(id.to_string()) }
}
