use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::debug;
use regex::Regex;
use tokio::process::Command;

use crate::resolver::CaptionStrategy;
use crate::{Segment, StrategyKind, Transcript};

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WORD_TIMING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\d{2}:\d{2}:\d{2}\.\d{3}>").unwrap());

/// Subtitle fetch through the `yt-dlp` binary.
///
/// Only subtitle tracks are written (manual or auto-generated, no media), and
/// the WebVTT payload is read back and parsed before returning.
pub struct YtDlpFetcher {
    binary: String,
    lang: String,
}

impl YtDlpFetcher {
    pub fn new(binary: &str, lang: &str) -> Self {
        Self {
            binary: binary.to_string(),
            lang: lang.to_string(),
        }
    }
}

#[async_trait]
impl CaptionStrategy for YtDlpFetcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AlternateTool
    }

    fn label(&self) -> String {
        format!("alternate-tool({})", self.binary)
    }

    async fn fetch(&self, video_id: &str) -> Result<Transcript> {
        let work_dir = tempfile::Builder::new().prefix("ytsum-").tempdir()?;
        let title = download_subtitles(&self.binary, video_id, &self.lang, work_dir.path()).await?;

        let Some(path) = pick_subtitle_file(work_dir.path(), video_id, &self.lang)? else {
            bail!("yt-dlp wrote no '{}' subtitles for video {video_id}", self.lang);
        };
        debug!("Reading subtitles from {}", path.display());

        let vtt = tokio::fs::read_to_string(&path).await?;
        let segments = parse_vtt(&vtt)?;

        Ok(Transcript {
            video_id: video_id.to_string(),
            title,
            language: subtitle_lang(&path).unwrap_or_else(|| self.lang.clone()),
            source: StrategyKind::AlternateTool,
            segments,
        })
    }
}

/// Run yt-dlp for subtitles only; returns the video title it printed
async fn download_subtitles(binary: &str, video_id: &str, lang: &str, out_dir: &Path) -> Result<String> {
    let url = format!("https://www.youtube.com/watch?v={video_id}");
    let output_template = out_dir.join("%(id)s.%(ext)s");
    let sub_langs = format!("{lang}.*");

    debug!("Fetching subtitles via {binary}: {url}");

    let output = Command::new(binary)
        .args([
            "--skip-download",
            "--write-sub",
            "--write-auto-sub",
            "--sub-langs",
            &sub_langs,
            "--sub-format",
            "vtt",
            "--no-playlist",
            "--no-warnings",
            "--print",
            "title",
            "--no-simulate",
            "-o",
        ])
        .arg(&output_template)
        .arg(&url)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(o) if o.status.success() => Ok(String::from_utf8_lossy(&o.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()),
        Ok(o) => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            bail!("yt-dlp exited with status {}: {}", o.status, stderr.trim());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("{binary} not found; install yt-dlp to enable the alternate-tool fallback");
        }
        Err(e) => bail!("failed to run {binary}: {e}"),
    }
}

/// Prefer `<id>.<lang>.vtt`, otherwise the first `.vtt` by name
fn pick_subtitle_file(dir: &Path, video_id: &str, lang: &str) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("vtt"))
        .collect();
    candidates.sort();

    let exact = dir.join(format!("{video_id}.{lang}.vtt"));
    if candidates.contains(&exact) {
        return Ok(Some(exact));
    }
    Ok(candidates.into_iter().next())
}

/// `abc.en-orig.vtt` -> `en-orig`
fn subtitle_lang(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit_once('.').map(|(_, lang)| lang.to_string())
}

/// Parse WebVTT into segments, one per distinct caption line.
///
/// YouTube's auto-generated tracks roll: each cue repeats the previous line
/// and short filler cues repeat it again. On such tracks (recognized by their
/// word timing tags) a line identical to the last emitted one is dropped.
/// Manual tracks keep every line, repeats included.
fn parse_vtt(input: &str) -> Result<Vec<Segment>> {
    let mut lines = input.lines();
    let header = lines.next().unwrap_or_default().trim_start_matches('\u{FEFF}');
    if !header.starts_with("WEBVTT") {
        bail!("subtitle file is not WebVTT");
    }
    let rolling = WORD_TIMING.is_match(input) || input.contains("<c>");

    let mut segments = Vec::new();
    let mut last_line = String::new();
    let mut cue: Option<(f64, f64)> = None;
    let mut in_skipped_block = false;

    for raw in lines {
        // only a truly empty line ends a cue; auto tracks use " " as filler
        if raw.is_empty() {
            cue = None;
            in_skipped_block = false;
            continue;
        }
        let line = raw.trim();
        if in_skipped_block {
            continue;
        }

        if line.contains("-->") {
            cue = parse_timing(line);
            continue;
        }

        let Some((start, end)) = cue else {
            // header metadata, cue identifiers, NOTE/STYLE/REGION blocks
            if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
                in_skipped_block = true;
            }
            continue;
        };

        let stripped = INLINE_TAG.replace_all(line, "");
        let text = html_escape::decode_html_entities(stripped.trim()).to_string();
        if text.is_empty() || (rolling && text == last_line) {
            continue;
        }

        segments.push(Segment {
            text: text.clone(),
            start,
            duration: (end - start).max(0.0),
        });
        last_line = text;
    }

    Ok(segments)
}

fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `HH:MM:SS.mmm` or `MM:SS.mmm` to seconds
fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut parts = ts.rsplit(':');
    let seconds: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let hours: f64 = match parts.next() {
        Some(h) => h.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
