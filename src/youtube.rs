use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::resolver::CaptionStrategy;
use crate::{Segment, StrategyKind, Transcript};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

static EMBEDDED_PLAYER_RESPONSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\});").unwrap());

/// Where the watch page keeps the InnerTube key, newest layout first
static API_KEY_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap(),
        Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).unwrap(),
    ]
});

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// "asr" for auto-generated tracks, absent for manual ones
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Caption fetch through YouTube's player API, optionally via a proxy.
///
/// Without a proxy this is the direct strategy; with one, every request
/// (watch page, player call, caption payload) goes through it.
pub struct CaptionFetcher {
    client: reqwest::Client,
    lang: String,
    proxy: Option<String>,
}

impl CaptionFetcher {
    pub fn direct(lang: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            lang: lang.to_string(),
            proxy: None,
        })
    }

    pub fn proxied(proxy: &str, lang: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy).wrap_err_with(|| format!("invalid proxy address: {proxy}"))?)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            lang: lang.to_string(),
            proxy: Some(proxy.to_string()),
        })
    }
}

#[async_trait]
impl CaptionStrategy for CaptionFetcher {
    fn kind(&self) -> StrategyKind {
        if self.proxy.is_some() {
            StrategyKind::Proxied
        } else {
            StrategyKind::Direct
        }
    }

    fn label(&self) -> String {
        match &self.proxy {
            Some(proxy) => format!("proxied({proxy})"),
            None => "direct".to_string(),
        }
    }

    async fn fetch(&self, video_id: &str) -> Result<Transcript> {
        fetch_captions(&self.client, video_id, &self.lang, self.kind()).await
    }
}

/// Fetch transcript from YouTube's built-in captions
async fn fetch_captions(
    client: &reqwest::Client,
    video_id: &str,
    lang: &str,
    source: StrategyKind,
) -> Result<Transcript> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
    debug!("Fetching watch page: {watch_url}");

    let page_html = client
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    // The watch page usually embeds the player response; only call the
    // player endpoint when it doesn't, or when it carries no captions.
    let resp = match embedded_player_response(&page_html) {
        Some(resp) if resp.captions.is_some() => {
            debug!("Using embedded player response");
            resp
        }
        _ => fetch_player_response(client, &page_html, video_id, lang).await?,
    };

    check_playable(&resp, video_id)?;

    let title = resp
        .video_details
        .as_ref()
        .and_then(|vd| vd.title.clone())
        .unwrap_or_default();

    let tracks = resp
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .and_then(|r| r.caption_tracks)
        .unwrap_or_default();

    let Some(track) = select_track(&tracks, lang) else {
        bail!("no captions available for video {video_id}");
    };

    let actual_lang = track.language_code.clone();
    debug!(
        "Using caption track: lang={actual_lang} auto={}",
        track.is_auto_generated()
    );

    let caption_xml = client
        .get(&track.base_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let segments = parse_caption_xml(&caption_xml)?;

    Ok(Transcript {
        video_id: video_id.to_string(),
        title,
        language: actual_lang,
        source,
        segments,
    })
}

async fn fetch_player_response(
    client: &reqwest::Client,
    page_html: &str,
    video_id: &str,
    lang: &str,
) -> Result<PlayerResponse> {
    let api_key = extract_api_key(page_html)?;
    debug!("Extracted InnerTube API key: {api_key}");

    let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

    let body = serde_json::json!({
        "context": {
            "client": {
                "hl": lang,
                "gl": "US",
                "clientName": "WEB",
                "clientVersion": "2.20241126.01.00"
            }
        },
        "videoId": video_id
    });

    let resp = client
        .post(&player_url)
        .header("User-Agent", USER_AGENT)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(resp)
}

fn embedded_player_response(html: &str) -> Option<PlayerResponse> {
    let caps = EMBEDDED_PLAYER_RESPONSE.captures(html)?;
    serde_json::from_str(&caps[1]).ok()
}

fn check_playable(resp: &PlayerResponse, video_id: &str) -> Result<()> {
    match &resp.playability_status {
        Some(ps) if ps.status != "OK" => {
            let reason = ps.reason.as_deref().unwrap_or("no reason given");
            bail!("video {video_id} is not playable ({}): {reason}", ps.status);
        }
        _ => Ok(()),
    }
}

/// Manual track in the wanted language, then an auto-generated one, then
/// whatever comes first.
fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    let in_lang = |t: &&CaptionTrack| t.language_code == lang;
    tracks
        .iter()
        .filter(in_lang)
        .find(|t| !t.is_auto_generated())
        .or_else(|| tracks.iter().find(in_lang))
        .or_else(|| tracks.first())
}

fn extract_api_key(html: &str) -> Result<String> {
    API_KEY_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).map(|caps| caps[1].to_string()))
        .ok_or_else(|| eyre::eyre!("could not extract InnerTube API key from watch page"))
}

fn parse_caption_xml(xml: &str) -> Result<Vec<Segment>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut current_dur: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let mut start = None;
                let mut dur = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"start" => {
                            start = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        b"dur" => {
                            dur = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
                        }
                        _ => {}
                    }
                }
                current_start = start;
                // some tracks omit dur on the final cue
                current_dur = dur.or(Some(0.0));
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(start), Some(dur)) = (current_start.take(), current_dur.take()) {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    let text = html_escape::decode_html_entities(&raw_text).replace('\n', " ");
                    if !text.is_empty() {
                        segments.push(Segment {
                            text,
                            start,
                            duration: dur,
                        });
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                current_start = None;
                current_dur = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(segments)
}
