use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytsum",
    about = "Summarize YouTube videos from their captions",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL (reads from stdin if omitted)
    pub url: Option<String>,

    /// Print the transcript instead of summarizing it
    #[arg(short, long)]
    pub transcript_only: bool,

    /// Run the HTTP server instead of processing URLs
    #[arg(long)]
    pub serve: bool,

    /// Address to bind when serving
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind when serving
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Proxy to try after the direct fetch (repeatable)
    #[arg(long = "proxy", value_name = "URL")]
    pub proxies: Vec<String>,

    /// Don't fall back to yt-dlp when caption fetches fail
    #[arg(long)]
    pub no_fallback: bool,

    /// Preferred caption language
    #[arg(short, long)]
    pub lang: Option<String>,

    /// LLM model for summarization
    #[arg(long)]
    pub model: Option<String>,

    /// Per-strategy timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Show strategies tried and transcript metadata
    #[arg(short, long)]
    pub verbose: bool,
}
