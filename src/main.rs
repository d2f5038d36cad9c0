use std::io::{self, BufRead};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use log::{debug, info, warn};

use ytsum::config::{self, Config};
use ytsum::resolver::{Resolver, build_strategies};
use ytsum::service::SummaryService;
use ytsum::summarize::{LlmSummarizer, Summarizer};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging(serve: bool) -> Result<()> {
    if serve {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        return Ok(());
    }

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytsum.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytsum")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    Command::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help() -> String {
    let yt_dlp_line = match tool_version(config::DEFAULT_YT_DLP) {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found, needed for the alternate-tool fallback)".to_string(),
    };

    format!(
        "\nOPTIONAL TOOLS:\n{yt_dlp_line}\n\nConfig file: {}\nLogs are written to: {}",
        config::config_path().display(),
        log_dir().join("ytsum.log").display()
    )
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring invalid config {}: {e}", config::config_path().display());
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    setup_logging(cli.serve)?;

    let config = load_config();

    // CLI flags take priority over the config file
    let lang = cli.lang.clone().or(config.lang.clone()).unwrap_or_else(|| config::DEFAULT_LANG.to_string());
    let model = cli.model.clone().or(config.model.clone()).unwrap_or_else(|| config::DEFAULT_MODEL.to_string());
    let timeout = Duration::from_secs(
        cli.timeout
            .or(config.attempt_timeout_secs)
            .unwrap_or(config::DEFAULT_ATTEMPT_TIMEOUT_SECS),
    );
    let yt_dlp = config.yt_dlp_path.as_deref().unwrap_or(config::DEFAULT_YT_DLP);

    let strategy_configs = config.strategies(&cli.proxies, !cli.no_fallback);
    let strategies = build_strategies(&strategy_configs, &lang, timeout, yt_dlp)?;
    let resolver = Resolver::new(strategies, timeout).with_report(config.failure_report.unwrap_or_default());

    if cli.verbose {
        let config_path = config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Strategies: {}", resolver.strategy_labels().join(" -> "));
    }
    debug!("Strategies: {:?}", resolver.strategy_labels());

    // The API key is checked here so a missing one stops us before any work
    let summarizer: Option<Arc<dyn Summarizer>> = if cli.serve || !cli.transcript_only {
        let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::from_env(reqwest::Client::new(), &model)?);
        Some(summarizer)
    } else {
        None
    };

    let service = SummaryService::new(resolver, summarizer).with_lenient_ids(config.lenient_ids.unwrap_or(false));

    if cli.serve {
        let host = cli.host.clone().or(config.host.clone()).unwrap_or_else(|| config::DEFAULT_HOST.to_string());
        let ip: IpAddr = host.parse().wrap_err_with(|| format!("invalid host address: {host}"))?;
        let port = cli.port.or(config.port).unwrap_or(config::DEFAULT_PORT);
        return ytsum::server::serve(Arc::new(service), SocketAddr::new(ip, port)).await;
    }

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    let urls: Vec<String> = urls.into_iter().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()).collect();
    if urls.is_empty() {
        bail!("no URL provided\n\nUsage: ytsum <URL>\n       echo <URL> | ytsum\n       ytsum --serve");
    }

    let mut failed = 0;
    for url in &urls {
        if let Err(e) = process_url(&service, url, &cli).await {
            failed += 1;
            eprintln!("{url}: {}", e.user_message());
            if cli.verbose {
                if let ytsum::Error::AllStrategiesExhausted { failures, .. } = &e {
                    for failure in failures {
                        eprintln!("  {failure}");
                    }
                } else {
                    eprintln!("  {e}");
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} videos failed", urls.len());
    }
    Ok(())
}

async fn process_url(service: &SummaryService, url: &str, cli: &Cli) -> Result<(), ytsum::Error> {
    if cli.transcript_only {
        let transcript = service.transcript(url).await?;
        if cli.verbose {
            eprintln!(
                "Video: {} ({})\nSource: {}\nLanguage: {}\nSegments: {}",
                transcript.title,
                transcript.video_id,
                transcript.source,
                transcript.language,
                transcript.segments.len(),
            );
        }
        match cli.format {
            OutputFormat::Text => println!("{}", transcript.text()),
            OutputFormat::Json => println!("{}", to_json(&transcript)),
        }
        return Ok(());
    }

    let summary = service.summarize(url).await?;
    match cli.format {
        OutputFormat::Text => {
            if !summary.title.is_empty() {
                println!("# {}\n", summary.title);
            }
            println!("{}", summary.summary);
        }
        OutputFormat::Json => println!("{}", to_json(&summary)),
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}
