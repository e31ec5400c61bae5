use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::Parser;
use fake_user_agent::get_chrome_rua;
use nagare::{
    BufferedStream, FileSink, HttpClient, HttpTransport, Mp4Parser, PlaybackMode, StreamConfig,
    StreamEvent, StreamState, WallClock,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    ClientBuilder, Url,
};

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct NagareArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Output file path
    #[clap(short, long, default_value = "./output.mp4")]
    output: PathBuf,

    /// Config file with stream defaults
    #[clap(long, env = "NAGARE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds of media to keep buffered ahead of playback
    #[clap(long)]
    buffer_seconds: Option<f64>,

    /// Bytes requested before any bandwidth is measured
    #[clap(long)]
    initial_fetch_size: Option<u64>,

    /// Playback speed of the simulated clock
    #[clap(long, default_value = "1.0")]
    speed: f64,

    /// Interval between clock ticks in milliseconds
    #[clap(long, default_value = "250")]
    tick_ms: u64,

    /// Keep fetching regardless of the playback position
    #[clap(long)]
    managed: bool,

    /// Seconds allowed for establishing a connection
    ///
    /// Range fetches themselves never time out.
    #[clap(long, default_value = "30")]
    connect_timeout: u64,

    /// Cookies used to download
    #[clap(long)]
    cookies: Option<String>,

    /// HTTP Header used to download
    ///
    /// Custom header. eg. "User-Agent: xxxxx". Sent alongside --cookies.
    #[clap(short = 'H', long)]
    headers: Vec<String>,

    /// Media url
    url: String,
}

impl NagareArgs {
    fn client(&self, url: &Url) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim())?,
                HeaderValue::from_str(value.trim())?,
            );
        }

        let client = HttpClient::new(
            ClientBuilder::new()
                .default_headers(headers)
                .user_agent(get_chrome_rua())
                .connect_timeout(Duration::from_secs(self.connect_timeout)),
        )?;
        if let Some(cookies) = &self.cookies {
            let cookies = cookies
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            client.add_cookies(cookies, url.clone())?;
        }

        Ok(client)
    }

    fn stream_config(&self) -> anyhow::Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => StreamConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => StreamConfig::default(),
        };
        if let Some(buffer_seconds) = self.buffer_seconds {
            config = config.buffer_seconds(buffer_seconds);
        }
        if let Some(initial_fetch_size) = self.initial_fetch_size {
            config = config.initial_fetch_size(initial_fetch_size);
        }
        config.validate()?;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = NagareArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing_subscriber::filter::LevelFilter::DEBUG.into()
                } else {
                    tracing_subscriber::filter::LevelFilter::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let url = Url::parse(&args.url)?;
    let config = args.stream_config()?;
    let transport = HttpTransport::new(args.client(&url)?);

    let mode = if args.managed {
        PlaybackMode::Managed
    } else {
        PlaybackMode::Standard
    };
    let sink = FileSink::new(&args.output)?.with_playback_mode(mode);
    let clock = WallClock::new(args.speed, Duration::from_millis(args.tick_ms));

    let mut stream = BufferedStream::new(
        url,
        transport,
        Mp4Parser::default(),
        sink,
        clock,
        &config,
    )?;
    if args.managed {
        stream.events().emit(StreamEvent::StartStreaming);
    }

    let interrupted = tokio::select! {
        result = stream.run() => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        log::warn!("Interrupted, stopping");
        stream.destroy();
    }

    if stream.state() == StreamState::Ended {
        log::info!(
            "Saved {} bytes to {}",
            stream.bytes_appended(),
            args.output.display()
        );
    }

    Ok(())
}
