use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quizzler_client::config::DEFAULT_SERVER_URL;
use quizzler_client::{cli, SessionChannel, SessionConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Join a multiplayer quiz session from the terminal", long_about = None)]
struct Args {
    /// Session code to join
    #[arg(short, long)]
    code: String,

    /// Name to play under
    #[arg(short, long)]
    name: String,

    /// Join as the session host
    #[arg(long)]
    host: bool,

    /// WebSocket base URL of the quiz backend
    #[arg(long, env = "QUIZZLER_WS_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "QUIZZLER_LOG", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            bail!("--url must start with ws:// or wss://, got {}", self.url);
        }
        if self.code.trim().is_empty() {
            bail!("--code must not be empty");
        }
        if self.name.trim().is_empty() {
            bail!("--name must not be empty");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    args.validate()?;

    let mut channel = SessionChannel::websocket(SessionConfig::new(args.url.clone()));
    channel
        .connect(&args.code, &args.name, args.host)
        .await
        .with_context(|| format!("could not join session {}", args.code))?;

    cli::run(&mut channel).await?;
    Ok(())
}
