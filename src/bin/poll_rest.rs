//! CLI: Poll a REST endpoint on a fixed interval and print every forwarded payload.
//!
//! Runs one receiver from a JSON config file (`--config`) or from flags. Payloads
//! are decoded by a script (`--script`) or passed through untouched
//! (`--passthrough`). Ctrl-C stops the receiver gracefully and prints its stats.
//!
//! Usage: `poll_rest [OPTIONS] --config <FILE>`
//!    or: `poll_rest [OPTIONS] --name <NAME> --endpoint <URL> --interval-ms <MS> --script <PATH>`
//!
//! Set RUST_LOG=streamweave_receivers=trace for span enter/exit and per-cycle events.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use streamweave_receivers::{
  ChannelOutput, Decoder, FetchMode, PassthroughDecoder, PollingReceiver, ReceiverConfig,
  ScriptDecoder, config_io,
};
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Poll a REST endpoint and print what the receiver forwards.
#[derive(Parser, Debug)]
#[command(name = "poll_rest")]
#[command(
  after_help = r#"Environment variables (override the matching flag or config field when set):
  RECEIVER_ENDPOINT_URL  Endpoint to poll.
  RECEIVER_USERNAME      Basic-auth username.
  RECEIVER_PASSWORD      Basic-auth password.

Examples:
  poll_rest --config receivers/meter.json
  poll_rest --name meter --endpoint http://localhost:8080/readings --interval-ms 1000 --passthrough
  poll_rest --endpoint http://localhost:8080/ --interval-ms 500 --script poll.sh --on-demand-fetch"#
)]
struct Args {
  /// JSON file holding one receiver configuration. Flags are ignored when given.
  #[arg(long, value_name = "FILE", conflicts_with_all = ["name", "endpoint", "interval_ms", "script"])]
  config: Option<PathBuf>,

  /// Receiver display name
  #[arg(long, default_value = "poll_rest")]
  name: String,

  /// Endpoint URL to poll
  #[arg(long, value_name = "URL")]
  endpoint: Option<String>,

  /// Polling interval in milliseconds
  #[arg(long, value_name = "MS", allow_negative_numbers = true)]
  interval_ms: Option<i64>,

  /// Decode script, run once per cycle
  #[arg(long, value_name = "PATH")]
  script: Option<String>,

  /// Bound on a single cycle's decode step, in milliseconds
  #[arg(long, value_name = "MS")]
  timeout_ms: Option<u64>,

  /// Forward fetched payloads without running a script
  #[arg(long)]
  passthrough: bool,

  /// Let the script issue its own fetch requests instead of receiving one prefetch on stdin
  #[arg(long, conflicts_with = "passthrough")]
  on_demand_fetch: bool,

  /// Capacity of the channel between the receiver and the printer
  #[arg(long, default_value_t = 256)]
  buffer: usize,
}

#[cfg(test)]
mod poll_rest_test;

const ENV_ENDPOINT_URL: &str = "RECEIVER_ENDPOINT_URL";
const ENV_USERNAME: &str = "RECEIVER_USERNAME";
const ENV_PASSWORD: &str = "RECEIVER_PASSWORD";

/// Resolves the receiver configuration. `env` looks up environment overrides.
fn build_config(
  args: &Args,
  env: impl Fn(&str) -> Option<String>,
) -> Result<ReceiverConfig, String> {
  let mut config = match &args.config {
    Some(path) => config_io::load_config(path).map_err(|e| e.to_string())?,
    None => ReceiverConfig {
      name: args.name.clone(),
      interval_ms: args.interval_ms,
      endpoint_url: args.endpoint.clone().unwrap_or_default(),
      username: None,
      password: None,
      script: args
        .script
        .clone()
        .unwrap_or_else(|| if args.passthrough { "passthrough".to_string() } else { String::new() }),
      timeout_ms: None,
      stop_grace_ms: None,
      partial_output: Default::default(),
    },
  };
  if args.timeout_ms.is_some() {
    config.timeout_ms = args.timeout_ms;
  }

  // Env vars override flags and file values.
  if let Some(url) = env(ENV_ENDPOINT_URL) {
    config.endpoint_url = url;
  }
  if let Some(user) = env(ENV_USERNAME) {
    config.username = Some(user);
  }
  if let Some(password) = env(ENV_PASSWORD) {
    config.password = Some(password);
  }
  Ok(config)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  let args = Args::parse();
  let config = match build_config(&args, |key| env::var(key).ok()) {
    Ok(c) => c,
    Err(e) => {
      eprintln!("Error loading configuration: {}", e);
      process::exit(1);
    }
  };
  info!(config = ?config, "options (env, file or flags)");

  let decoder: Arc<dyn Decoder> = if args.passthrough {
    Arc::new(PassthroughDecoder)
  } else {
    let mode = if args.on_demand_fetch {
      FetchMode::OnDemand
    } else {
      FetchMode::Prefetch
    };
    Arc::new(ScriptDecoder::new(&config.script).with_fetch_mode(mode))
  };
  let (output, mut events) = ChannelOutput::new(&config.name, args.buffer);
  let mut receiver = PollingReceiver::rest(config, decoder, Arc::new(output));

  if let Err(e) = receiver.start().await {
    eprintln!("Error: {}", e);
    process::exit(1);
  }

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);
  loop {
    tokio::select! {
      event = events.next() => match event {
        Some(event) => match serde_json::to_string(&event) {
          Ok(line) => println!("{}", line),
          Err(e) => eprintln!("Unable to print event: {}", e),
        },
        None => break,
      },
      _ = &mut ctrl_c => {
        info!("interrupt received; stopping receiver");
        break;
      }
    }
  }

  drop(events);
  receiver.stop().await;
  match serde_json::to_string_pretty(&receiver.stats()) {
    Ok(stats) => println!("{}", stats),
    Err(e) => eprintln!("Unable to print stats: {}", e),
  }
}
