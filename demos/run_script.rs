//! Runs one JSON script against a server.
//!
//! Usage:
//!
//! ```text
//! cargo run --example run_script -- <config.json> <script.json> [--debug] [--repeat N]
//! ```
//!
//! The config file holds a `ClientConfig` (`server`, `sockets`, `logLevel`).

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use anyhow::{Context, bail};
use duplex_e2e::{Client, ClientConfig, Script, ScriptRunner};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    config: String,
    script: String,
    debug: bool,
    repeat: usize,
}

impl Args {
    const USAGE: &str = "usage: run_script <config.json> <script.json> [--debug] [--repeat N]";

    fn parse() -> anyhow::Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    fn from_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut args = args.into_iter();
        let mut positional = Vec::new();
        let mut debug = false;
        let mut repeat = 1;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug" => debug = true,
                "--repeat" => {
                    repeat = args
                        .next()
                        .context("--repeat needs a count")?
                        .parse()
                        .context("--repeat count must be a number")?;
                }
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{}", Self::USAGE),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(config), Some(script)) = (positional.next(), positional.next()) else {
            bail!(Self::USAGE);
        };

        Ok(Self {
            config,
            script,
            debug,
            repeat,
        })
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;

    let config = ClientConfig::from_path(&args.config)
        .with_context(|| format!("loading config {}", args.config))?;
    let client = Client::from_config(config)?;
    init_logging(&client, args.debug);

    let script = Script::from_path(&args.script)
        .with_context(|| format!("loading script {}", args.script))?;
    let runner = ScriptRunner::new(client);

    for round in 1..=args.repeat {
        let start = Instant::now();
        let outcomes = runner.run(&script).await?;
        println!(
            "[{round}/{}] {} completed {} steps in {:?}",
            args.repeat,
            script.name,
            outcomes.len(),
            start.elapsed()
        );
    }

    Ok(())
}

/// Installs a subscriber filtered at the client's configured level.
fn init_logging(client: &Client, debug: bool) {
    let directive = if debug {
        "duplex_e2e=debug".to_string()
    } else {
        client.log_directive()
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_target(false)
        .init();
}

// ============================================================================
// Tests
// ============================================================================
