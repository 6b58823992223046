//! bait control - CLI client for the bait daemon.
//!
//! Sends a message, screenshot or recording to baitd and prints the verdict.

mod client;
mod output;

use anyhow::{bail, Context, Result};
use bait_shared::VERSION;
use clap::{Parser, Subcommand};
use client::BaitClient;
use std::io::Read;
use std::path::PathBuf;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8765";

#[derive(Parser)]
#[command(name = "baitctl")]
#[command(about = "bait - phishing risk triage for messages and voicemails", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Daemon base URL
    #[arg(long, env = "BAIT_SERVER", default_value = DEFAULT_SERVER, global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a message (stdin when neither --text nor --file is given)
    Analyze {
        /// Message text
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Text file, screenshot or voicemail recording
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the full verdict: severity, score and stage outcomes
        #[arg(long)]
        json: bool,
    },

    /// Show daemon version and uptime
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = BaitClient::new(&cli.server)?;

    match cli.command {
        Commands::Analyze { text, file, json } => analyze(&client, text, file, json).await,
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", output::render_health(&health, &cli.server));
            Ok(())
        }
    }
}

async fn analyze(
    client: &BaitClient,
    text: Option<String>,
    file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let input = match (text, file) {
        (Some(text), _) => Input::Text(text),
        (None, Some(path)) => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            Input::File(path, bytes)
        }
        (None, None) => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Input::Text(text)
        }
    };

    if json {
        let text = match input {
            Input::Text(text) => text,
            Input::File(path, bytes) => String::from_utf8(bytes).map_err(|_| {
                anyhow::anyhow!(
                    "{} is not UTF-8 text; --json only accepts text input",
                    path.display()
                )
            })?,
        };
        if text.trim().is_empty() {
            bail!("No text provided");
        }
        let verdict = client.analyze_json(&text).await?;
        println!("{}", output::render_verdict(&verdict, output::use_color()));
    } else {
        let narrative = match input {
            Input::Text(text) => client.analyze_text(&text).await?,
            Input::File(path, bytes) => client.analyze_file(&path, bytes).await?,
        };
        println!("{}", narrative);
    }
    Ok(())
}

enum Input {
    Text(String),
    File(PathBuf, Vec<u8>),
}
