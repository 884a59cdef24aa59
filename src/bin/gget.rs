//! gget - fetch Gemini resources with trust-on-first-use pinning

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gemini_tofu::gemtext::{self, html};
use gemini_tofu::{classify, header, Client, Config, ErrorKind};
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gget")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding pinned certificate digests
    #[arg(long, env = "GGET_STORE")]
    store: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Request a URI and write the body to stdout
    Get {
        uri: String,

        /// Render text/gemini bodies as HTML
        #[arg(long)]
        html: bool,
    },

    /// Pin the certificate currently served for a URI's host
    Pin { uri: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = Config::default();
    if let Some(store) = cli.store {
        config.store_dir = store;
    }
    config.connect_timeout_secs = cli.timeout;
    let client = Client::from_config(&config).context("failed to set up client")?;

    let result = match cli.command {
        Commands::Get { uri, html } => get(&client, &uri, html).await,
        Commands::Pin { uri } => pin(&client, &uri).await,
    };

    if let Err(err) = &result {
        match classify(&**err) {
            Some(ErrorKind::Untrusted) => {
                eprintln!("hint: if you trust this server, run `gget pin <uri>` and retry");
            }
            Some(ErrorKind::Invalid) => {
                eprintln!("hint: the certificate itself is invalid; pinning will not help");
            }
            _ => {}
        }
    }
    result
}

async fn get(client: &Client, uri: &str, render_html: bool) -> Result<()> {
    let mut stream = client.request(uri).await?;
    let header = header::read_header(&mut stream)
        .await
        .context("failed to read response header")?;
    eprintln!("{header}");

    let mut body = Vec::new();
    if let Err(e) = stream.read_to_end(&mut body).await {
        // Many servers close without close_notify
        if e.kind() != std::io::ErrorKind::UnexpectedEof {
            return Err(e).context("failed to read response body");
        }
        tracing::debug!("connection closed without close_notify");
    }

    let mut stdout = std::io::stdout().lock();
    if render_html && header.is_success() && header.meta.starts_with("text/gemini") {
        let lines = gemtext::itemize(body.as_slice()).context("body is not valid UTF-8")?;
        html::to_html(&lines, &mut stdout)?;
    } else {
        std::io::Write::write_all(&mut stdout, &body)?;
    }
    Ok(())
}

async fn pin(client: &Client, uri: &str) -> Result<()> {
    let digest = client.pin(uri).await?;
    println!("{digest}");
    Ok(())
}
