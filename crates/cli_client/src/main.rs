//! Attendance watch CLI
//!
//! Preconnects the push channel, attaches to one course/sign pair and reports
//! every code refresh (one URL per line on stdout) and every subject result.
//! Runs until Ctrl-C.

use anyhow::{Context, Result};
use attendance_core::config::DEFAULT_ENDPOINT;
use attendance_core::{AttendanceClient, ChannelTemplate, ClientConfig};
use clap::Parser;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Watch a live attendance session over the Bayeux push channel
#[derive(Parser, Debug)]
#[command(name = "attendance-watch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Follow code refreshes and results for a live attendance session", long_about = None)]
struct Args {
    /// Course id
    #[arg(long)]
    course: i64,

    /// Sign (session) id
    #[arg(long)]
    sign: i64,

    /// Push endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Application channel shape
    #[arg(long, default_value = "/attendance/{course}/{sign}/qr")]
    channel_template: String,

    /// How long to wait for each result before reporting a timeout
    #[arg(long, default_value_t = 120)]
    result_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls CryptoProvider with ring backend (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let template = ChannelTemplate::parse(&args.channel_template)
        .with_context(|| format!("Invalid channel template: {}", args.channel_template))?;
    let config = ClientConfig::default()
        .with_endpoint(args.endpoint.clone())
        .with_channel_template(template);

    let client = AttendanceClient::new(config).context("Invalid client config")?;
    // Receivers only see refreshes sent after they subscribe
    let mut codes = client.subscribe_code_refresh();
    client
        .open()
        .await
        .with_context(|| format!("Failed to open push channel {}", args.endpoint))?;
    info!("Preconnect started");

    client.attach(args.course, args.sign).await;
    info!(
        "Registered target {}/{}, waiting for connect and codes",
        args.course, args.sign
    );

    let printer = tokio::spawn(async move {
        loop {
            match codes.recv().await {
                Ok(code) => println!("{}", code.url),
                Err(RecvError::Lagged(n)) => warn!("Skipped {} code refreshes", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result_timeout = Duration::from_secs(args.result_timeout_secs);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            result = client.wait_result(result_timeout) => match result {
                Some(r) => info!(
                    "Result: {}({}) rank={} id={}",
                    r.name, r.external_number, r.rank, r.id
                ),
                None => info!("No result within {:?}, session kept alive", result_timeout),
            },
        }
    }

    client.close().await;
    printer.abort();
    Ok(())
}

fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
