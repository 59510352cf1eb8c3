//! Relayd daemon entry point.
//!
//! This binary starts the relay server that brokers channel state between
//! control clients and device peers.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use relayd_server::{Config, server};

/// Relayd - real-time relay daemon for control and device peers
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(long, value_name = "PATH", default_value = "relayd.json")]
    config: PathBuf,

    /// Listen host (overrides config and RELAYD_HOST)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Listen port (overrides config and RELAYD_PORT)
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
}

/// Set up logging: stderr always, plus a file sink when `RELAYD_LOG_FILE`
/// names one. `RUST_LOG` overrides the default `relayd=info` filter.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("relayd=info"));

    let file_layer = std::env::var("RELAYD_LOG_FILE").ok().map(|path| {
        let path = PathBuf::from(path);
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path.file_name().map_or_else(
            || std::ffi::OsString::from("relayd.log"),
            std::ffi::OsStr::to_os_string,
        );
        let appender = tracing_appender::rolling::never(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        // Writer lives for the whole process; leak the flush guard so the
        // background thread keeps draining until exit.
        std::mem::forget(guard);
        fmt::layer().with_writer(non_blocking).with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_logging();

    info!("Starting relayd...");

    let mut config = Config::load(&args.config)?;
    let env_host = std::env::var("RELAYD_HOST").ok();
    let env_port = std::env::var("RELAYD_PORT")
        .ok()
        .and_then(|port| port.parse().ok());
    config.apply_overrides(env_host, env_port, args.host, args.port);

    server::run(config).await?;

    info!("Relayd stopped");
    Ok(())
}
