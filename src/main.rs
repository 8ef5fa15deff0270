use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use glassmeter::config::{LoggingConfig, ServiceConfig};
use glassmeter::throughput::orchestrator::{TestRequest, ThroughputOrchestrator};
use glassmeter::throughput::{advisor, report, servers, TestDirection};

#[derive(Parser)]
#[command(
    name = "glassmeter",
    about = "Looking-glass speed tests: iperf3 orchestration and synthetic download files",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (overrides GLASSMETER_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Bind address (overrides network.listen_address)
        #[arg(long)]
        bind: Option<String>,
    },

    /// List the iperf3 reference servers
    Servers {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Run one iperf3 throughput test against a reference server
    SpeedTest {
        /// Reference server id (see `glassmeter servers`)
        #[arg(long)]
        server: String,

        /// Test duration in seconds (1-30, anything else runs 10)
        #[arg(long)]
        duration: Option<i64>,

        /// Test direction: download or upload
        #[arg(long, default_value = "download")]
        direction: TestDirection,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print iperf3 commands for testing by hand
    Advise {
        /// Reference server id
        #[arg(long)]
        server: Option<String>,
    },
}

/// Subscriber used only while the config file is loaded, so load
/// diagnostics are visible before the configured logger exists.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        tracing::subscriber::with_default(bootstrap_subscriber(), || match &cli.config {
            Some(path) => ServiceConfig::load(path),
            None => Ok(ServiceConfig::load_or_default()),
        })?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.network.listen_address = bind;
            }
            tracing::info!(bind = %config.network.listen_address, "Starting glassmeter");
            glassmeter::serve(config).await?;
        }
        Commands::Servers { json } => {
            let list = servers::list_servers();
            if json {
                println!("{}", serde_json::to_string_pretty(list)?);
            } else {
                println!("{:<22} | {:<24} | {:<24} | Bandwidth", "ID", "Host", "Location");
                println!("{:-<22}-|-{:-<24}-|-{:-<24}-|-{:-<9}", "", "", "", "");
                for s in list {
                    println!(
                        "{:<22} | {:<24} | {:<24} | {}",
                        s.id,
                        format!("{}:{}", s.host, s.port),
                        s.location,
                        s.bandwidth_label
                    );
                }
            }
        }
        Commands::SpeedTest {
            server,
            duration,
            direction,
            json,
        } => {
            tracing::info!(%server, ?duration, %direction, "Running speed test");
            let orchestrator = ThroughputOrchestrator::from_config(&config);
            let result = orchestrator
                .run_test(TestRequest::new(server, duration, direction))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", report::format_summary(&result));
            }
        }
        Commands::Advise { server } => {
            let advice = advisor::advise_commands(
                &config.devices,
                config.iperf3.local_port,
                server.as_deref(),
            );
            println!("{}", serde_json::to_string_pretty(&advice)?);
        }
    }

    Ok(())
}
