use crate::report::{run_enrich, EnrichArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use proprun::config::AppConfig;
use proprun::error::AppError;
use proprun::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "PropRun",
    about = "Score for-sale listings by how well market rent covers their financing",
    version
)]
struct Cli {
    /// Log at INFO level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log at DEBUG level
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn forced_log_level(&self) -> Option<&'static str> {
        if self.debug {
            Some("debug")
        } else if self.verbose {
            Some("info")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Enrich a local listing export and print the ranked results
    Enrich(EnrichArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Never call the rent estimate service; only use cached estimates
    #[arg(short, long)]
    pub(crate) cache_only: bool,
    /// Serve every request from this listing export instead of dated snapshots
    #[arg(long)]
    pub(crate) test_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    let forced = cli.forced_log_level();
    if let Some(level) = forced {
        config.telemetry.log_level = level.to_string();
    }
    telemetry::init(&config.telemetry, forced.is_some())?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(config, args).await,
        Command::Enrich(args) => run_enrich(config, args).await,
    }
}
