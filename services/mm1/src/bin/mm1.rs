//! M/M/1 simulation entry point

use anyhow::{Context, Result};
use clap::Parser;
use des_config::{defaults, expand_path, ConfigLoader, LoggingConfig};
use mm1::{Mm1Config, Mm1Model};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run an M/M/1 queue on the simulation actor kernel",
    long_about = None
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = defaults::files::MM1)]
    config: PathBuf,

    /// Environment overlay (environments/<name>.toml next to the config file)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override the model seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of arrivals (clears any configured duration)
    #[arg(long)]
    arrivals: Option<usize>,

    /// Override the log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Also write the summary to this path (`~` and `$VAR` are expanded)
    #[arg(short, long)]
    output: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.directive()))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn resolve(args: &Args) -> Result<Mm1Config> {
    let mut config: Mm1Config = ConfigLoader::new(&args.config)
        .environment(args.environment.as_deref())
        .load()
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    if let Some(seed) = args.seed {
        config.model.seed = seed;
    }
    if let Some(arrivals) = args.arrivals {
        config.model.num_arrivals = arrivals;
        config.model.duration = None;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
        config.logging.filter = None;
    }
    if args.json_logs {
        config.logging.json = true;
    }
    config.model.validate().context("Invalid model settings")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve(&args)?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_tracing(&config.logging)?;
    info!("Starting M/M/1 simulation");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let model = Mm1Model::build(&config.model, config.kernel).await?;
    let outcome = match model.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Simulation error: {:#}", e);
            return Err(e);
        }
    };

    let rendered = serde_json::to_string_pretty(&outcome).context("Failed to render summary")?;
    println!("{rendered}");

    if let Some(raw) = &args.output {
        let path = expand_path(raw)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, format!("{rendered}\n"))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Summary written");
    }

    Ok(())
}
