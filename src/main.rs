use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vitis_stress::config::Config;
use vitis_stress::export::{export_results, render_parcel, render_summary};
use vitis_stress::pipeline::run_from_config;

#[derive(Parser)]
#[command(version, about = "Vineyard water-stress analysis", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write results, summary and report
    Run,
    /// Print the global summary
    Summary,
    /// Print the result for one parcel
    Parcel {
        /// Parcel id from the registry
        id: i64,
    },
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vitis_stress=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure the file exists and all referenced environment variables are set",
            cli.config.display(),
            e
        )
    })?;
    info!("Configuration loaded from {}", cli.config.display());

    let output = run_from_config(&config)?;

    match cli.command {
        Commands::Run => {
            let paths = export_results(&output, &config.output.dir)?;
            print!("{}", render_summary(&output.summary));
            println!("Results saved to `{}`", paths.results.display());
            println!("Report saved to `{}`", paths.report.display());
        }
        Commands::Summary => print!("{}", render_summary(&output.summary)),
        Commands::Parcel { id } => match output.parcel(id) {
            Some(result) => print!("{}", render_parcel(result)),
            None => anyhow::bail!("Parcel {} has no observations in this run", id),
        },
    }

    Ok(())
}
