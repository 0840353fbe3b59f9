//! Fabula CLI binary.
//!
//! - `fabula play` runs an interactive session on stdin
//! - `fabula show <id>` prints a stored session
//! - `fabula config` lists dimensions and role chains

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, describe, load_config, play, show};

    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    #[cfg(feature = "observability")]
    let _guard = fabula::init_observability(
        fabula::ObservabilityConfig::default()
            .with_json_logs(cli.json_logs)
            .with_filter(if cli.verbose {
                "debug"
            } else {
                fabula::observability::DEFAULT_FILTER
            }),
    )?;

    #[cfg(not(feature = "observability"))]
    init_logging(cli.verbose, cli.json_logs);

    let config = load_config(&cli)?;

    // Execute the requested command
    match cli.command.clone().unwrap_or_default() {
        Commands::Play { resume } => play(&config, resume).await?,
        Commands::Show { session } => show(&config, session).await?,
        Commands::Config => describe(&config)?,
    }

    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_filter = if verbose {
        "debug"
    } else {
        "warn,fabula=info,fabula_story=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
