use clap::Parser;

use live_sass::Settings;
use live_sass::cli::{Cli, Commands};
use live_sass::cli::commands::{compile, init, list, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // For non-init commands, check if project is initialized
    if !matches!(cli.command, Commands::Init { .. }) && cli.config.is_none() {
        if let Err(warning) = Settings::check_init() {
            eprintln!("Warning: {warning}");
            eprintln!("Using default configuration for now.");
        }
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    live_sass::logging::init_with_config(&settings.logging);

    let code = match cli.command {
        Commands::Init { force } => {
            init::run_init(force);
            0
        }
        Commands::Config => {
            init::run_config(&settings);
            0
        }
        Commands::Compile => compile::run_compile(settings).await?,
        Commands::CompileFile { path } => compile::run_compile_file(settings, &path).await?,
        Commands::ListFiles { all } => {
            list::run_list_files(&settings, all).await;
            0
        }
        Commands::Watch { no_initial } => {
            watch::run_watch(settings, cli.config.as_deref(), no_initial).await?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
