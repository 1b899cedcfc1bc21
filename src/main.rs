use clap::Parser;

use docseek::Settings;
use docseek::config::ConfigSource;
use docseek::cli::commands::{documents, index, init, search, serve};
use docseek::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path).unwrap_or_else(|e| {
            eprintln!("Configuration error in {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    docseek::logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),

        Commands::Config => {
            let source = ConfigSource::resolve(cli.config.as_deref());
            init::run_config(&config, &source)
        }

        Commands::Index {
            file,
            dir,
            ext,
            no_progress,
        } => {
            let args = index::IndexArgs {
                file,
                dir,
                extensions: ext,
                progress: config.indexing.show_progress && !no_progress,
            };
            // Loading and embedding are blocking
            let result =
                tokio::task::spawn_blocking(move || index::run(args, &config)).await;
            if let Err(e) = result {
                eprintln!("Indexing failed: {e}");
                std::process::exit(1);
            }
        }

        Commands::Search {
            query,
            count,
            types,
            json,
        } => search::run(
            search::SearchArgs {
                query,
                count,
                types,
                json,
            },
            &config,
        ),

        Commands::Count => documents::run_count(&config),

        Commands::Get { id } => documents::run_get(&id, &config),

        Commands::Delete { id } => documents::run_delete(&id, &config),

        Commands::Reset { yes } => documents::run_reset(yes, &config),

        Commands::Serve { bind } => serve::run(config, bind).await,
    }
}
