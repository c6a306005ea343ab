use std::process::ExitCode;

use clap::Parser;
use docqa::Settings;
use docqa::cli::commands::{self, migrate::MigrateArgs};
use docqa::cli::{Cli, Commands};
use docqa::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Init works without a readable configuration
    if let Commands::Init { force } = &cli.command {
        logging::init();
        return report(commands::init::run_init(cli.config.as_deref(), *force));
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init();
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_with_config(&settings.logging, cli.verbose);

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Migrate {
            source,
            namespace,
            dry_run,
            no_verify,
            json,
        } => commands::migrate::run(
            MigrateArgs {
                source,
                namespace,
                dry_run,
                no_verify,
                json,
            },
            &settings,
        ),
        Commands::Ingest {
            file,
            namespace,
            json,
        } => commands::ingest::run(&file, &namespace, json, &settings),
        Commands::Query {
            text,
            namespace,
            top_k,
            json,
        } => commands::query::run(&text, &namespace, top_k, json, &settings),
        Commands::DeleteNamespace { namespace } => {
            commands::namespace::run_delete(&namespace, &settings)
        }
    };

    report(result)
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "cli", "{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
