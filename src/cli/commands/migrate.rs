//! Migrate command.

use std::path::PathBuf;

use anyhow::Context;

use crate::config::Settings;
use crate::embedding::select_provider;
use crate::migration::{MigrationOptions, MigrationOrchestrator, MigrationReport};

use super::connect_store;

/// Flags given on the command line, layered over `[migration]` settings.
#[derive(Debug, Clone, Default)]
pub struct MigrateArgs {
    pub source: Option<PathBuf>,
    pub namespace: Option<String>,
    pub dry_run: bool,
    pub no_verify: bool,
    pub json: bool,
}

impl MigrateArgs {
    pub fn options(&self, settings: &Settings) -> MigrationOptions {
        let mut options = MigrationOptions::from_config(&settings.migration);
        if let Some(source) = &self.source {
            options.source_dir = source.clone();
        }
        if let Some(namespace) = &self.namespace {
            options.namespace = namespace.clone();
        }
        options.dry_run = self.dry_run;
        options.verify = !self.no_verify;
        options
    }
}

/// Run migrate command.
///
/// Infrastructure failures (credentials, index connection, dimension
/// mismatch) are returned as errors; partial failures only show up in the report.
pub fn run(args: MigrateArgs, settings: &Settings) -> anyhow::Result<()> {
    let options = args.options(settings);
    tracing::info!(
        target: "cli",
        "migrating {} into namespace {}{}",
        options.source_dir.display(),
        options.namespace,
        if options.dry_run { " (dry run)" } else { "" }
    );

    let report = if options.dry_run {
        let provider =
            select_provider(&settings.embedding).context("No embedding provider available")?;
        MigrationOrchestrator::new(provider, None, options).run()?
    } else {
        let (provider, manager) = connect_store(settings)?;
        MigrationOrchestrator::new(provider, Some(&manager), options).run()?
    };

    print_report(&report, args.json)
}

fn print_report(report: &MigrationReport, json: bool) -> anyhow::Result<()> {
    if json {
        let mut value = serde_json::to_value(report)?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "success_rate".to_string(),
                serde_json::to_value(report.success_rate())?,
            );
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
