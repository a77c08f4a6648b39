// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: scanned page images to searchable PDFs
//
// Entry point. Initialises logging, resolves the run configuration, and drives
// the batch. Exits with status 1 when any file fails.

mod args;
mod batch;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use scanwerk_core::config::RunConfig;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(dir) = &cli.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    tracing::info!(files = cli.inputs.len(), jobs = cli.jobs, "Scanwerk starting");

    let jobs = batch::plan_outputs(&cli.inputs, cli.output.as_deref());
    let entries = batch::run(config, jobs, cli.jobs).await;

    if batch::print_summary(&entries) > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
