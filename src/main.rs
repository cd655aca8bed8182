// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # ModFlow CLI
//!
//! This is the main entry point for the ModFlow command-line interface.
//! It initializes the logger from the verbosity flags and runs the
//! requested command.

use anyhow::Context;
use env_logger::Env;
use log::info;
use modflow::{cli, Error as ModFlowError};
use std::io::{self, Write};
use std::process;

/// Default log filter for a given number of `-v` flags. `RUST_LOG` wins.
fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn run() -> anyhow::Result<()> {
    let matches = cli::build().get_matches();

    env_logger::Builder::from_env(
        Env::default().default_filter_or(default_filter(matches.get_count("verbose"))),
    )
    .init();
    info!("Starting ModFlow v{}", cli::VERSION);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::execute_matches(&matches, &mut out)
        .context("ModFlow could not complete the command")?;
    out.flush().context("Failed to flush standard output")?;
    Ok(())
}

/// The main entry point for the ModFlow CLI.
fn main() {
    if let Err(err) = run() {
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ModFlowError>())
            .map_or("Error", ModFlowError::kind);
        eprintln!("Error: [{}] {:#}", kind, err);
        process::exit(1);
    }
}
