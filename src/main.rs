// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! stagegen - staged build-graph regeneration driver
//!
//! Generates Ninja build files from YAML build descriptions.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagegen::cli::Cli;
use stagegen::errors::fatal;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        stagegen::VERBOSE_LOG_FILTER
    } else {
        stagegen::DEFAULT_LOG_FILTER
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = stagegen::cli::run(&cli) {
        fatal(&e);
    }
}
