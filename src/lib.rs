// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! # stagegen - staged build-graph regeneration driver
//!
//! `stagegen` turns YAML build descriptions into a Ninja file and records
//! every input whose change should regenerate it.
//!
//! ## Features
//!
//! - **Two-stage regeneration** - the output can rebuild and re-run the primary builder
//! - **Precise dependencies** - every description, glob and extra input is reported
//! - **Batch errors** - all malformed descriptions are reported in one run
//! - **Cleanup** - outputs the graph no longer declares are removed
//!
//! ## Quick Start
//!
//! ```bash
//! # Generate out/build.ninja from the descriptions listed in out/.modules.list
//! stagegen -b out -l out/.modules.list -o out/build.ninja Blueprints
//!
//! # Also write a depfile so Ninja re-runs the generator when inputs change
//! stagegen -b out -d out/build.ninja.d -l out/.modules.list -o out/build.ninja Blueprints
//! ```

pub mod bootstrap;
pub mod cli;
pub mod errors;
pub mod graph;

// Re-export commonly used types
pub use bootstrap::{run_blueprint, Args, BootstrapConfig, Invocation, Stage, StopBefore};
pub use errors::{DriverError, DriverResult, GraphError};
pub use graph::{BuildEngine, Context};

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "stagegen=warn";

/// Log filter used with `--verbose`
pub const VERBOSE_LOG_FILTER: &str = "stagegen=debug";

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
