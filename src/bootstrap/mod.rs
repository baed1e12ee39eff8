// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Staged regeneration driver
//!
//! Turns build descriptions into a Ninja file through a [`BuildEngine`],
//! records every file that should trigger regeneration, and supports the
//! two-stage protocol in which the output itself rebuilds the primary
//! builder.
//!
//! [`BuildEngine`]: crate::graph::BuildEngine

mod abandoned;
mod args;
mod command;
mod config;
mod depfile;
mod emit;
mod modules;
mod profile;
mod singleton;

pub use abandoned::{clean_path, remove_abandoned_files};
pub use args::{
    primary_builder_extra_flags, primary_builder_invocations, read_invocations, Args, Invocation,
    MAIN_NINJA_FILE,
};
pub use command::{join_path, register_bootstrap_types, run_blueprint, tune_process};
pub use config::{AbandonedPolicy, BootstrapConfig, Config, Stage, StopBefore};
pub use depfile::{write_depfile, write_depfile_to};
pub use emit::{
    emit_ninja_file, needs_full_generation, write_empty_ninja_file, NinjaOutput,
    OUT_FILE_PERMISSIONS,
};
pub use modules::{
    plugin_deps, Binary, Library, BINARY_TYPE, LIBRARY_TYPE, PLUGIN_DEPS_MUTATOR,
    PRIMARY_BINARY_TYPE,
};
pub use profile::{write_heap_profile, CpuProfile, TraceSession};
pub use singleton::{shell_quote, BOOTSTRAP_SINGLETON, GLOB_SINGLETON, REGEN_RULE, TOOLS_TARGET};
