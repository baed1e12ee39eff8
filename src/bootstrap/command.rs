// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! The regeneration driver
//!
//! [`run_blueprint`] drives a [`BuildEngine`] through every phase, collects
//! the files the generated build file depends on, and emits the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, info_span};

use super::abandoned::remove_abandoned_files;
use super::args::{primary_builder_invocations, Args};
use super::config::{BootstrapConfig, Config, Stage, StopBefore};
use super::emit::emit_ninja_file;
use super::modules::{
    binary_factory, library_factory, plugin_deps, BINARY_TYPE, LIBRARY_TYPE,
    PLUGIN_DEPS_MUTATOR, PRIMARY_BINARY_TYPE,
};
use super::profile::{write_heap_profile, CpuProfile, TraceSession, SAMPLE_INTERVAL};
use super::singleton::{
    bootstrap_singleton_factory, glob_singleton_factory, BOOTSTRAP_SINGLETON, GLOB_SINGLETON,
};
use crate::errors::{DriverError, DriverResult};
use crate::graph::BuildEngine;

/// `path` if absolute, else `path` under `base`
pub fn join_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Process-wide tuning, applied once per run
pub fn tune_process(no_gc: bool) {
    let threads = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        Ok(()) => debug!(threads, "Configured global thread pool"),
        Err(e) => debug!(error = %e, "Global thread pool already configured"),
    }

    if no_gc {
        debug!("No garbage collector to disable, ignoring --nogc");
    }
}

/// Register the bootstrap mutator, module types and singletons
pub fn register_bootstrap_types<E: BuildEngine + ?Sized>(engine: &mut E, config: &Arc<Config>) {
    engine.register_bottom_up_mutator(PLUGIN_DEPS_MUTATOR, plugin_deps);
    engine.register_module_type(LIBRARY_TYPE, library_factory(Arc::clone(config)));
    engine.register_module_type(BINARY_TYPE, binary_factory(Arc::clone(config)));
    engine.register_module_type(PRIMARY_BINARY_TYPE, binary_factory(Arc::clone(config)));
    engine.register_singleton_type(
        BOOTSTRAP_SINGLETON,
        bootstrap_singleton_factory(Arc::clone(config)),
    );
    engine.register_singleton_type(
        GLOB_SINGLETON,
        glob_singleton_factory(config.glob_list_dir().to_string()),
    );
}

/// Run every phase and return the files the generated build file depends on
///
/// The list is in the order the phases reported the files and may contain
/// duplicates. A checkpoint from `bootstrap` returns it early.
pub fn run_blueprint<E: BuildEngine + ?Sized>(
    args: &Args,
    engine: &mut E,
    bootstrap: &dyn BootstrapConfig,
) -> DriverResult<Vec<PathBuf>> {
    let module_list_file = args
        .module_list_file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(DriverError::MissingModuleList)?;

    let root = engine.src_dir().to_path_buf();

    tune_process(args.no_gc);

    let _cpu_profile = args
        .cpu_profile
        .as_deref()
        .map(|p| CpuProfile::start(&join_path(&root, p), SAMPLE_INTERVAL))
        .transpose()?;

    let _trace = args
        .trace_file
        .as_deref()
        .map(|p| TraceSession::start(&join_path(&root, p), crate::DEFAULT_LOG_FILTER))
        .transpose()?;

    let src_dir = args
        .top_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut ninja_deps = Vec::new();
    engine.set_module_list_file(module_list_file);
    ninja_deps.push(module_list_file.to_path_buf());

    let files_to_parse =
        engine
            .list_module_paths(&src_dir)
            .map_err(|source| DriverError::EnumerateFiles {
                path: module_list_file.to_path_buf(),
                source,
            })?;

    let build_dir = bootstrap.build_dir().to_path_buf();
    let stage = Stage::select(args.generating_primary_builder);

    let config = Arc::new(Config {
        stage,
        top_level_file: args.top_file.clone(),
        build_dir: build_dir.clone(),
        ninja_build_dir: args.ninja_build_dir.clone(),
        subninjas: args.subninjas.clone(),
        glob_list_dir: args.glob_list_dir.clone(),
        run_tests: args.run_tests,
        use_validations: args.use_validations,
        invocations: primary_builder_invocations(args),
    });
    info!(%stage, files = files_to_parse.len(), "Starting regeneration");

    register_bootstrap_types(engine, &config);

    {
        let _span = info_span!("parse", files = files_to_parse.len()).entered();
        let parsed = engine
            .parse_file_list(&files_to_parse)
            .map_err(|errors| DriverError::graph("parsing build descriptions", errors))?;
        ninja_deps.extend(parsed);
    }

    {
        let _span = info_span!("resolve_dependencies").entered();
        let extra = engine
            .resolve_dependencies()
            .map_err(|errors| DriverError::graph("resolving dependencies", errors))?;
        ninja_deps.extend(extra);
    }

    if bootstrap.stop_before() == Some(StopBefore::PrepareBuildActions) {
        info!("Stopping before preparing build actions");
        return Ok(ninja_deps);
    }

    {
        let _span = info_span!("prepare_build_actions").entered();
        let extra = engine
            .prepare_build_actions()
            .map_err(|errors| DriverError::graph("preparing build actions", errors))?;
        ninja_deps.extend(extra);
    }

    if bootstrap.stop_before() == Some(StopBefore::WriteNinja) {
        info!("Stopping before writing the Ninja file");
        return Ok(ninja_deps);
    }

    {
        let _span = info_span!("write_ninja").entered();
        emit_ninja_file(engine, args, stage)?;
    }

    if let Some(policy) = bootstrap.remove_abandoned_files_under(&build_dir) {
        let _span = info_span!("remove_abandoned_files").entered();
        let mut keep: Vec<PathBuf> = engine.all_targets().into_iter().map(PathBuf::from).collect();
        keep.push(args.out_file.clone());
        keep.push(module_list_file.to_path_buf());
        keep.extend(
            [
                &args.glob_file,
                &args.dep_file,
                &args.cpu_profile,
                &args.mem_profile,
                &args.trace_file,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        remove_abandoned_files(&root, &build_dir, keep, &policy)?;
    }

    if let Some(ref mem_profile) = args.mem_profile {
        write_heap_profile(&join_path(&root, mem_profile))?;
    }

    Ok(ninja_deps)
}
