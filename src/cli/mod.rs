// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Command-line interface
//!
//! Flag spellings match the ones written into regeneration invocations, so a
//! generated build file can re-run this binary with its own arguments.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bootstrap::{
    join_path, read_invocations, run_blueprint, write_depfile, AbandonedPolicy, Args,
    BootstrapConfig, StopBefore,
};
use crate::errors::{DriverError, DriverResult};
use crate::graph::Context;

/// Staged build-graph regeneration driver
#[derive(Parser, Debug)]
#[clap(
    name = "stagegen",
    version,
    about = "Generate Ninja build files from YAML build descriptions",
    long_about = None,
    after_help = "Examples:\n\
        stagegen -l out/.modules.list -o out/build.ninja Blueprints\n\
        stagegen -b out -d out/build.ninja.d --empty-ninja-file -l out/.modules.list -o out/build.ninja Blueprints"
)]
pub struct Cli {
    /// Top-level build description
    #[clap(value_name = "TOP_FILE")]
    pub top_file: PathBuf,

    /// File listing every build description, one per line
    #[clap(short = 'l', value_name = "FILE")]
    pub module_list_file: Option<PathBuf>,

    /// Ninja file to write
    #[clap(short = 'o', value_name = "FILE", default_value = "build.ninja")]
    pub out_file: PathBuf,

    /// Build directory referenced as $buildDir
    #[clap(short = 'b', value_name = "DIR", default_value = ".")]
    pub build_dir: PathBuf,

    /// Directory Ninja keeps its own state in
    #[clap(short = 'n', long = "ninja_build_dir", value_name = "DIR", default_value = "")]
    pub ninja_build_dir: String,

    /// Write a dependency file for the generated Ninja file
    #[clap(short = 'd', value_name = "FILE")]
    pub dep_file: Option<PathBuf>,

    /// Write the glob-watch graph to this Ninja file
    #[clap(long = "globFile", value_name = "FILE")]
    pub glob_file: Option<PathBuf>,

    /// Directory glob results are recorded in
    #[clap(long = "globListDir", value_name = "DIR", default_value = "")]
    pub glob_list_dir: String,

    /// Ninja file to include with `subninja` (repeatable)
    #[clap(long = "subninja", value_name = "FILE")]
    pub subninjas: Vec<String>,

    /// Run embedded tests as part of the build
    #[clap(short = 't')]
    pub run_tests: bool,

    /// Attach embedded tests as validations instead of order-only inputs
    #[clap(long = "use-validations")]
    pub use_validations: bool,

    /// Write an empty Ninja file and defer generation in the main stage
    #[clap(long = "empty-ninja-file")]
    pub empty_ninja_file: bool,

    /// Accepted for compatibility; there is no collector to turn off
    #[clap(long = "nogc")]
    pub no_gc: bool,

    /// Sample CPU use into this file
    #[clap(long = "cpuprofile", value_name = "FILE")]
    pub cpu_profile: Option<PathBuf>,

    /// Write a memory snapshot to this file
    #[clap(long = "memprofile", value_name = "FILE")]
    pub mem_profile: Option<PathBuf>,

    /// Record span timings to this file
    #[clap(long = "trace", value_name = "FILE")]
    pub trace_file: Option<PathBuf>,

    /// Debugger listen address forwarded to regeneration invocations
    #[clap(long = "delve_listen", value_name = "ADDR")]
    pub delve_listen: Option<String>,

    /// Debugger path forwarded to regeneration invocations
    #[clap(long = "delve_path", value_name = "PATH")]
    pub delve_path: Option<String>,

    /// Generate the graph that rebuilds the primary builder
    #[clap(long = "generating-primary-builder")]
    pub generating_primary_builder: bool,

    /// JSON file with explicit regeneration invocations
    #[clap(long = "invocations", value_name = "FILE")]
    pub invocations: Option<PathBuf>,

    /// Return early before a phase (prepare-build-actions, write-ninja)
    #[clap(long = "stop-before", value_name = "PHASE", hide = true)]
    pub stop_before: Option<StopBefore>,

    /// Remove files under the build directory that are no longer generated
    #[clap(long = "remove-abandoned")]
    pub remove_abandoned: bool,

    /// Only remove abandoned files under this directory (repeatable)
    #[clap(long = "abandoned-under", value_name = "DIR", requires = "remove_abandoned")]
    pub abandoned_under: Vec<PathBuf>,

    /// Never remove abandoned files under this directory (repeatable)
    #[clap(long = "abandoned-except", value_name = "DIR", requires = "remove_abandoned")]
    pub abandoned_except: Vec<PathBuf>,

    /// Enable verbose output
    #[clap(short, long)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

impl Cli {
    /// Driver arguments for this command line
    pub fn to_args(&self) -> DriverResult<Args> {
        let primary_builder_invocations = match self.invocations {
            Some(ref path) => Some(read_invocations(path)?),
            None => None,
        };

        Ok(Args {
            out_file: self.out_file.clone(),
            subninjas: self.subninjas.clone(),
            glob_file: self.glob_file.clone(),
            glob_list_dir: self.glob_list_dir.clone(),
            dep_file: self.dep_file.clone(),
            cpu_profile: self.cpu_profile.clone(),
            mem_profile: self.mem_profile.clone(),
            trace_file: self.trace_file.clone(),
            delve_listen: self.delve_listen.clone(),
            delve_path: self.delve_path.clone(),
            run_tests: self.run_tests,
            use_validations: self.use_validations,
            no_gc: self.no_gc,
            empty_ninja_file: self.empty_ninja_file,
            ninja_build_dir: self.ninja_build_dir.clone(),
            module_list_file: self.module_list_file.clone(),
            top_file: self.top_file.clone(),
            generating_primary_builder: self.generating_primary_builder,
            primary_builder_invocations,
        })
    }
}

/// Caller configuration built from the command line
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub build_dir: PathBuf,
    pub stop_before: Option<StopBefore>,
    pub abandoned: Option<AbandonedPolicy>,
}

impl From<&Cli> for HostConfig {
    fn from(cli: &Cli) -> Self {
        let abandoned = cli.remove_abandoned.then(|| AbandonedPolicy {
            under: cli.abandoned_under.clone(),
            except: cli.abandoned_except.clone(),
        });

        Self {
            build_dir: cli.build_dir.clone(),
            stop_before: cli.stop_before,
            abandoned,
        }
    }
}

impl BootstrapConfig for HostConfig {
    fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn stop_before(&self) -> Option<StopBefore> {
        self.stop_before
    }

    fn remove_abandoned_files_under(&self, _build_dir: &Path) -> Option<AbandonedPolicy> {
        self.abandoned.clone()
    }
}

/// Run the driver for a parsed command line
pub fn run(cli: &Cli) -> DriverResult<()> {
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|source| DriverError::ChangeDirectory {
            path: dir.clone(),
            source,
        })?;
    }

    let args = cli.to_args()?;
    let config = HostConfig::from(cli);
    let mut engine = Context::new(".");

    let deps = run_blueprint(&args, &mut engine, &config)?;

    if let Some(ref dep_file) = args.dep_file {
        write_depfile(&join_path(Path::new("."), dep_file), &args.out_file, &deps)?;
        info!(path = %dep_file.display(), deps = deps.len(), "Wrote dependency file");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regeneration_flags_parse() {
        let cli = Cli::try_parse_from([
            "stagegen",
            "-t",
            "-l",
            "out/.modules.list",
            "-o",
            "$buildDir/build.ninja",
            "--empty-ninja-file",
            "--delve_listen",
            ":4321",
            "--delve_path",
            "/usr/bin/dlv",
            "Blueprints",
        ])
        .unwrap();

        let args = cli.to_args().unwrap();

        assert!(args.run_tests);
        assert!(args.empty_ninja_file);
        assert_eq!(args.module_list_file, Some(PathBuf::from("out/.modules.list")));
        assert_eq!(args.out_file, PathBuf::from("$buildDir/build.ninja"));
        assert_eq!(args.delve_listen.as_deref(), Some(":4321"));
        assert_eq!(args.top_file, PathBuf::from("Blueprints"));
    }

    #[test]
    fn test_stop_before_and_abandoned_policy() {
        let cli = Cli::try_parse_from([
            "stagegen",
            "-b",
            "out",
            "--stop-before",
            "write-ninja",
            "--remove-abandoned",
            "--abandoned-except",
            "out/keep",
            "Blueprints",
        ])
        .unwrap();

        let config = HostConfig::from(&cli);

        assert_eq!(config.stop_before(), Some(StopBefore::WriteNinja));
        assert_eq!(config.build_dir(), Path::new("out"));
        let policy = config.remove_abandoned_files_under(Path::new("out")).unwrap();
        assert!(policy.under.is_empty());
        assert_eq!(policy.except, vec![PathBuf::from("out/keep")]);
    }

    #[test]
    fn test_no_reaping_by_default() {
        let cli = Cli::try_parse_from(["stagegen", "Blueprints"]).unwrap();

        assert!(HostConfig::from(&cli)
            .remove_abandoned_files_under(Path::new("."))
            .is_none());
    }

    #[test]
    fn test_abandoned_dirs_require_remove_abandoned() {
        let result =
            Cli::try_parse_from(["stagegen", "--abandoned-under", "out/gen", "Blueprints"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_subninjas_repeat() {
        let cli = Cli::try_parse_from([
            "stagegen",
            "--subninja",
            "a.ninja",
            "--subninja",
            "b.ninja",
            "Blueprints",
        ])
        .unwrap();

        assert_eq!(cli.subninjas, vec!["a.ninja", "b.ninja"]);
    }
}
