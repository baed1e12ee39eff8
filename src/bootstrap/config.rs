// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Run configuration
//!
//! [`Config`] is assembled once per run and shared with every module type and
//! singleton the driver registers. [`BootstrapConfig`] is the capability the
//! caller hands in: where the build directory is, and the optional hooks for
//! stopping early or reaping abandoned outputs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::args::Invocation;

/// Which half of the self-regeneration protocol a run represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Producing the final build graph
    Main,
    /// Producing the graph that rebuilds and re-runs the primary builder
    Primary,
}

impl Stage {
    pub fn select(generating_primary_builder: bool) -> Self {
        if generating_primary_builder {
            Self::Primary
        } else {
            Self::Main
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Primary => write!(f, "primary"),
        }
    }
}

/// Phase boundary at which a run returns early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBefore {
    PrepareBuildActions,
    WriteNinja,
}

impl FromStr for StopBefore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepare-build-actions" => Ok(Self::PrepareBuildActions),
            "write-ninja" => Ok(Self::WriteNinja),
            _ => Err(format!(
                "unknown phase '{}', expected 'prepare-build-actions' or 'write-ninja'",
                s
            )),
        }
    }
}

/// Which part of the build directory abandoned outputs are removed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbandonedPolicy {
    /// Directories to reap; the whole build directory when empty
    pub under: Vec<PathBuf>,
    /// Directories never reaped
    pub except: Vec<PathBuf>,
}

/// Capabilities supplied by the caller of a run
pub trait BootstrapConfig {
    fn build_dir(&self) -> &Path;

    fn stop_before(&self) -> Option<StopBefore> {
        None
    }

    /// Reaping is skipped unless this returns a policy
    fn remove_abandoned_files_under(&self, _build_dir: &Path) -> Option<AbandonedPolicy> {
        None
    }
}

/// Immutable run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) stage: Stage,
    pub(crate) top_level_file: PathBuf,
    pub(crate) build_dir: PathBuf,
    pub(crate) ninja_build_dir: String,
    pub(crate) subninjas: Vec<String>,
    pub(crate) glob_list_dir: String,
    pub(crate) run_tests: bool,
    pub(crate) use_validations: bool,
    pub(crate) invocations: Vec<Invocation>,
}

impl Config {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn top_level_file(&self) -> &Path {
        &self.top_level_file
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn ninja_build_dir(&self) -> &str {
        &self.ninja_build_dir
    }

    pub fn subninjas(&self) -> &[String] {
        &self.subninjas
    }

    pub fn glob_list_dir(&self) -> &str {
        &self.glob_list_dir
    }

    pub fn run_tests(&self) -> bool {
        self.run_tests
    }

    pub fn use_validations(&self) -> bool {
        self.use_validations
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_select() {
        assert_eq!(Stage::select(true), Stage::Primary);
        assert_eq!(Stage::select(false), Stage::Main);
    }

    #[test]
    fn test_stop_before_parse() {
        assert_eq!(
            "prepare-build-actions".parse::<StopBefore>(),
            Ok(StopBefore::PrepareBuildActions)
        );
        assert_eq!("write-ninja".parse::<StopBefore>(), Ok(StopBefore::WriteNinja));
        assert!("parse".parse::<StopBefore>().is_err());
    }

    #[test]
    fn test_default_capabilities() {
        struct Plain;
        impl BootstrapConfig for Plain {
            fn build_dir(&self) -> &Path {
                Path::new("out")
            }
        }

        assert_eq!(Plain.stop_before(), None);
        assert_eq!(Plain.remove_abandoned_files_under(Path::new("out")), None);
    }
}
