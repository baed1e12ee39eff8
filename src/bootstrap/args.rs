// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Driver arguments and regeneration invocations

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{DriverError, DriverResult};

/// Build file the synthesized regeneration invocation produces
pub const MAIN_NINJA_FILE: &str = "$buildDir/build.ninja";

/// One command capable of regenerating a downstream build file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Invocation {
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    args: Vec<String>,
}

impl Invocation {
    pub fn new(inputs: Vec<String>, outputs: Vec<String>, args: Vec<String>) -> Self {
        Self {
            inputs,
            outputs,
            args,
        }
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Load an explicit invocation list from a JSON file
pub fn read_invocations(path: &Path) -> DriverResult<Vec<Invocation>> {
    let content =
        std::fs::read_to_string(path).map_err(|e| DriverError::InvalidInvocations {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    serde_json::from_str(&content).map_err(|e| DriverError::InvalidInvocations {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Everything a caller supplies to one driver run
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub out_file: PathBuf,
    pub subninjas: Vec<String>,
    pub glob_file: Option<PathBuf>,
    pub glob_list_dir: String,
    pub dep_file: Option<PathBuf>,

    pub cpu_profile: Option<PathBuf>,
    pub mem_profile: Option<PathBuf>,
    pub trace_file: Option<PathBuf>,
    pub delve_listen: Option<String>,
    pub delve_path: Option<String>,

    pub run_tests: bool,
    pub use_validations: bool,
    pub no_gc: bool,
    pub empty_ninja_file: bool,

    pub ninja_build_dir: String,
    pub module_list_file: Option<PathBuf>,
    pub top_file: PathBuf,
    pub generating_primary_builder: bool,

    /// Overrides the single synthesized invocation when set
    pub primary_builder_invocations: Option<Vec<Invocation>>,
}

/// Flags the primary builder is re-run with, minus the top file
///
/// Argument order is significant to the tools that compare regeneration
/// commands, so it never changes.
pub fn primary_builder_extra_flags(args: &Args, main_ninja_file: &str) -> Vec<String> {
    let mut result = Vec::new();

    if args.run_tests {
        result.push("-t".to_string());
    }

    let module_list = args
        .module_list_file
        .as_deref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    result.extend(["-l".to_string(), module_list]);
    result.extend(["-o".to_string(), main_ninja_file.to_string()]);

    if args.empty_ninja_file {
        result.push("--empty-ninja-file".to_string());
    }

    if let Some(listen) = args.delve_listen.as_deref().filter(|s| !s.is_empty()) {
        result.extend(["--delve_listen".to_string(), listen.to_string()]);
    }

    if let Some(path) = args.delve_path.as_deref().filter(|s| !s.is_empty()) {
        result.extend(["--delve_path".to_string(), path.to_string()]);
    }

    result
}

/// The caller's invocation list, or the single one that rebuilds the main build file
pub fn primary_builder_invocations(args: &Args) -> Vec<Invocation> {
    if let Some(ref invocations) = args.primary_builder_invocations {
        return invocations.clone();
    }

    let top_file = args.top_file.to_string_lossy().into_owned();
    let mut flags = primary_builder_extra_flags(args, MAIN_NINJA_FILE);
    flags.push(top_file.clone());

    vec![Invocation::new(
        vec![top_file],
        vec![MAIN_NINJA_FILE.to_string()],
        flags,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base_args() -> Args {
        Args {
            module_list_file: Some("out/.modules.list".into()),
            top_file: "Blueprints".into(),
            ..Args::default()
        }
    }

    #[test]
    fn test_minimal_flags() {
        let flags = primary_builder_extra_flags(&base_args(), MAIN_NINJA_FILE);

        assert_eq!(flags, vec!["-l", "out/.modules.list", "-o", "$buildDir/build.ninja"]);
    }

    #[test]
    fn test_empty_debugger_flags_are_omitted() {
        let args = Args {
            delve_listen: Some(String::new()),
            delve_path: Some(String::new()),
            ..base_args()
        };

        let flags = primary_builder_extra_flags(&args, MAIN_NINJA_FILE);

        assert_eq!(flags, vec!["-l", "out/.modules.list", "-o", "$buildDir/build.ninja"]);
    }

    #[test]
    fn test_every_optional_flag_in_order() {
        let args = Args {
            run_tests: true,
            empty_ninja_file: true,
            delve_listen: Some(":4321".into()),
            delve_path: Some("/usr/bin/dlv".into()),
            ..base_args()
        };

        let invocations = primary_builder_invocations(&args);

        assert_eq!(invocations.len(), 1);
        insta::assert_snapshot!(
            invocations[0].args().join(" "),
            @"-t -l out/.modules.list -o $buildDir/build.ninja --empty-ninja-file --delve_listen :4321 --delve_path /usr/bin/dlv Blueprints"
        );
    }

    #[test]
    fn test_synthesized_invocation() {
        let invocations = primary_builder_invocations(&base_args());
        let invocation = &invocations[0];

        assert_eq!(invocation.inputs(), ["Blueprints"]);
        assert_eq!(invocation.outputs(), ["$buildDir/build.ninja"]);
        assert_eq!(invocation.args().last().map(String::as_str), Some("Blueprints"));
    }

    #[test]
    fn test_explicit_invocations_used_verbatim() {
        let explicit = vec![
            Invocation::new(vec!["a".into()], vec!["a.ninja".into()], vec!["--a".into()]),
            Invocation::new(vec![], vec!["b.ninja".into()], vec![]),
        ];
        let args = Args {
            primary_builder_invocations: Some(explicit.clone()),
            ..base_args()
        };

        assert_eq!(primary_builder_invocations(&args), explicit);
    }

    #[test]
    fn test_read_invocations() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("invocations.json");
        std::fs::write(
            &path,
            r#"[{"inputs": ["Blueprints"], "outputs": ["out/docs.ninja"], "args": ["--docs"]}]"#,
        )
        .unwrap();

        let invocations = read_invocations(&path).unwrap();

        assert_eq!(invocations[0].outputs(), ["out/docs.ninja"]);
        assert_eq!(invocations[0].args(), ["--docs"]);
    }

    #[test]
    fn test_read_invalid_invocations() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("invocations.json");
        std::fs::write(&path, r#"[{"command": "x"}]"#).unwrap();

        let err = read_invocations(&path).unwrap_err();

        assert!(matches!(err, DriverError::InvalidInvocations { .. }));
    }
}
