// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Recording engine for driver tests

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{BottomUpMutator, BuildEngine, GlobEntry, ModuleFactory, SingletonFactory};
use crate::errors::GraphError;

/// Engine that records every call and replays canned results
#[derive(Default)]
pub(crate) struct RecordingEngine {
    pub src_dir: PathBuf,
    pub calls: Vec<String>,
    pub module_paths: Vec<PathBuf>,
    pub list_error: bool,
    pub resolve_deps: Vec<PathBuf>,
    pub prepare_deps: Vec<PathBuf>,
    pub parse_errors: Vec<GraphError>,
    pub prepare_errors: Vec<GraphError>,
    pub content: String,
    pub write_error: bool,
    pub globs: Vec<GlobEntry>,
    pub targets: Vec<String>,
    pub module_types: Vec<String>,
    pub singletons: Vec<String>,
}

impl RecordingEngine {
    pub fn new(src_dir: &Path) -> Self {
        Self {
            src_dir: src_dir.to_path_buf(),
            content: "# generated\n".to_string(),
            ..Self::default()
        }
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c == name)
    }
}

impl BuildEngine for RecordingEngine {
    fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    fn set_module_list_file(&mut self, _path: &Path) {
        self.calls.push("set_module_list_file".into());
    }

    fn list_module_paths(&self, _base_dir: &Path) -> io::Result<Vec<PathBuf>> {
        if self.list_error {
            return Err(io::Error::new(io::ErrorKind::NotFound, "module list missing"));
        }
        Ok(self.module_paths.clone())
    }

    fn register_bottom_up_mutator(&mut self, name: &str, _mutator: BottomUpMutator) {
        self.calls.push(format!("mutator:{}", name));
    }

    fn register_module_type(&mut self, name: &str, _factory: ModuleFactory) {
        self.module_types.push(name.to_string());
    }

    fn register_singleton_type(&mut self, name: &str, _factory: SingletonFactory) {
        self.singletons.push(name.to_string());
    }

    fn parse_file_list(&mut self, files: &[PathBuf]) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        self.calls.push("parse_file_list".into());
        if !self.parse_errors.is_empty() {
            return Err(self.parse_errors.clone());
        }
        Ok(files.to_vec())
    }

    fn resolve_dependencies(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        self.calls.push("resolve_dependencies".into());
        Ok(self.resolve_deps.clone())
    }

    fn prepare_build_actions(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        self.calls.push("prepare_build_actions".into());
        if !self.prepare_errors.is_empty() {
            return Err(self.prepare_errors.clone());
        }
        Ok(self.prepare_deps.clone())
    }

    fn write_build_file(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.write_error {
            return Err(io::Error::new(io::ErrorKind::Other, "serializer failed"));
        }
        out.write_all(self.content.as_bytes())
    }

    fn globs(&self) -> Vec<GlobEntry> {
        self.globs.clone()
    }

    fn all_targets(&self) -> Vec<String> {
        self.targets.clone()
    }
}
