// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Views of the engine handed to mutators, modules and singletons

use std::path::{Path, PathBuf};

use super::definition::{Module, ModuleEntry};
use super::glob::{is_glob, GlobEntry, GlobRegistry};
use super::ninja::{join_ninja, BuildActions, BuildDef, Rule};
use crate::errors::GraphError;

/// Read-only summary of a module
#[derive(Debug, Clone, Copy)]
pub struct ModuleInfo<'a> {
    pub name: &'a str,
    pub type_name: &'a str,
    pub file: &'a Path,
    pub outputs: &'a [String],
}

impl<'a> From<&'a ModuleEntry> for ModuleInfo<'a> {
    fn from(entry: &'a ModuleEntry) -> Self {
        Self {
            name: &entry.name,
            type_name: &entry.type_name,
            file: &entry.file,
            outputs: &entry.outputs,
        }
    }
}

/// Context for a bottom-up mutator visiting one module
pub struct BottomUpMutatorContext<'a> {
    entry: &'a ModuleEntry,
    reverse_deps: Vec<String>,
    ninja_file_deps: &'a mut Vec<PathBuf>,
    errors: &'a mut Vec<GraphError>,
}

impl<'a> BottomUpMutatorContext<'a> {
    pub(crate) fn new(
        entry: &'a ModuleEntry,
        ninja_file_deps: &'a mut Vec<PathBuf>,
        errors: &'a mut Vec<GraphError>,
    ) -> Self {
        Self {
            entry,
            reverse_deps: Vec::new(),
            ninja_file_deps,
            errors,
        }
    }

    pub fn module(&self) -> &'a dyn Module {
        self.entry.module.as_ref()
    }

    pub fn module_name(&self) -> &'a str {
        &self.entry.name
    }

    pub fn module_type(&self) -> &'a str {
        &self.entry.type_name
    }

    /// Make module `host` depend on the module being visited
    pub fn add_reverse_dependency(&mut self, host: &str) {
        self.reverse_deps.push(host.to_string());
    }

    pub fn add_ninja_file_deps(&mut self, deps: impl IntoIterator<Item = PathBuf>) {
        self.ninja_file_deps.extend(deps);
    }

    pub fn property_error(&mut self, property: &str, message: impl Into<String>) {
        self.errors.push(GraphError::Property {
            path: self.entry.file.clone(),
            module: self.entry.name.clone(),
            property: property.to_string(),
            message: message.into(),
        });
    }

    pub(crate) fn into_reverse_deps(self) -> Vec<String> {
        self.reverse_deps
    }
}

/// Context for a module generating its build actions
pub struct ModuleContext<'a> {
    entry: &'a ModuleEntry,
    src_dir: &'a Path,
    deps: Vec<ModuleInfo<'a>>,
    actions: &'a mut BuildActions,
    globs: &'a mut GlobRegistry,
    ninja_file_deps: &'a mut Vec<PathBuf>,
    errors: &'a mut Vec<GraphError>,
    outputs: Vec<String>,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        entry: &'a ModuleEntry,
        src_dir: &'a Path,
        deps: Vec<ModuleInfo<'a>>,
        actions: &'a mut BuildActions,
        globs: &'a mut GlobRegistry,
        ninja_file_deps: &'a mut Vec<PathBuf>,
        errors: &'a mut Vec<GraphError>,
    ) -> Self {
        Self {
            entry,
            src_dir,
            deps,
            actions,
            globs,
            ninja_file_deps,
            errors,
            outputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &'a str {
        &self.entry.name
    }

    pub fn type_name(&self) -> &'a str {
        &self.entry.type_name
    }

    /// Directory of the description file that declared the module
    pub fn module_dir(&self) -> &'a Path {
        &self.entry.dir
    }

    /// Direct dependencies, in declaration order
    pub fn deps(&self) -> &[ModuleInfo<'a>] {
        &self.deps
    }

    /// Resolve source entries relative to the module directory
    ///
    /// Entries with wildcards are expanded and recorded as globs; the rest
    /// are passed through untouched.
    pub fn expand_sources(&mut self, property: &str, entries: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for entry in entries {
            let path = join_ninja(self.module_dir(), entry);
            if !is_glob(entry) {
                out.push(path);
                continue;
            }
            match self.globs.glob(self.src_dir, &path) {
                Ok(files) => out.extend(files),
                Err(e) => {
                    self.property_error(property, format!("invalid glob \"{}\": {}", entry, e))
                }
            }
        }
        out
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.actions.add_rule(rule);
    }

    pub fn build(&mut self, build: BuildDef) {
        self.actions.add_build(build);
    }

    /// Outputs dependents of this module consume
    pub fn set_outputs(&mut self, outputs: Vec<String>) {
        self.outputs = outputs;
    }

    pub fn add_ninja_file_deps(&mut self, deps: impl IntoIterator<Item = PathBuf>) {
        self.ninja_file_deps.extend(deps);
    }

    pub fn module_error(&mut self, message: impl Into<String>) {
        self.errors.push(GraphError::Module {
            path: self.entry.file.clone(),
            module: self.entry.name.clone(),
            message: message.into(),
        });
    }

    pub fn property_error(&mut self, property: &str, message: impl Into<String>) {
        self.errors.push(GraphError::Property {
            path: self.entry.file.clone(),
            module: self.entry.name.clone(),
            property: property.to_string(),
            message: message.into(),
        });
    }

    pub(crate) fn into_outputs(self) -> Vec<String> {
        self.outputs
    }
}

/// Context for a singleton generating graph-wide build actions
pub struct SingletonContext<'a> {
    modules: &'a [ModuleEntry],
    globs: &'a [GlobEntry],
    actions: &'a mut BuildActions,
    ninja_file_deps: &'a mut Vec<PathBuf>,
    errors: &'a mut Vec<GraphError>,
}

impl<'a> SingletonContext<'a> {
    pub(crate) fn new(
        modules: &'a [ModuleEntry],
        globs: &'a [GlobEntry],
        actions: &'a mut BuildActions,
        ninja_file_deps: &'a mut Vec<PathBuf>,
        errors: &'a mut Vec<GraphError>,
    ) -> Self {
        Self {
            modules,
            globs,
            actions,
            ninja_file_deps,
            errors,
        }
    }

    /// Every module, in parse order
    pub fn modules(&self) -> impl Iterator<Item = ModuleInfo<'a>> + 'a {
        let modules: &'a [ModuleEntry] = self.modules;
        modules.iter().map(ModuleInfo::from)
    }

    /// Every glob recorded while modules generated their actions
    pub fn globs(&self) -> &'a [GlobEntry] {
        self.globs
    }

    pub fn set_variable(&mut self, name: &str, value: impl Into<String>) {
        self.actions.set_variable(name, value);
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.actions.add_rule(rule);
    }

    pub fn build(&mut self, build: BuildDef) {
        self.actions.add_build(build);
    }

    pub fn add_subninja(&mut self, path: impl Into<String>) {
        self.actions.add_subninja(path);
    }

    pub fn add_default(&mut self, target: impl Into<String>) {
        self.actions.add_default(target);
    }

    /// Direct access for helpers that emit a whole group of actions
    pub fn actions_mut(&mut self) -> &mut BuildActions {
        self.actions
    }

    pub fn add_ninja_file_deps(&mut self, deps: impl IntoIterator<Item = PathBuf>) {
        self.ninja_file_deps.extend(deps);
    }

    pub fn errorf(&mut self, path: &Path, message: impl Into<String>) {
        self.errors.push(GraphError::Blueprint {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }
}
