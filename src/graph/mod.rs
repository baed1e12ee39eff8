// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Dependency-graph engine
//!
//! The regeneration driver only sees the [`BuildEngine`] trait: it registers
//! module types, mutators and singletons, then drives the engine through
//! parsing, dependency resolution, build-action preparation and Ninja
//! serialization. [`Context`] is the engine shipped with the binary.

mod context;
mod dag;
mod definition;
pub mod glob;
pub mod ninja;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{BottomUpMutatorContext, ModuleContext, ModuleInfo, SingletonContext};
pub use definition::{
    BottomUpMutator, DescriptionFile, Module, ModuleDef, ModuleFactory, Singleton,
    SingletonFactory,
};
pub use glob::{GlobEntry, GlobRegistry};
pub use ninja::{BuildActions, BuildDef, Rule};

use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::GraphError;
use dag::DependencyGraph;
use definition::{parse_description, ModuleEntry};

/// The capabilities the regeneration driver consumes from a graph engine
///
/// Every phase returns the extra files the generated graph depends on, or
/// the whole batch of problems it found.
pub trait BuildEngine {
    /// Root that relative paths are resolved against
    fn src_dir(&self) -> &Path;

    fn set_module_list_file(&mut self, path: &Path);

    /// Description files named by the module list, relative to `base_dir`
    fn list_module_paths(&self, base_dir: &Path) -> io::Result<Vec<PathBuf>>;

    fn register_bottom_up_mutator(&mut self, name: &str, mutator: BottomUpMutator);

    fn register_module_type(&mut self, name: &str, factory: ModuleFactory);

    fn register_singleton_type(&mut self, name: &str, factory: SingletonFactory);

    /// Parse description files into the module graph
    fn parse_file_list(&mut self, files: &[PathBuf]) -> Result<Vec<PathBuf>, Vec<GraphError>>;

    /// Link modules to their dependencies and run the mutators
    fn resolve_dependencies(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>>;

    /// Generate build actions for every module, then every singleton
    fn prepare_build_actions(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>>;

    /// Serialize the prepared build actions as a Ninja file
    fn write_build_file(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Globs expanded while preparing build actions
    fn globs(&self) -> Vec<GlobEntry>;

    /// Every declared output, with top-level variables expanded
    fn all_targets(&self) -> Vec<String>;
}

/// Reference engine reading YAML build descriptions
pub struct Context {
    src_dir: PathBuf,
    module_list_file: Option<PathBuf>,
    mutators: Vec<(String, BottomUpMutator)>,
    module_types: HashMap<String, ModuleFactory>,
    singletons: Vec<(String, SingletonFactory)>,
    modules: Vec<ModuleEntry>,
    order: Option<Vec<usize>>,
    actions: BuildActions,
    globs: GlobRegistry,
}

impl Context {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            module_list_file: None,
            mutators: Vec::new(),
            module_types: HashMap::new(),
            singletons: Vec::new(),
            modules: Vec::new(),
            order: None,
            actions: BuildActions::default(),
            globs: GlobRegistry::default(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.src_dir.join(path)
        }
    }

    /// Names of the parsed modules, in parse order
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Current dependencies of a module, including those added by mutators
    pub fn module_deps(&self, name: &str) -> Option<&[String]> {
        self.modules
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.deps.as_slice())
    }
}

impl BuildEngine for Context {
    fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    fn set_module_list_file(&mut self, path: &Path) {
        self.module_list_file = Some(path.to_path_buf());
    }

    fn list_module_paths(&self, base_dir: &Path) -> io::Result<Vec<PathBuf>> {
        let list_file = self.module_list_file.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no module list file set")
        })?;

        let content = fs::read_to_string(self.resolve(list_file))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| base_dir.join(line))
            .collect())
    }

    fn register_bottom_up_mutator(&mut self, name: &str, mutator: BottomUpMutator) {
        self.mutators.push((name.to_string(), mutator));
    }

    fn register_module_type(&mut self, name: &str, factory: ModuleFactory) {
        self.module_types.insert(name.to_string(), factory);
    }

    fn register_singleton_type(&mut self, name: &str, factory: SingletonFactory) {
        self.singletons.push((name.to_string(), factory));
    }

    fn parse_file_list(&mut self, files: &[PathBuf]) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        let parsed: Vec<Result<Vec<ModuleEntry>, Vec<GraphError>>> = files
            .par_iter()
            .map(|file| parse_description(file, &self.resolve(file), &self.module_types))
            .collect();

        let mut errors = Vec::new();
        let mut defined: HashMap<String, PathBuf> = self
            .modules
            .iter()
            .map(|m| (m.name.clone(), m.file.clone()))
            .collect();

        for result in parsed {
            match result {
                Ok(entries) => {
                    for entry in entries {
                        if let Some(first) = defined.get(&entry.name) {
                            errors.push(GraphError::Module {
                                path: entry.file.clone(),
                                module: entry.name.clone(),
                                message: format!("module already defined in {}", first.display()),
                            });
                            continue;
                        }
                        defined.insert(entry.name.clone(), entry.file.clone());
                        self.modules.push(entry);
                    }
                }
                Err(errs) => errors.extend(errs),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        debug!(files = files.len(), modules = self.modules.len(), "Parsed build descriptions");
        Ok(files.to_vec())
    }

    fn resolve_dependencies(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        let mut deps = Vec::new();
        let mut errors = Vec::new();

        let order = DependencyGraph::build(&self.modules)?
            .topological_order()
            .map_err(|e| vec![e])?;

        let mut reverse: Vec<(usize, Vec<String>)> = Vec::new();
        for (name, mutator) in &self.mutators {
            debug!(mutator = %name, "Running bottom-up mutator");
            for &idx in &order {
                let mut ctx =
                    BottomUpMutatorContext::new(&self.modules[idx], &mut deps, &mut errors);
                mutator(&mut ctx);
                let hosts = ctx.into_reverse_deps();
                if !hosts.is_empty() {
                    reverse.push((idx, hosts));
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        for (idx, hosts) in reverse {
            let name = self.modules[idx].name.clone();
            for host in hosts {
                match self.modules.iter_mut().find(|m| m.name == host) {
                    Some(target) => {
                        if !target.deps.contains(&name) {
                            target.deps.push(name.clone());
                        }
                    }
                    None => errors.push(GraphError::Module {
                        path: self.modules[idx].file.clone(),
                        module: name.clone(),
                        message: format!("reverse dependency on undefined module \"{}\"", host),
                    }),
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let order = DependencyGraph::build(&self.modules)?
            .topological_order()
            .map_err(|e| vec![e])?;
        self.order = Some(order);

        Ok(deps)
    }

    fn prepare_build_actions(&mut self) -> Result<Vec<PathBuf>, Vec<GraphError>> {
        let Some(order) = self.order.clone() else {
            return Err(vec![GraphError::internal(
                "build actions prepared before dependencies were resolved",
            )]);
        };

        let mut deps = Vec::new();
        let mut errors = Vec::new();
        let index: HashMap<String, usize> = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        for idx in order {
            let entry = &self.modules[idx];
            let dep_infos: Vec<ModuleInfo<'_>> = entry
                .deps
                .iter()
                .filter_map(|d| index.get(d))
                .map(|&i| ModuleInfo::from(&self.modules[i]))
                .collect();

            let mut ctx = ModuleContext::new(
                entry,
                &self.src_dir,
                dep_infos,
                &mut self.actions,
                &mut self.globs,
                &mut deps,
                &mut errors,
            );
            entry.module.generate_build_actions(&mut ctx);
            let outputs = ctx.into_outputs();
            self.modules[idx].outputs = outputs;
        }

        let globs = self.globs.entries().to_vec();
        for (name, factory) in &self.singletons {
            debug!(singleton = %name, "Generating singleton build actions");
            let singleton = factory();
            let mut ctx = SingletonContext::new(
                &self.modules,
                &globs,
                &mut self.actions,
                &mut deps,
                &mut errors,
            );
            singleton.generate_build_actions(&mut ctx);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        debug!(builds = self.actions.builds().len(), "Prepared build actions");
        Ok(deps)
    }

    fn write_build_file(&self, out: &mut dyn Write) -> io::Result<()> {
        self.actions.write(out)
    }

    fn globs(&self) -> Vec<GlobEntry> {
        self.globs.entries().to_vec()
    }

    fn all_targets(&self) -> Vec<String> {
        self.actions
            .outputs()
            .map(|output| self.actions.expand(output))
            .collect()
    }
}
