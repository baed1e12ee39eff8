// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Build description structures
//!
//! Defines the YAML schema of description files and the traits that module
//! and singleton implementations plug into the engine with.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::context::{BottomUpMutatorContext, ModuleContext, SingletonContext};
use crate::errors::GraphError;

/// A build description file
///
/// ```yaml
/// modules:
///   - type: bootstrap_library
///     name: parser
///     srcs: ["parser/*.rs"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptionFile {
    #[serde(default)]
    pub modules: Vec<serde_yaml::Mapping>,
}

/// One module declaration, before its type's factory has seen it
#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub name: String,
    pub type_name: String,
    pub file: PathBuf,
    /// Every property except `type`
    pub properties: serde_yaml::Value,
}

impl ModuleDef {
    /// Decode the properties into a module type's property struct
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GraphError> {
        serde_yaml::from_value(self.properties.clone()).map_err(|e| GraphError::Module {
            path: self.file.clone(),
            module: self.name.clone(),
            message: format!("invalid properties: {}", e),
        })
    }

    pub fn property_error(&self, property: &str, message: impl Into<String>) -> GraphError {
        GraphError::Property {
            path: self.file.clone(),
            module: self.name.clone(),
            property: property.to_string(),
            message: message.into(),
        }
    }
}

/// A buildable unit
pub trait Module: Send + Sync {
    /// Names of modules this one depends on
    fn deps(&self) -> &[String];

    /// Modules this one wants to be a plugin for
    fn plugin_for(&self) -> &[String] {
        &[]
    }

    /// Emit the module's build actions
    fn generate_build_actions(&self, ctx: &mut ModuleContext<'_>);
}

/// Graph-wide build action generator, run after every module
pub trait Singleton: Send + Sync {
    fn generate_build_actions(&self, ctx: &mut SingletonContext<'_>);
}

pub type ModuleFactory =
    Arc<dyn Fn(&ModuleDef) -> Result<Box<dyn Module>, GraphError> + Send + Sync>;

pub type SingletonFactory = Arc<dyn Fn() -> Box<dyn Singleton> + Send + Sync>;

pub type BottomUpMutator = fn(&mut BottomUpMutatorContext<'_>);

/// A parsed module owned by the engine
pub(crate) struct ModuleEntry {
    pub name: String,
    pub type_name: String,
    pub file: PathBuf,
    pub dir: PathBuf,
    pub module: Box<dyn Module>,
    /// Declared dependencies plus those added by mutators
    pub deps: Vec<String>,
    /// Outputs other modules consume, set while preparing build actions
    pub outputs: Vec<String>,
}

fn module_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.+@-]*$").expect("module name pattern is valid")
    })
}

/// Parse one description file into module entries
///
/// `read_path` is where the file is read from; `file` is how it is named in
/// errors and dependency lists.
pub(crate) fn parse_description(
    file: &Path,
    read_path: &Path,
    module_types: &HashMap<String, ModuleFactory>,
) -> Result<Vec<ModuleEntry>, Vec<GraphError>> {
    let blueprint_error = |message: String| GraphError::Blueprint {
        path: file.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(read_path)
        .map_err(|e| vec![blueprint_error(format!("failed to read file: {}", e))])?;

    let description: DescriptionFile = serde_yaml::from_str(&content)
        .map_err(|e| vec![blueprint_error(format!("malformed description: {}", e))])?;

    let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for (position, mut mapping) in description.modules.into_iter().enumerate() {
        let type_name = match mapping.remove("type") {
            Some(serde_yaml::Value::String(t)) => t,
            _ => {
                errors.push(blueprint_error(format!(
                    "module #{} has no \"type\"",
                    position + 1
                )));
                continue;
            }
        };

        let Some(factory) = module_types.get(&type_name) else {
            errors.push(blueprint_error(format!(
                "unrecognized module type \"{}\"",
                type_name
            )));
            continue;
        };

        let name = match mapping.get("name") {
            Some(serde_yaml::Value::String(n)) => n.clone(),
            _ => {
                errors.push(blueprint_error(format!(
                    "module #{} of type \"{}\" has no \"name\"",
                    position + 1,
                    type_name
                )));
                continue;
            }
        };

        let def = ModuleDef {
            name,
            type_name,
            file: file.to_path_buf(),
            properties: serde_yaml::Value::Mapping(mapping),
        };

        if !module_name_pattern().is_match(&def.name) {
            errors.push(
                def.property_error("name", format!("invalid module name \"{}\"", def.name)),
            );
            continue;
        }

        match factory(&def) {
            Ok(module) => {
                let deps = module.deps().to_vec();
                entries.push(ModuleEntry {
                    name: def.name,
                    type_name: def.type_name,
                    file: def.file,
                    dir: dir.clone(),
                    module,
                    deps,
                    outputs: Vec::new(),
                });
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}
