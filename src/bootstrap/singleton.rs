// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Graph-wide build actions for the driver's own bookkeeping

use std::path::PathBuf;
use std::sync::Arc;

use super::config::{Config, Stage};
use super::modules::{BINARY_TYPE, PRIMARY_BINARY_TYPE};
use crate::graph::glob::add_glob_actions;
use crate::graph::{BuildDef, ModuleInfo, Rule, Singleton, SingletonContext, SingletonFactory};

pub const BOOTSTRAP_SINGLETON: &str = "bootstrap";
pub const GLOB_SINGLETON: &str = "glob";

pub const REGEN_RULE: &str = "g.bootstrap.build.ninja";
pub const TOOLS_TARGET: &str = "blueprint_tools";

fn regen_rule() -> Rule {
    Rule {
        depfile: Some("$out.d".into()),
        deps: Some("gcc".into()),
        restat: true,
        generator: true,
        ..Rule::new(REGEN_RULE, "$builder -b $buildDir -d $out.d $extra")
            .description("$builder $out")
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:=,+@%$".contains(c)
}

/// Quote `arg` for `sh` unless it only contains safe characters
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_shell_safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Variables, the tools phony and the regeneration builds
pub struct BootstrapSingleton {
    config: Arc<Config>,
}

impl BootstrapSingleton {
    fn primary_builder<'a>(&self, ctx: &mut SingletonContext<'a>) -> Option<ModuleInfo<'a>> {
        let primaries: Vec<ModuleInfo<'a>> = ctx
            .modules()
            .filter(|m| m.type_name == PRIMARY_BINARY_TYPE)
            .collect();

        match primaries.as_slice() {
            [] => {
                if self.config.stage() == Stage::Primary && !self.config.invocations().is_empty() {
                    ctx.errorf(
                        self.config.top_level_file(),
                        format!("no {} module present", PRIMARY_BINARY_TYPE),
                    );
                }
                None
            }
            [only] => Some(*only),
            several => {
                let names: Vec<&str> = several.iter().map(|m| m.name).collect();
                ctx.errorf(
                    several[1].file,
                    format!(
                        "multiple {} modules present: {}",
                        PRIMARY_BINARY_TYPE,
                        names.join(", ")
                    ),
                );
                None
            }
        }
    }
}

impl Singleton for BootstrapSingleton {
    fn generate_build_actions(&self, ctx: &mut SingletonContext<'_>) {
        ctx.set_variable("buildDir", self.config.build_dir().to_string_lossy());
        if !self.config.ninja_build_dir().is_empty() {
            ctx.set_variable("builddir", self.config.ninja_build_dir());
        }
        ctx.set_variable("toolDir", "$buildDir/tools");
        ctx.set_variable("compileCmd", "$toolDir/compile");
        ctx.set_variable("linkCmd", "$toolDir/link");

        let tools: Vec<String> = ctx
            .modules()
            .filter(|m| m.type_name == BINARY_TYPE || m.type_name == PRIMARY_BINARY_TYPE)
            .flat_map(|m| m.outputs.iter().cloned())
            .collect();
        ctx.build(BuildDef {
            inputs: tools,
            ..BuildDef::new("phony", vec![TOOLS_TARGET.to_string()])
        });
        ctx.add_default(TOOLS_TARGET);

        if let Some(builder) = self.primary_builder(ctx) {
            if let Some(builder_file) = builder.outputs.first() {
                ctx.add_rule(regen_rule());
                for invocation in self.config.invocations() {
                    let extra: Vec<String> =
                        invocation.args().iter().map(|a| shell_quote(a)).collect();
                    ctx.build(
                        BuildDef {
                            inputs: invocation.inputs().to_vec(),
                            implicits: vec![builder_file.clone()],
                            ..BuildDef::new(REGEN_RULE, invocation.outputs().to_vec())
                        }
                        .arg("builder", builder_file.clone())
                        .arg("extra", extra.join(" ")),
                    );
                    ctx.add_ninja_file_deps(invocation.inputs().iter().map(PathBuf::from));
                }
            }
        }

        for subninja in self.config.subninjas() {
            ctx.add_subninja(subninja.clone());
        }
    }
}

/// One glob-watch build per glob expanded while preparing modules
pub struct GlobSingleton {
    glob_list_dir: String,
}

impl Singleton for GlobSingleton {
    fn generate_build_actions(&self, ctx: &mut SingletonContext<'_>) {
        let globs = ctx.globs();

        if self.glob_list_dir.is_empty() {
            ctx.add_ninja_file_deps(globs.iter().map(|g| PathBuf::from(&g.base_dir)));
            return;
        }

        add_glob_actions(ctx.actions_mut(), &self.glob_list_dir, globs);
        let dir = self.glob_list_dir.trim_end_matches('/');
        ctx.add_ninja_file_deps(
            globs
                .iter()
                .map(|g| PathBuf::from(format!("{}/{}", dir, g.list_file_name()))),
        );
    }
}

pub fn bootstrap_singleton_factory(config: Arc<Config>) -> SingletonFactory {
    Arc::new(move || {
        Box::new(BootstrapSingleton {
            config: Arc::clone(&config),
        }) as Box<dyn Singleton>
    })
}

pub fn glob_singleton_factory(glob_list_dir: String) -> SingletonFactory {
    Arc::new(move || {
        Box::new(GlobSingleton {
            glob_list_dir: glob_list_dir.clone(),
        }) as Box<dyn Singleton>
    })
}
