// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Module types the driver registers
//!
//! Libraries compile to an archive; binaries compile, link and install to
//! `$buildDir/bin`. A primary binary is a binary that the bootstrap
//! singleton uses to run the regeneration invocations.

use serde::Deserialize;
use std::sync::Arc;

use super::config::Config;
use crate::graph::{
    BottomUpMutatorContext, BuildDef, Module, ModuleContext, ModuleDef, ModuleFactory, Rule,
};

pub const LIBRARY_TYPE: &str = "bootstrap_library";
pub const BINARY_TYPE: &str = "bootstrap_binary";
pub const PRIMARY_BINARY_TYPE: &str = "bootstrap_primary_binary";
pub const PLUGIN_DEPS_MUTATOR: &str = "bootstrap_plugin_deps";

pub const COMPILE_RULE: &str = "g.bootstrap.compile";
pub const LINK_RULE: &str = "g.bootstrap.link";
pub const CP_RULE: &str = "g.bootstrap.cp";
pub const TEST_RULE: &str = "g.bootstrap.test";

fn compile_rule() -> Rule {
    Rule {
        depfile: Some("$out.d".into()),
        deps: Some("gcc".into()),
        ..Rule::new(
            COMPILE_RULE,
            "$compileCmd -o $out -p $pkgPath $incFlags -MD $out.d $in",
        )
        .description("compile $out")
    }
}

fn link_rule() -> Rule {
    Rule::new(LINK_RULE, "$linkCmd -o $out $libDirFlags $in").description("link $out")
}

fn cp_rule() -> Rule {
    Rule::new(CP_RULE, "cp $in $out").description("cp $out")
}

fn test_rule() -> Rule {
    Rule::new(TEST_RULE, "$in && touch $out").description("test $pkgPath")
}

fn intermediates_dir(name: &str) -> String {
    format!("$buildDir/.intermediates/{}", name)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(".")
}

fn flag_list(flag: &str, archives: &[String]) -> String {
    let mut dirs: Vec<&str> = Vec::new();
    for archive in archives {
        let dir = parent_dir(archive);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs.iter()
        .map(|d| format!("{} {}", flag, d))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Archives of every library the module depends on, transitively
///
/// Reports a module error for any dependency that is not a library.
fn dependency_archives(ctx: &mut ModuleContext<'_>) -> Vec<String> {
    let mut archives = Vec::new();
    let mut bad = Vec::new();

    for dep in ctx.deps() {
        if dep.type_name != LIBRARY_TYPE {
            bad.push(dep.name.to_string());
            continue;
        }
        for output in dep.outputs {
            if !archives.contains(output) {
                archives.push(output.clone());
            }
        }
    }

    for name in bad {
        ctx.module_error(format!(
            "depends on \"{}\", which is not a {}",
            name, LIBRARY_TYPE
        ));
    }

    archives
}

/// Compile `srcs` into `archive`
fn compile(
    ctx: &mut ModuleContext<'_>,
    archive: &str,
    pkg_path: &str,
    srcs: Vec<String>,
    deps: &[String],
) {
    ctx.add_rule(compile_rule());
    ctx.build(
        BuildDef {
            inputs: srcs,
            implicits: deps.to_vec(),
            ..BuildDef::new(COMPILE_RULE, vec![archive.to_string()])
        }
        .arg("pkgPath", pkg_path)
        .arg("incFlags", flag_list("-I", deps)),
    );
}

/// Emit the build that runs a module's embedded tests
///
/// Returns the `test.passed` stamp other builds attach to.
fn build_tests(
    ctx: &mut ModuleContext<'_>,
    pkg_path: &str,
    srcs: &[String],
    test_srcs: &[String],
    deps: &[String],
) -> Option<String> {
    let test_srcs = ctx.expand_sources("test_srcs", test_srcs);
    if test_srcs.is_empty() {
        return None;
    }

    let test_dir = format!("{}/test", intermediates_dir(ctx.name()));
    let archive = format!("{}/{}.a", test_dir, pkg_path.replace('/', "_"));
    let binary = format!("{}/test", test_dir);
    let passed = format!("{}/test.passed", test_dir);

    let mut inputs = srcs.to_vec();
    inputs.extend(test_srcs);
    compile(ctx, &archive, pkg_path, inputs, deps);

    ctx.add_rule(link_rule());
    ctx.build(
        BuildDef {
            inputs: vec![archive],
            implicits: deps.to_vec(),
            ..BuildDef::new(LINK_RULE, vec![binary.clone()])
        }
        .arg("libDirFlags", flag_list("-L", deps)),
    );

    ctx.add_rule(test_rule());
    ctx.build(
        BuildDef {
            inputs: vec![binary],
            ..BuildDef::new(TEST_RULE, vec![passed.clone()])
        }
        .arg("pkgPath", pkg_path),
    );

    Some(passed)
}

/// Hook the test stamp into `build` as a validation or an order-only input
fn attach_tests(config: &Config, build: BuildDef, passed: Option<String>) -> BuildDef {
    let Some(passed) = passed else {
        return build;
    };
    let mut build = build;
    if config.use_validations() {
        build.validations.push(passed);
    } else {
        build.order_only.push(passed);
    }
    build
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibraryProperties {
    name: String,
    #[serde(default)]
    srcs: Vec<String>,
    #[serde(default)]
    test_srcs: Vec<String>,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    pkg_path: Option<String>,
    #[serde(default)]
    plugin_for: Vec<String>,
}

/// A compiled library archive
pub struct Library {
    config: Arc<Config>,
    props: LibraryProperties,
}

impl Module for Library {
    fn deps(&self) -> &[String] {
        &self.props.deps
    }

    fn plugin_for(&self) -> &[String] {
        &self.props.plugin_for
    }

    fn generate_build_actions(&self, ctx: &mut ModuleContext<'_>) {
        let srcs = ctx.expand_sources("srcs", &self.props.srcs);
        if srcs.is_empty() {
            ctx.property_error("srcs", "a library needs at least one source");
            return;
        }

        let deps = dependency_archives(ctx);
        let pkg_path = self.props.pkg_path.as_deref().unwrap_or(&self.props.name);
        let archive = format!(
            "{}/{}.a",
            intermediates_dir(&self.props.name),
            pkg_path.replace('/', "_")
        );

        let passed = if self.config.run_tests() {
            build_tests(ctx, pkg_path, &srcs, &self.props.test_srcs, &deps)
        } else {
            None
        };

        ctx.add_rule(compile_rule());
        let build = BuildDef {
            inputs: srcs,
            implicits: deps.clone(),
            ..BuildDef::new(COMPILE_RULE, vec![archive.clone()])
        }
        .arg("pkgPath", pkg_path)
        .arg("incFlags", flag_list("-I", &deps));
        ctx.build(attach_tests(&self.config, build, passed));

        let mut outputs = vec![archive];
        outputs.extend(deps);
        ctx.set_outputs(outputs);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BinaryProperties {
    name: String,
    #[serde(default)]
    srcs: Vec<String>,
    #[serde(default)]
    test_srcs: Vec<String>,
    #[serde(default)]
    deps: Vec<String>,
    #[serde(default)]
    plugin_for: Vec<String>,
}

/// An executable installed to `$buildDir/bin`
pub struct Binary {
    config: Arc<Config>,
    props: BinaryProperties,
}

impl Binary {
    pub fn install_path(name: &str) -> String {
        format!("$buildDir/bin/{}", name)
    }
}

impl Module for Binary {
    fn deps(&self) -> &[String] {
        &self.props.deps
    }

    fn plugin_for(&self) -> &[String] {
        &self.props.plugin_for
    }

    fn generate_build_actions(&self, ctx: &mut ModuleContext<'_>) {
        let srcs = ctx.expand_sources("srcs", &self.props.srcs);
        if srcs.is_empty() {
            ctx.property_error("srcs", "a binary needs at least one source");
            return;
        }

        let deps = dependency_archives(ctx);
        let name = &self.props.name;
        let obj_dir = format!("{}/obj", intermediates_dir(name));
        let archive = format!("{}/{}.a", obj_dir, name);
        let linked = format!("{}/a.out", obj_dir);
        let installed = Self::install_path(name);

        let passed = if self.config.run_tests() {
            build_tests(ctx, "main", &srcs, &self.props.test_srcs, &deps)
        } else {
            None
        };

        compile(ctx, &archive, "main", srcs, &deps);

        ctx.add_rule(link_rule());
        ctx.build(
            BuildDef {
                inputs: vec![archive],
                implicits: deps.clone(),
                ..BuildDef::new(LINK_RULE, vec![linked.clone()])
            }
            .arg("libDirFlags", flag_list("-L", &deps)),
        );

        ctx.add_rule(cp_rule());
        let install = BuildDef {
            inputs: vec![linked],
            ..BuildDef::new(CP_RULE, vec![installed.clone()])
        };
        ctx.build(attach_tests(&self.config, install, passed));

        ctx.set_outputs(vec![installed]);
    }
}

pub fn library_factory(config: Arc<Config>) -> ModuleFactory {
    Arc::new(move |def: &ModuleDef| {
        let props: LibraryProperties = def.decode()?;
        Ok(Box::new(Library {
            config: Arc::clone(&config),
            props,
        }) as Box<dyn Module>)
    })
}

/// Factory for both binary types; the primary builder differs only by type name
pub fn binary_factory(config: Arc<Config>) -> ModuleFactory {
    Arc::new(move |def: &ModuleDef| {
        let props: BinaryProperties = def.decode()?;
        Ok(Box::new(Binary {
            config: Arc::clone(&config),
            props,
        }) as Box<dyn Module>)
    })
}

/// Make every library with `plugin_for` a dependency of its hosts
pub fn plugin_deps(ctx: &mut BottomUpMutatorContext<'_>) {
    let hosts = ctx.module().plugin_for();
    if hosts.is_empty() {
        return;
    }

    if ctx.module_type() != LIBRARY_TYPE {
        ctx.property_error(
            "plugin_for",
            format!("only a {} can be a plugin", LIBRARY_TYPE),
        );
        return;
    }

    for host in hosts {
        ctx.add_reverse_dependency(host);
    }
}
