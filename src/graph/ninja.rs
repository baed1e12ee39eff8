// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Ninja build actions and their serialization

use std::io::{self, Write};
use std::path::Path;

const HEADER: &str = "\
# ******************************************************************************
# ***            This file is generated and should not be edited             ***
# ******************************************************************************
";

/// A Ninja rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<String>,
    pub deps: Option<String>,
    pub pool: Option<String>,
    pub restat: bool,
    pub generator: bool,
}

impl Rule {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A Ninja build statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDef {
    pub rule: String,
    pub outputs: Vec<String>,
    pub inputs: Vec<String>,
    pub implicits: Vec<String>,
    pub order_only: Vec<String>,
    pub validations: Vec<String>,
    pub args: Vec<(String, String)>,
}

impl BuildDef {
    pub fn new(rule: impl Into<String>, outputs: Vec<String>) -> Self {
        Self {
            rule: rule.into(),
            outputs,
            ..Self::default()
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }
}

/// Everything that ends up in a generated Ninja file
#[derive(Debug, Clone, Default)]
pub struct BuildActions {
    variables: Vec<(String, String)>,
    rules: Vec<Rule>,
    builds: Vec<BuildDef>,
    subninjas: Vec<String>,
    defaults: Vec<String>,
}

impl BuildActions {
    /// Set a top-level variable, replacing an earlier value
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.variables.push((name, value)),
        }
    }

    /// Add a rule; rules are shared between modules so repeats are ignored
    pub fn add_rule(&mut self, rule: Rule) {
        if !self.rules.iter().any(|r| r.name == rule.name) {
            self.rules.push(rule);
        }
    }

    pub fn add_build(&mut self, build: BuildDef) {
        self.builds.push(build);
    }

    pub fn add_subninja(&mut self, path: impl Into<String>) {
        self.subninjas.push(path.into());
    }

    pub fn add_default(&mut self, target: impl Into<String>) {
        self.defaults.push(target.into());
    }

    pub fn builds(&self) -> &[BuildDef] {
        &self.builds
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.builds.is_empty() && self.subninjas.is_empty()
    }

    /// Every declared output, unexpanded
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.builds
            .iter()
            .flat_map(|b| b.outputs.iter().map(String::as_str))
    }

    /// Expand references to top-level variables in `value`
    pub fn expand(&self, value: &str) -> String {
        let mut names: Vec<&(String, String)> = self.variables.iter().collect();
        // Longest names first so `$buildDirX` never matches `$buildDir`.
        names.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = value.to_string();
        for _ in 0..8 {
            if !out.contains('$') {
                break;
            }
            let before = out.clone();
            for (name, val) in &names {
                out = out.replace(&format!("${{{}}}", name), val);
                out = out.replace(&format!("${}", name), val);
            }
            if out == before {
                break;
            }
        }
        out
    }

    /// Serialize as a Ninja file
    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(HEADER.as_bytes())?;
        writeln!(out)?;

        let required = if self.builds.iter().any(|b| !b.validations.is_empty()) {
            "1.10.0"
        } else {
            "1.7.0"
        };
        writeln!(out, "ninja_required_version = {}", required)?;
        writeln!(out)?;

        for (name, value) in &self.variables {
            writeln!(out, "{} = {}", name, value)?;
        }
        if !self.variables.is_empty() {
            writeln!(out)?;
        }

        for rule in &self.rules {
            write_rule(out, rule)?;
        }

        for build in &self.builds {
            write_build(out, build)?;
        }

        for subninja in &self.subninjas {
            writeln!(out, "subninja {}", escape_path(subninja))?;
        }
        if !self.subninjas.is_empty() {
            writeln!(out)?;
        }

        if !self.defaults.is_empty() {
            let defaults: Vec<String> = self.defaults.iter().map(|d| escape_path(d)).collect();
            writeln!(out, "default {}", defaults.join(" "))?;
        }

        Ok(())
    }
}

fn write_rule(out: &mut dyn Write, rule: &Rule) -> io::Result<()> {
    writeln!(out, "rule {}", rule.name)?;
    writeln!(out, "    command = {}", rule.command)?;
    if let Some(ref description) = rule.description {
        writeln!(out, "    description = {}", description)?;
    }
    if let Some(ref depfile) = rule.depfile {
        writeln!(out, "    depfile = {}", depfile)?;
    }
    if let Some(ref deps) = rule.deps {
        writeln!(out, "    deps = {}", deps)?;
    }
    if let Some(ref pool) = rule.pool {
        writeln!(out, "    pool = {}", pool)?;
    }
    if rule.restat {
        writeln!(out, "    restat = true")?;
    }
    if rule.generator {
        writeln!(out, "    generator = true")?;
    }
    writeln!(out)
}

fn write_build(out: &mut dyn Write, build: &BuildDef) -> io::Result<()> {
    let mut line = format!("build {}: {}", join_escaped(&build.outputs), build.rule);
    if !build.inputs.is_empty() {
        line.push(' ');
        line.push_str(&join_escaped(&build.inputs));
    }
    if !build.implicits.is_empty() {
        line.push_str(" | ");
        line.push_str(&join_escaped(&build.implicits));
    }
    if !build.order_only.is_empty() {
        line.push_str(" || ");
        line.push_str(&join_escaped(&build.order_only));
    }
    if !build.validations.is_empty() {
        line.push_str(" |@ ");
        line.push_str(&join_escaped(&build.validations));
    }
    writeln!(out, "{}", line)?;

    for (name, value) in &build.args {
        writeln!(out, "    {} = {}", name, value)?;
    }
    writeln!(out)
}

fn join_escaped(paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| escape_path(p))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape characters that are significant in Ninja path lists
///
/// `$` is left alone so that paths may reference variables.
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            '\n' => out.push_str("$\n"),
            c => out.push(c),
        }
    }
    out
}

/// Join a relative path onto a module directory using Ninja's `/` separator
pub fn join_ninja(dir: &Path, rel: &str) -> String {
    let dir = dir.to_string_lossy();
    if dir.is_empty() || dir == "." || Path::new(rel).is_absolute() {
        rel.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), rel)
    }
}
