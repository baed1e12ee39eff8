// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Makefile-style dependency file for the generated build file

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::{DriverError, DriverResult};

fn escape(path: &Path) -> String {
    let mut out = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            ' ' => out.push_str("\\ "),
            '#' => out.push_str("\\#"),
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out
}

/// Render `target: deps...` with one dependency per continuation line
pub fn write_depfile_to(out: &mut dyn Write, target: &Path, deps: &[PathBuf]) -> io::Result<()> {
    write!(out, "{}:", escape(target))?;
    for dep in deps {
        write!(out, " \\\n {}", escape(dep))?;
    }
    writeln!(out)
}

/// Write the dependency file at `path`
pub fn write_depfile(path: &Path, target: &Path, deps: &[PathBuf]) -> DriverResult<()> {
    let dep_error = |source| DriverError::DepFile {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(dep_error)?);
    write_depfile_to(&mut out, target, deps)
        .and_then(|_| out.flush())
        .map_err(dep_error)
}
