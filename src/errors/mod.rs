// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Error types for the regeneration driver
//!
//! Two layers: [`GraphError`] is what the dependency-graph engine reports for
//! a single problem in the build descriptions, and [`DriverError`] is the
//! single error surface of a driver run. Graph errors always travel in
//! batches so that one run can show every mistake at once.

mod fatal;

pub use fatal::{fatal, write_report};

use miette::Diagnostic;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// A single problem found by the dependency-graph engine
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum GraphError {
    /// The build description itself is malformed
    #[error("{path}: {message}")]
    #[diagnostic(code(stagegen::blueprint))]
    Blueprint { path: PathBuf, message: String },

    /// A module is malformed or inconsistent with the rest of the graph
    #[error("{path}: module \"{module}\": {message}")]
    #[diagnostic(code(stagegen::module))]
    Module {
        path: PathBuf,
        module: String,
        message: String,
    },

    /// A declared module property has an invalid value
    #[error("{path}: module \"{module}\": property \"{property}\": {message}")]
    #[diagnostic(code(stagegen::property))]
    Property {
        path: PathBuf,
        module: String,
        property: String,
        message: String,
    },

    /// The engine itself failed
    #[error("{message}")]
    #[diagnostic(code(stagegen::internal))]
    Internal { message: String },
}

impl GraphError {
    /// Whether the error is caused by the user's input rather than the tool
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Diagnostic capture sessions that write to a caller-specified file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Cpu,
    Memory,
    Trace,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpuprofile"),
            Self::Memory => write!(f, "memprofile"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Main error type for a driver run
#[derive(Error, Debug, Diagnostic)]
pub enum DriverError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("-l <moduleListFile> is required and must be nonempty")]
    #[diagnostic(
        code(stagegen::missing_module_list),
        help("Pass the file listing every build description with '-l <file>'")
    )]
    MissingModuleList,

    #[error("could not enumerate files: {source}")]
    #[diagnostic(code(stagegen::enumerate_files))]
    EnumerateFiles {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid invocation list '{path}': {message}")]
    #[diagnostic(
        code(stagegen::invalid_invocations),
        help("Expected a JSON array of {{\"inputs\", \"outputs\", \"args\"}} objects")
    )]
    InvalidInvocations { path: PathBuf, message: String },

    #[error("failed to change to directory '{path}': {source}")]
    #[diagnostic(code(stagegen::change_directory))]
    ChangeDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{} error(s) while {phase}", .errors.len())]
    #[diagnostic(code(stagegen::graph))]
    Graph {
        phase: &'static str,
        errors: Vec<GraphError>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Profiling Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("error opening {kind}: {source}")]
    #[diagnostic(code(stagegen::open_profile))]
    OpenProfile {
        kind: ProfileKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing {kind}: {source}")]
    #[diagnostic(code(stagegen::write_profile))]
    WriteProfile {
        kind: ProfileKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Output Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("error writing empty Ninja file: {source}")]
    #[diagnostic(code(stagegen::empty_ninja_file))]
    EmptyNinjaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error opening Ninja file: {source}")]
    #[diagnostic(code(stagegen::open_ninja_file))]
    OpenNinjaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing Ninja file contents: {source}")]
    #[diagnostic(code(stagegen::write_ninja_file))]
    WriteNinjaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error flushing Ninja file contents: {source}")]
    #[diagnostic(code(stagegen::flush_ninja_file))]
    FlushNinjaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error closing Ninja file: {source}")]
    #[diagnostic(code(stagegen::close_ninja_file))]
    CloseNinjaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing glob Ninja file: {source}")]
    #[diagnostic(code(stagegen::glob_file))]
    GlobFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error writing dependency file '{path}': {source}")]
    #[diagnostic(code(stagegen::dep_file))]
    DepFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error removing abandoned files: {source}")]
    #[diagnostic(
        code(stagegen::remove_abandoned),
        help("Nothing is deleted when the failure happens while scanning the build directory")
    )]
    RemoveAbandoned {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DriverError {
    /// Wrap a batch of engine errors reported by one pipeline phase
    pub fn graph(phase: &'static str, errors: Vec<GraphError>) -> Self {
        Self::Graph { phase, errors }
    }
}
