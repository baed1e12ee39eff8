// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Output emission
//!
//! Decides whether the generated build file gets real content, an empty
//! placeholder, or both, and writes it open → write → flush → close with a
//! distinct error for every step.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::args::Args;
use super::command::join_path;
use super::config::Stage;
use crate::errors::{DriverError, DriverResult};
use crate::graph::glob::write_globs_ninja_file;
use crate::graph::BuildEngine;

/// Mode of generated files, before the umask
pub const OUT_FILE_PERMISSIONS: u32 = 0o666;

const BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Whether this run writes the full build graph
///
/// Only the main stage with the empty-file toggle defers generation; the
/// placeholder stands in until the regenerated builder runs again.
pub fn needs_full_generation(stage: Stage, empty_ninja_file: bool) -> bool {
    stage != Stage::Main || !empty_ninja_file
}

fn output_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(OUT_FILE_PERMISSIONS);
    }
    options
}

/// Where the serialized build graph goes
enum Sink {
    File(BufWriter<File>),
    Discard(io::Sink),
}

/// The declared build-file output, open for one write
pub struct NinjaOutput {
    path: PathBuf,
    sink: Sink,
}

impl NinjaOutput {
    /// Create-or-truncate `path`, or discard everything when `full` is false
    pub fn open(path: &Path, full: bool) -> DriverResult<Self> {
        let sink = if full {
            let file = output_options()
                .open(path)
                .map_err(|source| DriverError::OpenNinjaFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            Sink::File(BufWriter::with_capacity(BUFFER_SIZE, file))
        } else {
            Sink::Discard(io::sink())
        };

        Ok(Self {
            path: path.to_path_buf(),
            sink,
        })
    }

    pub fn is_discarding(&self) -> bool {
        matches!(self.sink, Sink::Discard(_))
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        match self.sink {
            Sink::File(ref mut buf) => buf as &mut dyn Write,
            Sink::Discard(ref mut sink) => sink as &mut dyn Write,
        }
    }

    /// Flush the buffer, then close the file
    pub fn finish(self) -> DriverResult<()> {
        let Sink::File(mut buf) = self.sink else {
            return Ok(());
        };

        buf.flush().map_err(|source| DriverError::FlushNinjaFile {
            path: self.path.clone(),
            source,
        })?;

        let file = buf
            .into_inner()
            .map_err(|e| DriverError::FlushNinjaFile {
                path: self.path.clone(),
                source: e.into_error(),
            })?;

        file.sync_all().map_err(|source| DriverError::CloseNinjaFile {
            path: self.path.clone(),
            source,
        })
    }
}

/// Write a zero-length placeholder at `path`
pub fn write_empty_ninja_file(path: &Path) -> DriverResult<()> {
    output_options()
        .open(path)
        .map(drop)
        .map_err(|source| DriverError::EmptyNinjaFile {
            path: path.to_path_buf(),
            source,
        })
}

fn write_glob_file<E: BuildEngine + ?Sized>(
    engine: &E,
    path: &Path,
    glob_list_dir: &str,
) -> DriverResult<()> {
    let glob_error = |source| DriverError::GlobFile {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(glob_error)?);
    write_globs_ninja_file(glob_list_dir, &engine.globs(), &mut out)
        .and_then(|_| out.flush())
        .map_err(glob_error)
}

/// Emit the build file (and the glob file, when configured)
///
/// Returns the resolved output path.
pub fn emit_ninja_file<E: BuildEngine + ?Sized>(
    engine: &E,
    args: &Args,
    stage: Stage,
) -> DriverResult<PathBuf> {
    let out_path = join_path(engine.src_dir(), &args.out_file);

    if args.empty_ninja_file {
        write_empty_ninja_file(&out_path)?;
        debug!(path = %out_path.display(), "Wrote empty Ninja file");
    }

    let full = needs_full_generation(stage, args.empty_ninja_file);
    let mut output = NinjaOutput::open(&out_path, full)?;

    if let Some(ref glob_file) = args.glob_file {
        let glob_path = join_path(engine.src_dir(), glob_file);
        write_glob_file(engine, &glob_path, &args.glob_list_dir)?;
        debug!(path = %glob_path.display(), "Wrote glob Ninja file");
    }

    engine
        .write_build_file(output.writer())
        .map_err(|source| DriverError::WriteNinjaFile {
            path: out_path.clone(),
            source,
        })?;

    if output.is_discarding() {
        info!(path = %out_path.display(), %stage, "Deferred Ninja file generation");
    } else {
        info!(path = %out_path.display(), %stage, "Wrote Ninja file");
    }
    output.finish()?;

    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::RecordingEngine;
    use crate::graph::GlobEntry;
    use std::fs;
    use tempfile::TempDir;

    fn args(empty: bool) -> Args {
        Args {
            out_file: "build.ninja".into(),
            empty_ninja_file: empty,
            ..Args::default()
        }
    }

    #[test]
    fn test_generation_decision() {
        assert!(needs_full_generation(Stage::Main, false));
        assert!(!needs_full_generation(Stage::Main, true));
        assert!(needs_full_generation(Stage::Primary, false));
        assert!(needs_full_generation(Stage::Primary, true));
    }

    #[test]
    fn test_main_stage_with_empty_file_defers() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::new(temp.path());

        let path = emit_ninja_file(&engine, &args(true), Stage::Main).unwrap();

        assert_eq!(path, temp.path().join("build.ninja"));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_main_stage_with_existing_output_truncates_to_placeholder() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("build.ninja"), "stale").unwrap();
        let engine = RecordingEngine::new(temp.path());

        emit_ninja_file(&engine, &args(true), Stage::Main).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("build.ninja")).unwrap(), "");
    }

    #[test]
    fn test_primary_stage_overwrites_placeholder() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::new(temp.path());

        let path = emit_ninja_file(&engine, &args(true), Stage::Primary).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "# generated\n");
    }

    #[test]
    fn test_main_stage_without_toggle_writes_content() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::new(temp.path());

        let path = emit_ninja_file(&engine, &args(false), Stage::Main).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "# generated\n");
    }

    #[test]
    fn test_glob_file_written_even_when_deferred() {
        let temp = TempDir::new().unwrap();
        let mut engine = RecordingEngine::new(temp.path());
        engine.globs = vec![GlobEntry {
            pattern: "lib/*.rs".into(),
            files: vec![],
            base_dir: "lib".into(),
        }];
        let args = Args {
            glob_file: Some("globs.ninja".into()),
            glob_list_dir: "out/globs".into(),
            ..args(true)
        };

        emit_ninja_file(&engine, &args, Stage::Main).unwrap();

        let globs = fs::read_to_string(temp.path().join("globs.ninja")).unwrap();
        assert!(globs.contains("pattern = lib/*.rs"));
    }

    #[test]
    fn test_open_error() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::new(temp.path());
        let args = Args {
            out_file: "missing/build.ninja".into(),
            ..Args::default()
        };

        let err = emit_ninja_file(&engine, &args, Stage::Main).unwrap_err();

        assert!(matches!(err, DriverError::OpenNinjaFile { .. }));
    }

    #[test]
    fn test_empty_file_error() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::new(temp.path());
        let args = Args {
            out_file: "missing/build.ninja".into(),
            empty_ninja_file: true,
            ..Args::default()
        };

        let err = emit_ninja_file(&engine, &args, Stage::Main).unwrap_err();

        assert!(err.to_string().starts_with("error writing empty Ninja file"));
    }

    #[test]
    fn test_write_error() {
        let temp = TempDir::new().unwrap();
        let mut engine = RecordingEngine::new(temp.path());
        engine.write_error = true;

        let err = emit_ninja_file(&engine, &args(false), Stage::Main).unwrap_err();

        assert_eq!(err.to_string(), "error writing Ninja file contents: serializer failed");
    }

    #[test]
    fn test_discard_sink_accepts_writes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("never.ninja");

        let mut output = NinjaOutput::open(&path, false).unwrap();
        output.writer().write_all(b"ignored").unwrap();
        output.finish().unwrap();

        assert!(!path.exists());
    }
}
