// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Abandoned output cleanup
//!
//! Files under the build directory that the current graph no longer declares
//! are left over from earlier runs. The whole tree is scanned before anything
//! is deleted, so a scan failure leaves the build directory untouched.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::command::join_path;
use super::config::AbandonedPolicy;
use crate::errors::{DriverError, DriverResult};

/// Lexically normalize `path`, dropping `.` and folding `..`
///
/// A path that normalizes to nothing is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Whether the clean path `path` lies under the clean directory `dir`
fn is_within(path: &Path, dir: &Path) -> bool {
    if dir == Path::new(".") {
        path.is_relative() && !path.starts_with("..")
    } else {
        path.starts_with(dir)
    }
}

fn is_ninja_bookkeeping(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(".ninja_"))
        .unwrap_or(false)
}

fn walk_error(root: &Path, err: walkdir::Error) -> DriverError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    DriverError::RemoveAbandoned { path, source }
}

/// Delete every regular file under the build directory that is not a target
///
/// Targets and policy directories are relative to `src_dir` unless absolute.
/// Returns the number of files removed.
pub fn remove_abandoned_files<S: AsRef<Path>>(
    src_dir: &Path,
    build_dir: &Path,
    targets: impl IntoIterator<Item = S>,
    policy: &AbandonedPolicy,
) -> DriverResult<usize> {
    let build_root = clean_path(&join_path(src_dir, build_dir));
    let resolve = |p: &Path| clean_path(&join_path(src_dir, p));

    let targets: HashSet<PathBuf> = targets.into_iter().map(|t| resolve(t.as_ref())).collect();

    let within_build_root = |dir: PathBuf| {
        if is_within(&dir, &build_root) {
            Some(dir)
        } else {
            warn!(dir = %dir.display(), "Ignoring directory outside the build directory");
            None
        }
    };

    let roots: Vec<PathBuf> = if policy.under.is_empty() {
        vec![build_root.clone()]
    } else {
        policy
            .under
            .iter()
            .filter_map(|d| within_build_root(resolve(d)))
            .collect()
    };
    let except: Vec<PathBuf> = policy
        .except
        .iter()
        .filter_map(|d| within_build_root(resolve(d)))
        .collect();

    let mut abandoned = Vec::new();
    for root in &roots {
        if !root.exists() {
            continue;
        }

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                let path = clean_path(e.path());
                !except.iter().any(|x| is_within(&path, x))
            });

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            if !entry.file_type().is_file() || is_ninja_bookkeeping(entry.path()) {
                continue;
            }
            let path = clean_path(entry.path());
            if !targets.contains(&path) {
                abandoned.push(path);
            }
        }
    }

    for path in &abandoned {
        fs::remove_file(path).map_err(|source| DriverError::RemoveAbandoned {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Removed abandoned file");
    }

    info!(count = abandoned.len(), "Removed abandoned files");
    Ok(abandoned.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_only_undeclared_files_outside_exceptions_are_removed() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "out/bin/a");
        touch(src, "out/obj/b.o");
        touch(src, "out/keep/c");

        let policy = AbandonedPolicy {
            under: vec![],
            except: vec!["out/keep".into()],
        };
        let removed =
            remove_abandoned_files(src, Path::new("out"), ["out/bin/a"], &policy).unwrap();

        assert_eq!(removed, 1);
        assert!(src.join("out/bin/a").exists());
        assert!(!src.join("out/obj/b.o").exists());
        assert!(src.join("out/keep/c").exists());
        assert!(src.join("out/obj").is_dir());
    }

    #[test]
    fn test_under_limits_the_scan() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "out/gen/stale");
        touch(src, "out/other/stale");

        let policy = AbandonedPolicy {
            under: vec!["out/gen".into()],
            except: vec![],
        };
        remove_abandoned_files(src, Path::new("out"), Vec::<String>::new(), &policy).unwrap();

        assert!(!src.join("out/gen/stale").exists());
        assert!(src.join("out/other/stale").exists());
    }

    #[test]
    fn test_never_leaves_the_build_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "src/main.rs");
        touch(src, "out/stale");

        let policy = AbandonedPolicy {
            under: vec!["src".into()],
            except: vec![],
        };
        let removed =
            remove_abandoned_files(src, Path::new("out"), Vec::<String>::new(), &policy).unwrap();

        assert_eq!(removed, 0);
        assert!(src.join("src/main.rs").exists());
        assert!(src.join("out/stale").exists());
    }

    #[test]
    fn test_ninja_bookkeeping_is_kept() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "out/.ninja_log");
        touch(src, "out/.ninja_deps");

        remove_abandoned_files(
            src,
            Path::new("out"),
            Vec::<String>::new(),
            &AbandonedPolicy::default(),
        )
        .unwrap();

        assert!(src.join("out/.ninja_log").exists());
        assert!(src.join("out/.ninja_deps").exists());
    }

    #[test]
    fn test_targets_are_normalized() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "out/bin/tool");

        let removed = remove_abandoned_files(
            src,
            Path::new("./out"),
            ["./out/lib/../bin/tool"],
            &AbandonedPolicy::default(),
        )
        .unwrap();

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_missing_build_directory() {
        let temp = TempDir::new().unwrap();

        let removed = remove_abandoned_files(
            temp.path(),
            Path::new("out"),
            Vec::<String>::new(),
            &AbandonedPolicy::default(),
        )
        .unwrap();

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_relative_build_root_in_working_directory() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "gen/stale");
        touch(temp.path(), "gen/keep/notes");
        touch(temp.path(), "kept");

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();
        let policy = AbandonedPolicy {
            under: vec![],
            except: vec!["gen/keep".into()],
        };
        let result = remove_abandoned_files(Path::new("."), Path::new("."), ["kept"], &policy);
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(result.unwrap(), 1);
        assert!(!temp.path().join("gen/stale").exists());
        assert!(temp.path().join("gen/keep/notes").exists());
        assert!(temp.path().join("kept").exists());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("./a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean_path(Path::new(".")), PathBuf::from("."));
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_current_directory_contains_relative_paths() {
        assert!(is_within(Path::new("gen/stale"), Path::new(".")));
        assert!(is_within(Path::new("."), Path::new(".")));
        assert!(!is_within(Path::new("../src"), Path::new(".")));
        assert!(!is_within(Path::new("/tmp/src"), Path::new(".")));
        assert!(is_within(Path::new("out/gen"), Path::new("out")));
    }
}
