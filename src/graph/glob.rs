// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegen contributors

//! Glob bookkeeping
//!
//! Every glob expanded while preparing build actions is recorded so the
//! generated graph can re-run it and regenerate when its result changes.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Component, Path};

use super::ninja::{BuildActions, BuildDef, Rule};

pub const GLOB_RULE: &str = "g.bootstrap.glob";

/// One recorded glob and its current result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobEntry {
    /// Pattern relative to the source root
    pub pattern: String,
    /// Matching files relative to the source root, sorted
    pub files: Vec<String>,
    /// Deepest directory of the pattern without wildcards
    pub base_dir: String,
}

impl GlobEntry {
    /// Name of the file that records this glob's result
    pub fn list_file_name(&self) -> String {
        format!("{}.glob", blake3::hash(self.pattern.as_bytes()).to_hex())
    }
}

/// Registry of globs, keyed by pattern
#[derive(Debug, Default)]
pub struct GlobRegistry {
    entries: Vec<GlobEntry>,
    index: HashMap<String, usize>,
}

impl GlobRegistry {
    /// Expand `pattern` (relative to `src_dir`) and record the result
    pub fn glob(
        &mut self,
        src_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<String>, glob::PatternError> {
        if let Some(&idx) = self.index.get(pattern) {
            return Ok(self.entries[idx].files.clone());
        }

        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            src_dir.join(pattern).to_string_lossy().to_string()
        };

        let mut files: Vec<String> = glob::glob(&full_pattern)?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| match p.strip_prefix(src_dir) {
                Ok(rel) => rel.to_string_lossy().to_string(),
                Err(_) => p.to_string_lossy().to_string(),
            })
            .collect();
        files.sort();

        self.index.insert(pattern.to_string(), self.entries.len());
        self.entries.push(GlobEntry {
            pattern: pattern.to_string(),
            files: files.clone(),
            base_dir: literal_base(pattern),
        });

        Ok(files)
    }

    pub fn entries(&self) -> &[GlobEntry] {
        &self.entries
    }
}

/// Whether `pattern` contains glob metacharacters
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn literal_base(pattern: &str) -> String {
    let mut base = Vec::new();
    for component in Path::new(pattern).components() {
        let part = component.as_os_str().to_string_lossy();
        if is_glob(&part) {
            break;
        }
        if !matches!(component, Component::CurDir | Component::RootDir) {
            base.push(part.to_string());
        }
    }

    let joined = base.join("/");
    if pattern.starts_with('/') && !joined.starts_with('/') {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Add one glob-watch build per glob, writing result lists into `glob_list_dir`
pub fn add_glob_actions(actions: &mut BuildActions, glob_list_dir: &str, globs: &[GlobEntry]) {
    if globs.is_empty() {
        return;
    }

    actions.add_rule(Rule {
        restat: true,
        ..Rule::new(
            GLOB_RULE,
            "(ls -1d $pattern 2>/dev/null || true) > $out.tmp && \
             (cmp -s $out.tmp $out || mv -f $out.tmp $out)",
        )
        .description("glob $pattern")
    });

    for entry in globs {
        let list_file = format!(
            "{}/{}",
            glob_list_dir.trim_end_matches('/'),
            entry.list_file_name()
        );
        actions.add_build(
            BuildDef {
                implicits: vec![entry.base_dir.clone()],
                ..BuildDef::new(GLOB_RULE, vec![list_file])
            }
            .arg("pattern", entry.pattern.clone()),
        );
    }
}

/// Write the glob-watch graph as a standalone Ninja file
pub fn write_globs_ninja_file(
    glob_list_dir: &str,
    globs: &[GlobEntry],
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut actions = BuildActions::default();
    add_glob_actions(&mut actions, glob_list_dir, globs);
    actions.write(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_glob_records_sorted_relative_matches() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lib/sub")).unwrap();
        fs::write(temp.path().join("lib/b.rs"), "").unwrap();
        fs::write(temp.path().join("lib/a.rs"), "").unwrap();
        fs::write(temp.path().join("lib/notes.txt"), "").unwrap();

        let mut registry = GlobRegistry::default();
        let files = registry.glob(temp.path(), "lib/*.rs").unwrap();

        assert_eq!(files, vec!["lib/a.rs", "lib/b.rs"]);
        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.entries()[0].base_dir, "lib");
    }

    #[test]
    fn test_repeated_pattern_is_recorded_once() {
        let temp = TempDir::new().unwrap();
        let mut registry = GlobRegistry::default();

        registry.glob(temp.path(), "*.rs").unwrap();
        registry.glob(temp.path(), "*.rs").unwrap();

        assert_eq!(registry.entries().len(), 1);
        assert_eq!(registry.entries()[0].base_dir, ".");
    }

    #[test]
    fn test_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let mut registry = GlobRegistry::default();

        assert!(registry.glob(temp.path(), "lib/[*.rs").is_err());
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("src/*.rs"));
        assert!(is_glob("src/?.rs"));
        assert!(!is_glob("src/main.rs"));
    }

    #[test]
    fn test_globs_ninja_file() {
        let entry = GlobEntry {
            pattern: "lib/*.rs".into(),
            files: vec!["lib/a.rs".into()],
            base_dir: "lib".into(),
        };

        let mut out = Vec::new();
        write_globs_ninja_file("out/globs", &[entry.clone()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let expected = format!(
            "build out/globs/{}: {} | lib\n    pattern = lib/*.rs\n",
            entry.list_file_name(),
            GLOB_RULE
        );
        assert!(text.contains(&expected));
        assert!(text.contains("restat = true"));
    }
}
