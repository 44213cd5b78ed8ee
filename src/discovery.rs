// src/discovery.rs
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{QtraceError, Result};

const PRUNE: &[&str] = &[
    ".git",
    ".hg",
    ".tox",
    ".venv",
    "venv",
    "__pycache__",
    "node_modules",
    "site-packages",
    "target",
];

static PY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pyw?$").unwrap_or_else(|_| panic!("Invalid Regex")));

fn should_prune(name: &str) -> bool {
    PRUNE.contains(&name)
}

#[must_use]
pub fn is_python(path: &Path) -> bool {
    path.file_name()
        .and_then(|f| f.to_str())
        .is_some_and(|f| PY_RE.is_match(f))
}

/// Python files under `root`, sorted. A file path is returned as-is even
/// without a `.py` extension.
///
/// # Errors
/// Returns `Io` if `root` does not exist.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| QtraceError::io(e, root))?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_prune(&e.file_name().to_string_lossy()));

    let mut paths = Vec::new();
    let mut errors = 0usize;
    for item in walker {
        match item {
            Ok(entry) if entry.file_type().is_file() && is_python(entry.path()) => {
                paths.push(entry.into_path());
            }
            Ok(_) => {}
            Err(_) => errors += 1,
        }
    }
    if errors > 0 {
        tracing::warn!(errors, "entries skipped during file walk");
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_python_and_prunes_caches() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("pkg"))?;
        fs::create_dir_all(root.join("__pycache__"))?;
        fs::write(root.join("pkg/b.py"), "x = 1\n")?;
        fs::write(root.join("a.py"), "x = 1\n")?;
        fs::write(root.join("notes.txt"), "x = 1\n")?;
        fs::write(root.join("__pycache__/a.py"), "x = 1\n")?;

        let found = discover(root)?;
        let names: Vec<PathBuf> = found
            .iter()
            .filter_map(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.py"), PathBuf::from("pkg/b.py")]);
        Ok(())
    }

    #[test]
    fn single_file_and_missing_root() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("script");
        fs::write(&file, "print(1)\n")?;
        assert_eq!(discover(&file)?, vec![file.clone()]);
        assert!(matches!(
            discover(&dir.path().join("nope")),
            Err(QtraceError::Io { .. })
        ));
        Ok(())
    }
}
