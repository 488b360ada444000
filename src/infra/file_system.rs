use crate::core::filters::PathFilter;
use log::{debug, info, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Relative path of `path` under `base`, always `/` separated.
pub fn relative_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lexically cleans a user supplied path: drops `.`, folds `name/..` pairs
/// and keeps leading `..` and the root. Always `/` separated.
pub fn normalize_lexically(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().into_owned(),
            Component::RootDir => prefix.push('/'),
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                _ if !prefix.is_empty() => {}
                _ => parts.push("..".to_string()),
            },
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    format!("{}{}", prefix, parts.join("/"))
}

fn join_relative(prefix: &str, rel: &str) -> String {
    match (prefix.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix.trim_end_matches('/'), rel),
    }
}

/// A file found by the walker: where to read it and the path it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundFile {
    pub path: PathBuf,
    pub relative: String,
}

/// Lists files under `root` in depth-first, name-sorted order.
///
/// Reported paths are `prefix` joined with the path below `root`, and the
/// filter sees those reported paths. Sub-directories are pruned when the
/// filter skips them, files must pass both the extension and exclude checks.
/// `root` itself is never tested against the exclude patterns, which is what
/// lets an explicit include path name an otherwise excluded directory.
/// Symlinks are followed; loops are reported and skipped.
pub fn list_files(root: &Path, prefix: &str, filter: &PathFilter) -> Vec<FoundFile> {
    info!("Listing files in: {}", root.display());

    let keep = |entry: &DirEntry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let rel = join_relative(prefix, &relative_path(entry.path(), root));
        let skipped = filter.should_skip_dir(&rel);
        if skipped {
            debug!("Skipping excluded directory: {}", rel);
        }
        !skipped
    };

    let mut result = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let rel = join_relative(prefix, &relative_path(entry.path(), root));
        if filter.accepts_file(&rel) {
            debug!("Found matching file: {}", rel);
            result.push(FoundFile {
                path: entry.into_path(),
                relative: rel,
            });
        }
    }

    info!("Found {} matching files", result.len());
    result
}

/// Reads a file as text, replacing invalid UTF-8, and returns it with its size.
pub fn read_file_contents(path: &Path) -> anyhow::Result<(String, u64)> {
    debug!("Reading file contents: {}", path.display());
    let size = fs::metadata(path)?.len();
    let bytes = fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes).into_owned();
    debug!("Read {} bytes from file", bytes.len());
    Ok((contents, size))
}
