use anyhow::Context;
use log::debug;
use regex::Regex;
use std::path::Path;

/// Compiled exclusion patterns plus the accepted extension set.
#[derive(Debug, Clone)]
pub struct PathFilter {
    exclude: Vec<Regex>,
    extensions: Vec<String>,
}

impl PathFilter {
    pub fn new(exclude_patterns: &[String], extensions: &[String]) -> anyhow::Result<Self> {
        let exclude = compile_patterns(exclude_patterns)
            .context("Invalid exclude pattern")?;
        debug!(
            "Path filter ready: {} exclude patterns, extensions {:?}",
            exclude.len(),
            extensions
        );
        Ok(Self {
            exclude,
            extensions: extensions.to_vec(),
        })
    }

    pub fn should_skip(&self, relative_path: &str) -> bool {
        should_skip(relative_path, &self.exclude)
    }

    /// Directories are tested both as their bare path and with a trailing
    /// slash, so `^dist$` and `node_modules/` both prune them.
    pub fn should_skip_dir(&self, relative_path: &str) -> bool {
        let bare = relative_path.trim_end_matches('/');
        if bare.is_empty() {
            return false;
        }
        self.should_skip(bare) || self.should_skip(&format!("{}/", bare))
    }

    pub fn is_accepted_extension(&self, path: &str) -> bool {
        is_accepted_extension(path, &self.extensions)
    }

    pub fn accepts_file(&self, relative_path: &str) -> bool {
        self.is_accepted_extension(relative_path) && !self.should_skip(relative_path)
    }
}

pub fn compile_patterns(patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("could not compile pattern `{}`", p)))
        .collect()
}

pub fn should_skip(relative_path: &str, exclude_patterns: &[Regex]) -> bool {
    exclude_patterns.iter().any(|re| re.is_match(relative_path))
}

/// Case-sensitive match of the extension, leading dot included.
pub fn is_accepted_extension(path: &str, extensions: &[String]) -> bool {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let dotted = format!(".{}", ext);
            extensions.iter().any(|accepted| *accepted == dotted)
        }
        None => false,
    }
}
