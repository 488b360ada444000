use std::collections::HashMap;
use std::path::PathBuf;

/// One processed file: its normalized section plus the numbers the
/// statistics report needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    pub tokens: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderTally {
    pub name: String,
    pub total_size: u64,
    pub total_tokens: usize,
}

/// Per root folder totals, kept in first-seen order.
#[derive(Debug, Default)]
pub struct FolderTallies {
    tallies: Vec<FolderTally>,
    index: HashMap<String, usize>,
}

impl FolderTallies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a record into the tally of its first path segment.
    pub fn add(&mut self, path: &str, size: u64, tokens: usize) {
        let root = root_folder(path);
        let idx = match self.index.get(root) {
            Some(&idx) => idx,
            None => {
                self.tallies.push(FolderTally {
                    name: root.to_string(),
                    total_size: 0,
                    total_tokens: 0,
                });
                self.index.insert(root.to_string(), self.tallies.len() - 1);
                self.tallies.len() - 1
            }
        };
        let tally = &mut self.tallies[idx];
        tally.total_size += size;
        tally.total_tokens += tokens;
    }

    pub fn get(&self, name: &str) -> Option<&FolderTally> {
        self.index.get(name).map(|&idx| &self.tallies[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FolderTally> {
        self.tallies.iter()
    }
}

pub fn root_folder(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// Where the files come from.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseLocation {
    Local(PathBuf),
    Remote(RepoLocation),
}

impl BaseLocation {
    pub fn is_remote(&self) -> bool {
        matches!(self, BaseLocation::Remote(_))
    }

    pub fn display_name(&self) -> String {
        match self {
            BaseLocation::Local(path) => path.display().to_string(),
            BaseLocation::Remote(location) => location.to_url(),
        }
    }
}

/// A parsed `https://github.com/<owner>/<repo>[/tree/<branch>][/<path>]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub path: String,
}

impl RepoLocation {
    pub fn with_branch(&self, branch: &str) -> Self {
        Self {
            branch: Some(branch.to_string()),
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: &str) -> Self {
        Self {
            path: path.trim_matches('/').to_string(),
            ..self.clone()
        }
    }

    /// Appends a relative path to this location's subpath.
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_matches('/');
        if self.path.is_empty() {
            self.with_path(relative)
        } else if relative.is_empty() {
            self.clone()
        } else {
            self.with_path(&format!("{}/{}", self.path, relative))
        }
    }

    pub fn to_url(&self) -> String {
        let mut url = format!("https://github.com/{}/{}", self.owner, self.repo);
        if let Some(branch) = &self.branch {
            url.push_str("/tree/");
            url.push_str(branch);
        }
        if !self.path.is_empty() {
            if self.branch.is_none() {
                url.push_str("/tree/HEAD");
            }
            url.push('/');
            url.push_str(&self.path);
        }
        url
    }
}

/// A fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct CombineConfig {
    pub base: BaseLocation,
    pub include_paths: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub extensions: Vec<String>,
    pub header_patterns: Vec<String>,
    pub output: String,
    pub github_token: Option<String>,
}

/// A file downloaded from a remote repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
    pub size: u64,
}

#[derive(Debug)]
pub struct CombineOutput {
    pub document: String,
    pub records: Vec<FileRecord>,
    pub folders: FolderTallies,
}

impl CombineOutput {
    pub fn total_tokens(&self) -> usize {
        self.records.iter().map(|r| r.tokens).sum()
    }
}
