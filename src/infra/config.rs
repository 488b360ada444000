use crate::domain::models::{BaseLocation, CombineConfig};
use crate::infra::github::{is_remote_url, parse_repo_url};
use anyhow::Context;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".js", ".mjs", ".ts", ".jsx", ".tsx", ".py", ".rb", ".java", ".c", ".cpp", ".cs", ".php",
    ".go", ".rs", ".swift", ".kt", ".md",
];

pub const DEFAULT_EXCLUDES: &[&str] = &["node_modules/", "venv/", ".git/"];

/// One or more leading block comments, the first of which may mention a license.
pub const DEFAULT_LICENSE_HEADER: &str =
    r"(?i)^(/\*[\s\S]*?(\*/|(?:license|copyright|spdx|contrib)[\s\S]*?\*/)[\s*]*)+";

pub fn default_header_patterns() -> Vec<String> {
    vec![DEFAULT_LICENSE_HEADER.to_string()]
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Settings read from a JSON config file. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub base_dir: Option<String>,
    pub github_url: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub output: Option<String>,
    #[serde(alias = "licenseHeaders")]
    pub header_patterns: Option<Vec<String>>,
    pub github_token: Option<String>,
}

/// Values given explicitly on the command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub base_dir: Option<String>,
    pub github_url: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub output: Option<String>,
    pub github_token: Option<String>,
}

pub fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    debug!("Reading config file: {}", path.display());
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Error reading config file {}", path.display()))?;
    let config: ConfigFile = serde_json::from_str(&raw)
        .with_context(|| format!("Error parsing config file {}", path.display()))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Splits a comma separated flag value, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merges defaults, the config file and explicit flags, in rising precedence.
pub fn resolve_config(
    file: ConfigFile,
    overrides: ConfigOverrides,
    cwd: &Path,
) -> anyhow::Result<CombineConfig> {
    let github_url = overrides.github_url.or(file.github_url);
    let base_dir = overrides.base_dir.or(file.base_dir);

    let base = match github_url {
        Some(url) => BaseLocation::Remote(
            parse_repo_url(&url).with_context(|| format!("Cannot use base location {}", url))?,
        ),
        None => match base_dir {
            Some(dir) if is_remote_url(&dir) => BaseLocation::Remote(
                parse_repo_url(&dir).with_context(|| format!("Cannot use base location {}", dir))?,
            ),
            Some(dir) => BaseLocation::Local(absolute(cwd, Path::new(&dir))),
            None => BaseLocation::Local(cwd.to_path_buf()),
        },
    };

    let output = overrides
        .output
        .or(file.output)
        .map(|o| {
            if o == "-" {
                o
            } else {
                absolute(cwd, Path::new(&o)).display().to_string()
            }
        })
        .unwrap_or_else(|| {
            cwd.join(format!("combined_{}.txt", base_name(&base)))
                .display()
                .to_string()
        });

    let github_token = overrides.github_token.or(file.github_token);
    if base.is_remote() && github_token.is_none() {
        warn!("No GitHub token provided. API rate limits may apply.");
    }

    let config = CombineConfig {
        base,
        include_paths: overrides.include.or(file.include).unwrap_or_default(),
        exclude_patterns: overrides
            .exclude
            .or(file.exclude)
            .unwrap_or_else(|| to_strings(DEFAULT_EXCLUDES)),
        extensions: overrides
            .extensions
            .or(file.extensions)
            .unwrap_or_else(|| to_strings(DEFAULT_EXTENSIONS)),
        header_patterns: file.header_patterns.unwrap_or_else(default_header_patterns),
        output,
        github_token,
    };
    debug!("Resolved configuration: {:?}", redacted(&config));
    Ok(config)
}

fn redacted(config: &CombineConfig) -> CombineConfig {
    CombineConfig {
        github_token: config.github_token.as_ref().map(|_| "***".to_string()),
        ..config.clone()
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn base_name(base: &BaseLocation) -> String {
    let name = match base {
        BaseLocation::Local(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        BaseLocation::Remote(location) => location
            .path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(&location.repo)
            .to_string(),
    };
    if name.is_empty() { "output".to_string() } else { name }
}
