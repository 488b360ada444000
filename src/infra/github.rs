use crate::core::filters::PathFilter;
use crate::domain::models::{RemoteFile, RepoLocation};
use log::{debug, info, warn};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::sync::LazyLock;

const API_BASE: &str = "https://api.github.com";

static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+?)(?:\.git)?(?:/tree/([^/]+))?(?:/(.*))?$")
        .expect("repository URL regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid GitHub URL: {0}")]
    InvalidUrl(String),
    #[error("repository, branch, or path not found: {0}")]
    NotFound(String),
    #[error("API rate limit exceeded or authentication required for {0}; try supplying a GitHub token")]
    RateLimited(String),
    #[error("request to {url} failed with status {status}")]
    Http { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

pub fn parse_repo_url(url: &str) -> Result<RepoLocation, RemoteError> {
    let caps = REPO_URL
        .captures(url.trim().trim_end_matches('/'))
        .ok_or_else(|| RemoteError::InvalidUrl(url.to_string()))?;

    Ok(RepoLocation {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
        branch: caps.get(3).map(|m| m.as_str().to_string()),
        path: caps
            .get(4)
            .map(|m| m.as_str().trim_matches('/').to_string())
            .unwrap_or_default(),
    })
}

pub fn is_remote_url(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One item of a contents listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// The contents API answers with an array for directories and an object for files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

/// Access to a hosted repository.
pub trait RepoClient {
    fn default_branch(&self, owner: &str, repo: &str) -> Result<String, RemoteError>;

    /// Lists `location.path` at `location.branch`.
    fn list_contents(&self, location: &RepoLocation) -> Result<Contents, RemoteError>;

    fn fetch_raw(&self, entry: &ContentEntry) -> Result<String, RemoteError>;
}

#[derive(Deserialize)]
struct RepoMetadata {
    default_branch: String,
}

pub struct GitHubClient {
    http: Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            token,
            api_base: API_BASE.to_string(),
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .http
            .get(url)
            .header(USER_AGENT, concat!("combine-code/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::blocking::Response, RemoteError> {
        debug!("GET {}", url);
        let response = self
            .get(url)
            .query(query)
            .send()
            .map_err(|source| RemoteError::Transport {
                url: url.to_string(),
                source,
            })?;
        check_status(url, response.status())?;
        Ok(response)
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), RemoteError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound(url.to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Err(RemoteError::RateLimited(url.to_string()))
        }
        s => Err(RemoteError::Http {
            url: url.to_string(),
            status: s.as_u16(),
        }),
    }
}

fn decode_error(url: &str, e: reqwest::Error) -> RemoteError {
    RemoteError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    }
}

impl RepoClient for GitHubClient {
    fn default_branch(&self, owner: &str, repo: &str) -> Result<String, RemoteError> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let metadata: RepoMetadata = self.send(&url, &[])?.json().map_err(|e| decode_error(&url, e))?;
        Ok(metadata.default_branch)
    }

    fn list_contents(&self, location: &RepoLocation) -> Result<Contents, RemoteError> {
        let mut url = format!(
            "{}/repos/{}/{}/contents",
            self.api_base, location.owner, location.repo
        );
        if !location.path.is_empty() {
            url.push('/');
            url.push_str(&location.path);
        }
        let query: Vec<(&str, &str)> = location
            .branch
            .as_deref()
            .map(|branch| vec![("ref", branch)])
            .unwrap_or_default();
        self.send(&url, &query)?.json().map_err(|e| decode_error(&url, e))
    }

    fn fetch_raw(&self, entry: &ContentEntry) -> Result<String, RemoteError> {
        let url = entry.download_url.as_deref().ok_or_else(|| RemoteError::Decode {
            url: entry.path.clone(),
            message: "entry has no download URL".to_string(),
        })?;
        self.send(url, &[])?.text().map_err(|e| decode_error(url, e))
    }
}

/// Walks a remote tree and downloads every accepted file.
///
/// Paths handed to the filter and returned in [`RemoteFile`] are relative to
/// `base_path`, the subpath of the URL the run started from.
pub struct RemoteFetcher<'a> {
    client: &'a dyn RepoClient,
    filter: &'a PathFilter,
    base_path: String,
}

impl<'a> RemoteFetcher<'a> {
    pub fn new(client: &'a dyn RepoClient, filter: &'a PathFilter) -> Self {
        Self {
            client,
            filter,
            base_path: String::new(),
        }
    }

    pub fn relative_to(mut self, base_path: &str) -> Self {
        self.base_path = base_path.trim_matches('/').to_string();
        self
    }

    fn relative<'p>(&self, path: &'p str) -> &'p str {
        if self.base_path.is_empty() {
            return path;
        }
        path.strip_prefix(self.base_path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    }

    /// Fills in the default branch when the location has none.
    pub fn resolve_branch(&self, location: &RepoLocation) -> Result<RepoLocation, RemoteError> {
        if location.branch.is_some() {
            return Ok(location.clone());
        }
        let branch = self.client.default_branch(&location.owner, &location.repo)?;
        info!("No branch specified. Using default branch: {}", branch);
        Ok(location.with_branch(&branch))
    }

    /// Lists and downloads everything under `location`.
    ///
    /// Failing to list the starting location is an error. Below it, a failed
    /// subfolder listing or file download is logged and skipped. With
    /// `explicit` set the starting location is an include path: it is not
    /// tested against the exclude patterns, and a single file there is taken
    /// regardless of extension.
    pub fn list_and_fetch(
        &self,
        location: &RepoLocation,
        explicit: bool,
    ) -> Result<Vec<RemoteFile>, RemoteError> {
        let location = self.resolve_branch(location)?;
        info!(
            "Processing GitHub repository: {}/{} (branch: {}, path: {})",
            location.owner,
            location.repo,
            location.branch.as_deref().unwrap_or_default(),
            if location.path.is_empty() { "root" } else { location.path.as_str() }
        );

        let mut files = Vec::new();
        let mut pending: Vec<ContentEntry> = match self.client.list_contents(&location)? {
            Contents::File(entry) => {
                if explicit || self.filter.accepts_file(self.relative(&entry.path)) {
                    self.fetch_into(&entry, &mut files);
                }
                return Ok(files);
            }
            Contents::Dir(entries) => entries,
        };
        pending.reverse();

        while let Some(entry) = pending.pop() {
            match entry.kind {
                EntryKind::File => {
                    if self.filter.accepts_file(self.relative(&entry.path)) {
                        self.fetch_into(&entry, &mut files);
                    }
                }
                EntryKind::Dir => {
                    if self.filter.should_skip_dir(self.relative(&entry.path)) {
                        debug!("Skipping excluded directory: {}", entry.path);
                        continue;
                    }
                    let sub = location.with_path(&entry.path);
                    match self.client.list_contents(&sub) {
                        Ok(Contents::Dir(children)) => pending.extend(children.into_iter().rev()),
                        Ok(Contents::File(child)) => pending.push(child),
                        Err(e) => warn!("Error processing subfolder {}: {}", entry.path, e),
                    }
                }
                EntryKind::Other => debug!("Ignoring {} (not a file or directory)", entry.path),
            }
        }

        Ok(files)
    }

    fn fetch_into(&self, entry: &ContentEntry, files: &mut Vec<RemoteFile>) {
        match self.client.fetch_raw(entry) {
            Ok(content) => {
                info!("Fetched: {}", entry.path);
                files.push(RemoteFile {
                    path: self.relative(&entry.path).to_string(),
                    content,
                    size: entry.size,
                });
            }
            Err(e) => warn!("Error fetching file content for {}: {}", entry.path, e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedClient, dir, file};
    use super::*;

    fn filter(exclude: &[&str], exts: &[&str]) -> PathFilter {
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        let exts: Vec<String> = exts.iter().map(|s| s.to_string()).collect();
        PathFilter::new(&exclude, &exts).unwrap()
    }

    #[test]
    fn test_parse_repo_url() {
        let loc = parse_repo_url("https://github.com/octo/demo").unwrap();
        assert_eq!(loc.owner, "octo");
        assert_eq!(loc.repo, "demo");
        assert_eq!(loc.branch, None);
        assert_eq!(loc.path, "");

        let loc = parse_repo_url("https://github.com/octo/demo/tree/dev/src/lib/").unwrap();
        assert_eq!(loc.branch.as_deref(), Some("dev"));
        assert_eq!(loc.path, "src/lib");

        let loc = parse_repo_url("https://github.com/octo/demo.git").unwrap();
        assert_eq!(loc.repo, "demo");
    }

    #[test]
    fn test_parse_repo_url_rejects_other_hosts() {
        assert!(matches!(
            parse_repo_url("https://gitlab.com/octo/demo"),
            Err(RemoteError::InvalidUrl(_))
        ));
        assert!(parse_repo_url("github.com/octo/demo").is_err());
        assert!(parse_repo_url("https://github.com/octo").is_err());
    }

    #[test]
    fn test_is_remote_url() {
        assert!(is_remote_url("https://github.com/a/b"));
        assert!(!is_remote_url("./src"));
        assert!(!is_remote_url("/home/me/https"));
    }

    #[test]
    fn test_contents_deserialize_dir_and_file() {
        let listing: Contents = serde_json::from_str(
            r#"[{"name":"a.rs","path":"src/a.rs","type":"file","size":12,"download_url":"https://raw/x"},
                {"name":"sub","path":"src/sub","type":"dir","size":0,"download_url":null},
                {"name":"link","path":"src/link","type":"symlink","size":3}]"#,
        )
        .unwrap();
        match listing {
            Contents::Dir(entries) => {
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0].kind, EntryKind::File);
                assert_eq!(entries[1].kind, EntryKind::Dir);
                assert_eq!(entries[2].kind, EntryKind::Other);
            }
            other => panic!("expected a listing, got {:?}", other),
        }

        let single: Contents =
            serde_json::from_str(r#"{"name":"a.rs","path":"a.rs","type":"file","size":1}"#).unwrap();
        assert!(matches!(single, Contents::File(_)));
    }

    #[test]
    fn test_default_branch_resolved_before_listing() {
        let client = ScriptedClient::new("trunk")
            .listing("", vec![file("a.rs", 3)])
            .body("a.rs", "fn a() {}");
        let f = filter(&[], &[".rs"]);
        let location = parse_repo_url("https://github.com/octo/demo").unwrap();

        let files = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 3);
        let requests = client.requests.borrow();
        assert_eq!(requests[0], "repo octo/demo");
        assert_eq!(requests[1], "list @trunk");
    }

    #[test]
    fn test_walk_order_and_filters() {
        let client = ScriptedClient::new("main")
            .listing("", vec![dir("src"), file("README.md", 5), file("b.txt", 1), dir("node_modules")])
            .listing("src", vec![file("src/x.md", 2), dir("src/deep")])
            .listing("src/deep", vec![file("src/deep/y.md", 4)])
            .body("src/x.md", "x")
            .body("src/deep/y.md", "y")
            .body("README.md", "readme");
        let f = filter(&["node_modules/"], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main").unwrap();

        let files = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/x.md", "src/deep/y.md", "README.md"]);
        assert!(!client.requests.borrow().iter().any(|r| r.contains("node_modules")));
    }

    #[test]
    fn test_failed_subfolder_does_not_stop_siblings() {
        let client = ScriptedClient::new("main")
            .listing("", vec![dir("gone"), dir("ok")])
            .failing_listing("gone", 404)
            .listing("ok", vec![file("ok/a.md", 1)])
            .body("ok/a.md", "a");
        let f = filter(&[], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main").unwrap();

        let files = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "ok/a.md");
    }

    #[test]
    fn test_root_listing_errors_are_distinct() {
        let f = filter(&[], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main").unwrap();

        let client = ScriptedClient::new("main").failing_listing("", 404);
        let err = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));

        let client = ScriptedClient::new("main").failing_listing("", 403);
        let err = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap_err();
        assert!(matches!(err, RemoteError::RateLimited(_)));
        assert!(err.to_string().contains("GitHub token"));
    }

    #[test]
    fn test_failed_download_is_skipped() {
        let client = ScriptedClient::new("main")
            .listing("", vec![file("a.md", 1), file("b.md", 1)])
            .failing_body("a.md", 500)
            .body("b.md", "b");
        let f = filter(&[], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main").unwrap();

        let files = RemoteFetcher::new(&client, &f).list_and_fetch(&location, false).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].content, "b");
    }

    #[test]
    fn test_explicit_single_file_bypasses_filters() {
        let client = ScriptedClient::new("main").body("vendor/LICENSE", "MIT");
        let f = filter(&["vendor/"], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main/vendor/LICENSE").unwrap();

        let fetcher = RemoteFetcher::new(&client, &f);
        assert_eq!(fetcher.list_and_fetch(&location, true).unwrap().len(), 1);
        assert!(fetcher.list_and_fetch(&location, false).unwrap().is_empty());
    }

    #[test]
    fn test_paths_are_relative_to_base_subpath() {
        let client = ScriptedClient::new("main")
            .listing("pkg", vec![file("pkg/a.md", 1), dir("pkg/pkg")])
            .listing("pkg/pkg", vec![file("pkg/pkg/b.md", 1)])
            .body("pkg/a.md", "a")
            .body("pkg/pkg/b.md", "b");
        let f = filter(&["^pkg/"], &[".md"]);
        let location = parse_repo_url("https://github.com/octo/demo/tree/main/pkg").unwrap();

        let files = RemoteFetcher::new(&client, &f)
            .relative_to(&location.path)
            .list_and_fetch(&location, false)
            .unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md"]);
    }

    #[test]
    fn test_check_status_mapping() {
        assert!(check_status("u", StatusCode::OK).is_ok());
        assert!(matches!(check_status("u", StatusCode::NOT_FOUND), Err(RemoteError::NotFound(_))));
        assert!(matches!(
            check_status("u", StatusCode::TOO_MANY_REQUESTS),
            Err(RemoteError::RateLimited(_))
        ));
        assert!(matches!(
            check_status("u", StatusCode::BAD_GATEWAY),
            Err(RemoteError::Http { status: 502, .. })
        ));
    }
}
