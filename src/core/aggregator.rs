use crate::core::filters::PathFilter;
use crate::core::normalizer::{HeaderStripper, normalize};
use crate::domain::models::{
    BaseLocation, CombineConfig, CombineOutput, FileRecord, FolderTallies, RepoLocation,
};
use crate::infra::file_system::{list_files, normalize_lexically, read_file_contents};
use crate::infra::github::{RemoteFetcher, RepoClient};
use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Accumulates normalized sections and statistics in visit order.
struct Accumulator<'a> {
    stripper: &'a HeaderStripper,
    document: String,
    records: Vec<FileRecord>,
    folders: FolderTallies,
}

impl<'a> Accumulator<'a> {
    fn new(stripper: &'a HeaderStripper) -> Self {
        Self {
            stripper,
            document: String::new(),
            records: Vec::new(),
            folders: FolderTallies::new(),
        }
    }

    fn add(&mut self, path: &str, size: u64, raw: &str) {
        let (section, tokens) = normalize(path, raw, self.stripper);
        debug!("Adding file {} with {} tokens", path, tokens);
        self.document.push_str(&section);
        self.folders.add(path, size, tokens);
        self.records.push(FileRecord {
            path: path.to_string(),
            size,
            tokens,
            content: section,
        });
    }

    fn finish(self) -> CombineOutput {
        CombineOutput {
            document: self.document,
            records: self.records,
            folders: self.folders,
        }
    }
}

/// Runs the whole pipeline for one configuration.
///
/// `client` is only needed when the base location is remote.
pub fn aggregate(
    config: &CombineConfig,
    client: Option<&dyn RepoClient>,
) -> anyhow::Result<CombineOutput> {
    let filter = PathFilter::new(&config.exclude_patterns, &config.extensions)?;
    let stripper = HeaderStripper::new(&config.header_patterns)?;
    let mut acc = Accumulator::new(&stripper);

    info!("Starting file processing for {}", config.base.display_name());
    match &config.base {
        BaseLocation::Local(base) => {
            aggregate_local(base, &config.include_paths, &filter, &mut acc)
        }
        BaseLocation::Remote(location) => {
            let client = client
                .ok_or_else(|| anyhow!("a repository client is required for {}", location.to_url()))?;
            aggregate_remote(location, &config.include_paths, client, &filter, &mut acc)?
        }
    }

    let output = acc.finish();
    info!("Processed {} files", output.records.len());
    Ok(output)
}

fn aggregate_local(base: &Path, includes: &[String], filter: &PathFilter, acc: &mut Accumulator) {
    if includes.is_empty() {
        for found in list_files(base, "", filter) {
            add_local_file(&found.path, &found.relative, acc);
        }
        return;
    }

    for include in includes {
        let full = base.join(include);
        let reported = normalize_lexically(Path::new(include));
        match fs::metadata(&full) {
            Ok(meta) if meta.is_dir() => {
                for found in list_files(&full, &reported, filter) {
                    add_local_file(&found.path, &found.relative, acc);
                }
            }
            Ok(_) => add_local_file(&full, &reported, acc),
            Err(e) => warn!("File skipped or not found: {}: {}", full.display(), e),
        }
    }
}

fn add_local_file(full: &Path, rel: &str, acc: &mut Accumulator) {
    match read_file_contents(full) {
        Ok((content, size)) => acc.add(rel, size, &content),
        Err(e) => warn!("File skipped, could not read {}: {}", full.display(), e),
    }
}

fn aggregate_remote(
    location: &RepoLocation,
    includes: &[String],
    client: &dyn RepoClient,
    filter: &PathFilter,
    acc: &mut Accumulator,
) -> anyhow::Result<()> {
    let fetcher = RemoteFetcher::new(client, filter).relative_to(&location.path);
    let location = fetcher
        .resolve_branch(location)
        .with_context(|| format!("Error fetching repository information for {}", location.to_url()))?;

    if includes.is_empty() {
        let files = fetcher
            .list_and_fetch(&location, false)
            .with_context(|| format!("Error fetching GitHub contents for {}", location.to_url()))?;
        for file in files {
            acc.add(&file.path, file.size, &file.content);
        }
        return Ok(());
    }

    for include in includes {
        let target = location.join(include);
        match fetcher.list_and_fetch(&target, true) {
            Ok(files) => {
                for file in files {
                    acc.add(&file.path, file.size, &file.content);
                }
            }
            Err(e) => warn!("Include path {} skipped: {}", target.to_url(), e),
        }
    }
    Ok(())
}
