use crate::core::aggregator::aggregate;
use crate::core::statistics::{ReportStream, print_report};
use crate::domain::models::CombineConfig;
use crate::infra::config::{ConfigFile, ConfigOverrides, read_config_file, resolve_config, split_list};
use crate::infra::github::{GitHubClient, RepoClient};
use crate::infra::logger::setup_logger;
use crate::infra::output::{print_open_folder_hint, write_output};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "combine-code")]
#[command(about = "Combine a source tree into a single text document", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk a directory or GitHub URL and write the combined document
    Combine {
        /// Base directory to process files from
        #[arg(short, long)]
        base_dir: Option<String>,

        /// GitHub URL to process files from
        #[arg(short, long)]
        github_url: Option<String>,

        /// Files or folders to include (comma-separated)
        #[arg(short, long)]
        include: Option<String>,

        /// Regex patterns to exclude (comma-separated)
        #[arg(short, long)]
        exclude: Option<String>,

        /// File extensions to process (comma-separated, with leading dot)
        #[arg(short = 'x', long)]
        extensions: Option<String>,

        /// Output file, or `-` for stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Path to a JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// GitHub personal access token
        #[arg(short = 't', long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logger(cli.verbose)?;

    match cli.command {
        Commands::Combine {
            base_dir,
            github_url,
            include,
            exclude,
            extensions,
            output,
            config,
            github_token,
        } => {
            info!("Starting combine command");
            debug!(
                "Command parameters: base_dir={:?}, github_url={:?}, include={:?}, exclude={:?}, extensions={:?}, output={:?}, config={:?}",
                base_dir, github_url, include, exclude, extensions, output, config
            );

            let file = match &config {
                Some(path) => read_config_file(path)?,
                None => ConfigFile::default(),
            };
            let overrides = ConfigOverrides {
                base_dir,
                github_url,
                include: include.as_deref().map(split_list),
                exclude: exclude.as_deref().map(split_list),
                extensions: extensions.as_deref().map(split_list),
                output,
                github_token,
            };
            let cwd = std::env::current_dir()?;
            let config = resolve_config(file, overrides, &cwd)?;

            combine(&config)?;
        }
    }
    Ok(())
}

fn combine(config: &CombineConfig) -> anyhow::Result<()> {
    let client = if config.base.is_remote() {
        Some(GitHubClient::new(config.github_token.clone())?)
    } else {
        None
    };

    let output = aggregate(config, client.as_ref().map(|c| c as &dyn RepoClient))?;

    info!("Writing output");
    write_output(&output.document, &config.output, output.records.len())?;

    info!("Generating statistics");
    print_report(&output, ReportStream::for_destination(&config.output))?;
    print_open_folder_hint(&config.output)
}
