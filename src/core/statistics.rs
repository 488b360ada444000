use crate::domain::models::{CombineOutput, FileRecord, FolderTally};
use crate::infra::output::STDOUT_DESTINATION;
use crossterm::{
    QueueableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

pub const TOP_FILES: usize = 20;
pub const TOP_FOLDERS: usize = 10;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable size with 1024 scaling and two decimals, e.g. `1.50 KB`.
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

/// Largest files first; equal sizes keep their discovery order.
pub fn largest_files(records: &[FileRecord], limit: usize) -> Vec<&FileRecord> {
    let mut sorted: Vec<&FileRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.size.cmp(&a.size));
    sorted.truncate(limit);
    sorted
}

pub fn largest_folders<'a>(
    folders: impl Iterator<Item = &'a FolderTally>,
    limit: usize,
) -> Vec<&'a FolderTally> {
    let mut sorted: Vec<&FolderTally> = folders.collect();
    sorted.sort_by(|a, b| b.total_size.cmp(&a.total_size));
    sorted.truncate(limit);
    sorted
}

fn heading<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    out.queue(SetForegroundColor(Color::Blue))?;
    write!(out, "\n{}", text)?;
    out.queue(ResetColor)?;
    writeln!(out)
}

/// Writes the largest files, largest root folders and the token total.
pub fn write_report<W: Write>(out: &mut W, output: &CombineOutput) -> io::Result<()> {
    heading(out, &format!("{} Largest Files (by size):", TOP_FILES))?;
    for (rank, record) in largest_files(&output.records, TOP_FILES).iter().enumerate() {
        writeln!(
            out,
            "{}. {} ({}, {} tokens)",
            rank + 1,
            record.path,
            format_file_size(record.size),
            record.tokens
        )?;
    }

    heading(out, &format!("{} Largest Root-Level Folders:", TOP_FOLDERS))?;
    for (rank, folder) in largest_folders(output.folders.iter(), TOP_FOLDERS).iter().enumerate() {
        writeln!(
            out,
            "{}. {} ({}, {} tokens)",
            rank + 1,
            folder.name,
            format_file_size(folder.total_size),
            folder.total_tokens
        )?;
    }

    out.queue(SetForegroundColor(Color::Cyan))?;
    writeln!(out, "\nEstimated total number of tokens: {}", output.total_tokens())?;
    out.queue(ResetColor)?;
    out.flush()
}

/// Where the report goes. It moves to stderr when the document itself is
/// written to stdout, so piped output stays clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStream {
    Stdout,
    Stderr,
}

impl ReportStream {
    pub fn for_destination(destination: &str) -> Self {
        if destination == STDOUT_DESTINATION {
            ReportStream::Stderr
        } else {
            ReportStream::Stdout
        }
    }
}

pub fn print_report(output: &CombineOutput, stream: ReportStream) -> io::Result<()> {
    match stream {
        ReportStream::Stdout => write_report(&mut io::stdout().lock(), output),
        ReportStream::Stderr => write_report(&mut io::stderr().lock(), output),
    }
}
