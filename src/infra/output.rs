use crossterm::{
    ExecutableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Destination value that sends the document to stdout.
pub const STDOUT_DESTINATION: &str = "-";

pub trait OutputWriter {
    fn write(&self, content: &str) -> anyhow::Result<()>;
}

pub struct FileWriter {
    path: String,
}

impl FileWriter {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl OutputWriter for FileWriter {
    fn write(&self, content: &str) -> anyhow::Result<()> {
        debug!("Writing output to file: {}", self.path);
        fs::write(Path::new(&self.path), content)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", self.path, e))?;
        info!("Output written to file: {}", self.path);
        Ok(())
    }
}

pub struct ConsoleWriter;

impl OutputWriter for ConsoleWriter {
    fn write(&self, content: &str) -> anyhow::Result<()> {
        debug!("Writing output to console");
        let mut stdout = io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

pub fn create_writer(destination: &str) -> Box<dyn OutputWriter> {
    if destination == STDOUT_DESTINATION {
        Box::new(ConsoleWriter)
    } else {
        Box::new(FileWriter::new(destination.to_string()))
    }
}

/// Shell command that reveals the folder holding `output_path`.
pub fn open_folder_command(output_path: &str) -> String {
    let folder = Path::new(output_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    let opener = if cfg!(target_os = "windows") {
        "start"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    format!("{} {}", opener, folder)
}

/// Writes the document in one go and, for file output, tells the user where it went.
pub fn write_output(document: &str, destination: &str, file_count: usize) -> anyhow::Result<()> {
    let writer = create_writer(destination);
    writer.write(document)?;

    if destination == STDOUT_DESTINATION {
        return Ok(());
    }

    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    writeln!(stdout, "\nProcessed {} files.", file_count)?;
    writeln!(stdout, "Combined content written to {}", destination)?;
    stdout.execute(ResetColor)?;
    Ok(())
}

pub fn print_open_folder_hint(destination: &str) -> anyhow::Result<()> {
    if destination == STDOUT_DESTINATION {
        return Ok(());
    }
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    writeln!(
        stdout,
        "\nTo open the folder containing the output file, run the following command:"
    )?;
    stdout.execute(SetForegroundColor(Color::Green))?;
    writeln!(stdout, "{}", open_folder_command(destination))?;
    stdout.execute(ResetColor)?;
    Ok(())
}
