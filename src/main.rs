//! Main entry point for the expak CLI application.
//!
//! This binary provides a command-line interface for listing and extracting
//! resources from pak files on the local filesystem or behind HTTP URLs.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use expak::batch::{self, BatchOptions, Selection};
use expak::cli::{exit_code, glob_match, has_glob_chars, is_excluded};
use expak::pak::archive::is_http_url;
use expak::{Cli, HttpRangeReader, PakArchive, PakExtractor, PakIndex};

/// Application entry point.
///
/// Parses command-line arguments, opens every pak in order and dispatches to
/// listing, piping or extraction.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.sources().is_empty() {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "at least one .pak file or http(s) URL is required",
            )
            .exit();
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            if !cli.is_very_quiet() {
                eprintln!("expak: {:#}", e);
            }
            let code = e
                .downcast_ref::<expak::Error>()
                .map(|e| exit_code(e.kind()))
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the `-q` level.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::builder()
        .with_default_directive(cli.log_level().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let opened = open_sources(&cli.sources(), cli.is_very_quiet()).await;
    let extractor = PakExtractor::new(opened.index);

    let code = if cli.list || cli.verbose {
        list_entries(&extractor, cli)?;
        ExitCode::SUCCESS
    } else if cli.pipe {
        pipe_entries(&extractor, cli).await?
    } else {
        extract_entries(&extractor, cli).await?
    };

    // Display network transfer statistics for HTTP sources
    if !opened.http_readers.is_empty() && !cli.is_quiet() {
        for reader in &opened.http_readers {
            debug!(
                "{}: {} transferred",
                reader.url(),
                format_size(reader.transferred_bytes())
            );
        }
        let transferred: u64 = opened
            .http_readers
            .iter()
            .map(|r| r.transferred_bytes())
            .sum();
        eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
    }

    // A pak that failed to open decides the status even if the rest went fine
    Ok(match opened.failures.first() {
        Some(e) => ExitCode::from(exit_code(e.kind())),
        None => code,
    })
}

/// Archives that opened, in command-line order, and the errors of the rest.
struct OpenedSources {
    index: PakIndex,
    http_readers: Vec<Arc<HttpRangeReader>>,
    failures: Vec<expak::Error>,
}

async fn open_source(
    source: &str,
    http_readers: &mut Vec<Arc<HttpRangeReader>>,
) -> expak::Result<PakArchive> {
    if is_http_url(source) {
        let reader = Arc::new(
            HttpRangeReader::new(source.to_string())
                .await
                .map_err(|e| expak::Error::archive_io(source, e))?,
        );
        http_readers.push(reader.clone());
        PakArchive::open(source, reader).await
    } else {
        PakArchive::open_path(source).await
    }
}

/// Open every source in command-line order.
///
/// A source that fails to open is reported and left out; the remaining paks
/// are still indexed so their resources can be listed or extracted.
async fn open_sources(sources: &[&str], very_quiet: bool) -> OpenedSources {
    let mut archives = Vec::with_capacity(sources.len());
    let mut http_readers = Vec::new();
    let mut failures = Vec::new();

    for &source in sources {
        match open_source(source, &mut http_readers).await {
            Ok(archive) => archives.push(Arc::new(archive)),
            Err(e) => {
                debug!("Skipping {}: {:?}", source, e);
                if !very_quiet {
                    eprintln!("expak: cannot open pak {}: {}", source, e);
                }
                failures.push(e);
            }
        }
    }

    OpenedSources {
        index: PakIndex::new(archives),
        http_readers,
        failures,
    }
}

/// List resources in the combined index.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just resource names, one per line
/// - Verbose format (`-v`): Length, offset and owning pak for each resource
fn list_entries(extractor: &PakExtractor, cli: &Cli) -> Result<()> {
    let prefix = cli.prefix.as_deref();

    if !cli.verbose {
        for name in extractor.list_entries(prefix)? {
            println!("{}", name);
        }
        return Ok(());
    }

    println!("{:>10}  {:>10}  {:<16}  Name", "Length", "Offset", "Pak");
    println!("{}", "-".repeat(70));

    let mut total = 0u64;
    let mut count = 0usize;
    for location in extractor
        .index()
        .entries()?
        .filter(|l| prefix.is_none_or(|p| l.name().starts_with(p)))
    {
        let pak = Path::new(location.archive.label())
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| location.archive.label().to_string());
        println!(
            "{:>10}  {:>10}  {:<16}  {}",
            location.length(),
            location.offset(),
            pak,
            location.name()
        );
        total += location.length();
        count += 1;
    }

    println!("{}", "-".repeat(70));
    println!("{:>10}  {:>10}  {:<16}  {} resources", total, "", "", count);
    Ok(())
}

/// Work out which resources the command line asks for.
///
/// Plain names are taken as-is (and reported missing later if absent);
/// patterns with `*` or `?` expand against the index. `-x` removes matches.
fn selection(extractor: &PakExtractor, cli: &Cli) -> expak::Result<Selection> {
    let requested = cli.resources();
    if requested.is_empty() && cli.exclude.is_empty() {
        return Ok(Selection::All);
    }

    let mut names = BTreeSet::new();
    if requested.is_empty() {
        names.extend(extractor.list_entries(None)?.map(String::from));
    }
    for pattern in requested {
        if has_glob_chars(pattern) {
            names.extend(
                extractor
                    .list_entries(None)?
                    .filter(|name| glob_match(pattern, name))
                    .map(String::from),
            );
        } else {
            names.insert(pattern.to_string());
        }
    }
    names.retain(|name| !is_excluded(&cli.exclude, name));

    Ok(Selection::Names(names))
}

/// Write the selected resources to stdout.
async fn pipe_entries(extractor: &PakExtractor, cli: &Cli) -> Result<ExitCode> {
    let names: Vec<String> = match selection(extractor, cli)? {
        Selection::Names(names) => names.into_iter().collect(),
        _ => extractor.list_entries(None)?.map(String::from).collect(),
    };

    let show_filename = names.len() > 1;
    for name in &names {
        if show_filename {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", name).as_bytes())
                .await?;
            stdout.flush().await?;
        }
        extractor
            .extract_to_stdout(name)
            .await
            .with_context(|| format!("cannot extract {}", name))?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Extract the selected resources below `-d` and report what happened.
async fn extract_entries(extractor: &PakExtractor, cli: &Cli) -> Result<ExitCode> {
    let options = BatchOptions {
        overwrite: cli.should_overwrite(),
        junk_paths: cli.junk_paths,
    };
    let report = batch::extract_resources(
        extractor.index(),
        &selection(extractor, cli)?,
        Path::new(&cli.extract_dir),
        options,
    )
    .await?;

    if !cli.is_quiet() {
        for (name, _) in &report.extracted {
            println!("  extracting: {}", name);
        }
        for (name, _) in &report.skipped {
            if cli.never_overwrite {
                eprintln!("Skipping: {} (file exists)", name);
            } else {
                eprintln!("Skipping: {} (use -o to overwrite)", name);
            }
        }
    }

    if !cli.is_very_quiet() {
        for (name, e) in &report.failed {
            eprintln!("expak: {}: {}", name, e);
        }
        if !report.missing.is_empty() || !report.failed.is_empty() {
            println!("not found (or not successfully extracted):");
            for name in report
                .missing
                .iter()
                .chain(report.failed.iter().map(|(name, _)| name))
            {
                println!("    {}", name);
            }
        }
    }

    Ok(match report.error_kind() {
        Some(kind) => ExitCode::from(exit_code(kind)),
        None => ExitCode::SUCCESS,
    })
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expak::ErrorKind;
    use expak::pak::{HEADER_SIZE, MAGIC, NAME_LEN, RECORD_SIZE};

    fn one_file_pak(name: &str, data: &[u8]) -> Vec<u8> {
        let mut buf = MAGIC.to_vec();
        buf.extend_from_slice(&((HEADER_SIZE + data.len()) as u32).to_le_bytes());
        buf.extend_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
        buf.extend_from_slice(data);
        let mut record = vec![0u8; RECORD_SIZE];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[NAME_LEN..NAME_LEN + 4].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        record[NAME_LEN + 4..].copy_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&record);
        buf
    }

    #[tokio::test]
    async fn test_bad_pak_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pak");
        let bad = dir.path().join("bad.pak");
        let gone = dir.path().join("gone.pak");
        std::fs::write(&good, one_file_pak("gfx/palette.lmp", b"RGBRGB")).unwrap();
        let mut corrupt = one_file_pak("progs.dat", b"progs");
        corrupt[..4].copy_from_slice(b"KCAP");
        std::fs::write(&bad, corrupt).unwrap();

        let sources = [
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
            gone.to_str().unwrap(),
        ];
        let opened = open_sources(&sources, true).await;

        assert_eq!(opened.failures.len(), 2);
        assert_eq!(opened.failures[0].kind(), ErrorKind::Format);
        assert!(opened.failures[0].to_string().contains("bad.pak"));
        assert_eq!(opened.failures[1].kind(), ErrorKind::Io);
        assert!(opened.failures[1].to_string().contains("gone.pak"));
        assert_eq!(opened.index.archives().len(), 1);

        let out = dir.path().join("out");
        let report = batch::extract_resources(
            &opened.index,
            &Selection::All,
            &out,
            BatchOptions::default(),
        )
        .await
        .unwrap();
        assert!(report.is_success());
        assert_eq!(
            std::fs::read(out.join("gfx").join("palette.lmp")).unwrap(),
            b"RGBRGB"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
