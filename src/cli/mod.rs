//! # CLI Module
//!
//! Command-line interface for the photo catalog.
//!
//! ## Usage
//! ```bash
//! # Import a folder (creates QualityRecord.json and .thumbnails)
//! photo-catalog import ~/Photos/Trip --recursive
//!
//! # Pick up new photos only
//! photo-catalog refresh ~/Photos/Trip
//!
//! # Tag every cataloged photo as qualified / over- / underexposed
//! photo-catalog classify ~/Photos/Trip
//!
//! # Inspect one image without touching any catalog
//! photo-catalog check ~/Photos/Trip/IMG_0001.jpg --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_catalog::core::catalog::{CatalogStats, CatalogStore, QualityTag};
use photo_catalog::core::exposure::{ClassifySummary, ExposureClassifier, ExposureConfig, ExposureReport};
use photo_catalog::core::import::{check_duplicates, import_stats, ImportResult, Importer};
use photo_catalog::core::thumbnail::{self, FitMode, ThumbnailConfig};
use photo_catalog::error::{CatalogError, Result};
use photo_catalog::events::{ClassifyEvent, Event, EventChannel, EventReceiver, ImportEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Photo Catalog - import folders, keep a safe catalog, flag bad exposures
#[derive(Parser, Debug)]
#[command(name = "photo-catalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a folder into its catalog
    Import {
        folder: PathBuf,

        #[command(flatten)]
        options: ImportOptions,

        /// Re-read photos that are already cataloged
        #[arg(long)]
        no_skip_existing: bool,
    },

    /// Import only photos that are not cataloged yet
    Refresh {
        folder: PathBuf,

        #[command(flatten)]
        options: ImportOptions,
    },

    /// Classify the exposure of every cataloged photo and store the tags
    Classify {
        folder: PathBuf,

        /// Exposure thresholds file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads
        #[arg(short, long, default_value = "4")]
        workers: usize,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Classify a single image and print its signals
    Check {
        image: PathBuf,

        /// Exposure thresholds file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show catalog statistics for a folder
    Stats {
        folder: PathBuf,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// List fingerprints that occur more than once in a catalog
    Duplicates { folder: PathBuf },

    /// Manage cached thumbnails
    Thumbnails {
        #[command(subcommand)]
        action: ThumbnailAction,
    },
}

#[derive(clap::Args, Debug)]
struct ImportOptions {
    /// Include subfolders
    #[arg(short, long)]
    recursive: bool,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Skip thumbnail generation
    #[arg(long)]
    no_thumbnails: bool,

    #[arg(long, default_value = "200")]
    thumb_width: u32,

    #[arg(long, default_value = "200")]
    thumb_height: u32,

    /// JPEG quality of thumbnails (1-100)
    #[arg(long, default_value = "85")]
    thumb_quality: u8,

    #[arg(long, default_value = "cover")]
    fit: Fit,

    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum ThumbnailAction {
    /// Delete every cached thumbnail of a folder
    Clear { folder: PathBuf },
    /// Print the size of a folder's thumbnail cache
    Size { folder: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Fit {
    /// Fill the box and crop the overflow (default)
    Cover,
    /// Fit inside the box
    Contain,
    /// Stretch to the box
    Fill,
}

impl From<Fit> for FitMode {
    fn from(fit: Fit) -> Self {
        match fit {
            Fit::Cover => FitMode::Cover,
            Fit::Contain => FitMode::Contain,
            Fit::Fill => FitMode::Fill,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            folder,
            options,
            no_skip_existing,
        } => run_import(&folder, options, !no_skip_existing),
        Commands::Refresh { folder, options } => run_import(&folder, options, true),
        Commands::Classify {
            folder,
            config,
            workers,
            output,
        } => run_classify(&folder, config.as_deref(), workers, output),
        Commands::Check {
            image,
            config,
            output,
        } => run_check(&image, config.as_deref(), output),
        Commands::Stats { folder, output } => run_stats(&folder, output),
        Commands::Duplicates { folder } => run_duplicates(&folder),
        Commands::Thumbnails { action } => run_thumbnails(action),
    }
}

fn run_import(folder: &Path, options: ImportOptions, skip_existing: bool) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(options.output, OutputFormat::Pretty);
    if pretty {
        print_header(&term);
    }

    let importer = Importer::builder()
        .workers(options.workers)
        .recursive(options.recursive)
        .skip_existing(skip_existing)
        .thumbnails(!options.no_thumbnails)
        .thumbnail_config(ThumbnailConfig {
            size: (options.thumb_width, options.thumb_height),
            quality: options.thumb_quality,
            fit_mode: options.fit.into(),
        })
        .build();

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(new_progress_bar);
    let event_thread = spawn_event_thread(receiver, progress);

    let result = importer.import_folder(folder, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    match options.output {
        OutputFormat::Pretty => print_import_result(&term, &result),
        OutputFormat::Json => print_json(&result)?,
    }

    import_outcome(folder, &result)
}

/// Map an import result to the process outcome
fn import_outcome(folder: &Path, result: &ImportResult) -> Result<()> {
    if result.success {
        Ok(())
    } else {
        Err(CatalogError::ImportIncomplete {
            folder: folder.to_path_buf(),
            failed: result.error_files.max(result.errors.len()),
        })
    }
}

fn run_classify(
    folder: &Path,
    config: Option<&Path>,
    workers: usize,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);
    if pretty {
        print_header(&term);
    }

    let classifier = ExposureClassifier::new(ExposureConfig::load(config)?);
    let store = CatalogStore::open(folder);

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(new_progress_bar);
    let event_thread = spawn_event_thread(receiver, progress);

    let summary = classifier.classify_catalog(&store, workers, &sender);

    drop(sender);
    event_thread.join().ok();
    let summary = summary?;

    match output {
        OutputFormat::Pretty => print_classify_summary(&term, &summary),
        OutputFormat::Json => print_json(&summary)?,
    }
    Ok(())
}

fn run_check(image: &Path, config: Option<&Path>, output: OutputFormat) -> Result<()> {
    let classifier = ExposureClassifier::new(ExposureConfig::load(config)?);
    let report = classifier.classify_file(image)?;

    match output {
        OutputFormat::Pretty => print_report(&Term::stdout(), image, &report),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct CheckOutput<'a> {
                image: &'a Path,
                tags: Vec<&'static str>,
                #[serde(flatten)]
                report: &'a ExposureReport,
            }
            print_json(&CheckOutput {
                image,
                tags: report.tags().iter().map(|t| t.name()).collect(),
                report: &report,
            })?
        }
    }
    Ok(())
}

fn run_stats(folder: &Path, output: OutputFormat) -> Result<()> {
    let Some(stats) = import_stats(folder)? else {
        Term::stderr()
            .write_line(&format!(
                "{} No catalog in {}",
                style("!").yellow().bold(),
                folder.display()
            ))
            .ok();
        return Ok(());
    };

    match output {
        OutputFormat::Pretty => print_stats(&Term::stdout(), &stats),
        OutputFormat::Json => print_json(&stats)?,
    }
    Ok(())
}

fn run_duplicates(folder: &Path) -> Result<()> {
    let duplicates = check_duplicates(folder)?;
    let term = Term::stdout();
    if duplicates.is_empty() {
        term.write_line(&format!("{} No duplicated fingerprints", style("✓").green().bold()))
            .ok();
    }
    for fingerprint in duplicates {
        term.write_line(&fingerprint).ok();
    }
    Ok(())
}

fn run_thumbnails(action: ThumbnailAction) -> Result<()> {
    let term = Term::stdout();
    match action {
        ThumbnailAction::Clear { folder } => {
            let removed = thumbnail::clear(&folder)?;
            term.write_line(&format!(
                "{} Removed {} thumbnails",
                style("✓").green().bold(),
                style(removed).cyan()
            ))
            .ok();
        }
        ThumbnailAction::Size { folder } => {
            let bytes = thumbnail::cache_size(&folder)?;
            term.write_line(&format_bytes(bytes)).ok();
        }
    }
    Ok(())
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Photo Catalog").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn new_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

/// Drive the progress bar from import and classify events
fn spawn_event_thread(receiver: EventReceiver, progress: Option<ProgressBar>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress else {
                continue;
            };
            match event {
                Event::Import(ImportEvent::Started { total_files, .. }) => {
                    pb.set_length(total_files as u64);
                    pb.set_message("importing");
                }
                Event::Import(ImportEvent::Progress(p)) => {
                    pb.set_position(p.processed as u64);
                }
                Event::Import(ImportEvent::FileFailed { path, .. })
                | Event::Classify(ClassifyEvent::Failed { path, .. }) => {
                    pb.set_message(format!(
                        "failed: {}",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    ));
                }
                Event::Classify(ClassifyEvent::Started { total_photos }) => {
                    pb.set_length(total_photos as u64);
                    pb.set_message("classifying");
                }
                Event::Classify(ClassifyEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                }
                Event::Import(ImportEvent::Completed { .. })
                | Event::Classify(ClassifyEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    })
}

fn print_import_result(term: &Term, result: &ImportResult) {
    let mark = if result.success {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    term.write_line(&format!("{} Import Complete", mark)).ok();
    term.write_line("").ok();

    term.write_line(&format!("  {} photos found", style(result.total_files).cyan()))
        .ok();
    term.write_line(&format!("  {} imported", style(result.imported_files).green()))
        .ok();
    term.write_line(&format!("  {} already cataloged", style(result.skipped_files).dim()))
        .ok();
    if result.error_files > 0 {
        term.write_line(&format!("  {} failed", style(result.error_files).red()))
            .ok();
    }
    if let Some(ref path) = result.catalog_path {
        term.write_line(&format!("  {} {}", style("Catalog:").dim(), path.display()))
            .ok();
    }

    if !result.errors.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Errors:").bold().underlined()))
            .ok();
        for error in &result.errors {
            term.write_line(&format!("    {} {}", style("○").red(), error)).ok();
        }
    }
}

fn print_classify_summary(term: &Term, summary: &ClassifySummary) {
    term.write_line(&format!("{} Classification Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();
    term.write_line(&format!("  {} photos", style(summary.total).cyan()))
        .ok();
    term.write_line(&format!("  {} classified", style(summary.succeeded).green()))
        .ok();
    if summary.failed > 0 {
        term.write_line(&format!("  {} unreadable", style(summary.failed).red()))
            .ok();
    }
    term.write_line("").ok();
    for (tag, count) in &summary.tag_counts {
        term.write_line(&format!("  {:<14} {}", tag_label(*tag), count)).ok();
    }
}

fn print_report(term: &Term, image: &Path, report: &ExposureReport) {
    term.write_line(&format!("{}", style(image.display()).bold())).ok();
    let tags: Vec<String> = report.tags().iter().map(tag_label).collect();
    term.write_line(&format!("  {}", tags.join(", "))).ok();
    term.write_line("").ok();
    for (name, value) in report.signals() {
        term.write_line(&format!("  {:<34} {:.4}", name, value)).ok();
    }
}

fn print_stats(term: &Term, stats: &CatalogStats) {
    term.write_line(&format!("{}", style(&stats.folder_path).bold())).ok();
    term.write_line(&format!("  {} photos", style(stats.total_photos).cyan()))
        .ok();
    term.write_line(&format!("  {} {}", style("Created:").dim(), stats.created_time))
        .ok();
    term.write_line(&format!("  {} {}", style("Updated:").dim(), stats.last_updated))
        .ok();
    term.write_line("").ok();
    for (tag, count) in &stats.quality_stats {
        term.write_line(&format!("  {:<14} {}", tag_label(*tag), count)).ok();
    }
}

fn tag_label(tag: QualityTag) -> String {
    let styled = match tag {
        QualityTag::Qualified => style(tag.name()).green(),
        QualityTag::Overexposed | QualityTag::Underexposed => style(tag.name()).yellow(),
        QualityTag::Failed => style(tag.name()).red(),
        QualityTag::Unreviewed => style(tag.name()).dim(),
    };
    styled.to_string()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CatalogError::Config(format!("cannot render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_flags_parse() {
        let cli = Cli::try_parse_from([
            "photo-catalog",
            "import",
            "/photos",
            "--recursive",
            "--no-skip-existing",
            "--fit",
            "contain",
            "--thumb-width",
            "320",
        ])
        .unwrap();
        match cli.command {
            Commands::Import {
                options,
                no_skip_existing,
                ..
            } => {
                assert!(options.recursive);
                assert!(no_skip_existing);
                assert_eq!(options.thumb_width, 320);
                assert_eq!(FitMode::from(options.fit), FitMode::Contain);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn failed_import_is_not_a_config_error() {
        let result = ImportResult {
            success: false,
            total_files: 3,
            imported_files: 1,
            error_files: 2,
            errors: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            import_outcome(Path::new("/photos"), &result),
            Err(CatalogError::ImportIncomplete { failed: 2, .. })
        ));

        let ok = ImportResult {
            success: true,
            ..Default::default()
        };
        assert!(import_outcome(Path::new("/photos"), &ok).is_ok());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
