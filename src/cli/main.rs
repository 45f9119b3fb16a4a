use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use booru_xmp::annotation::{Annotation, Rating};
use booru_xmp::pipeline::BatchSummary;
use booru_xmp::{config, pipeline, xmp};

#[derive(Parser, Debug)]
#[command(
    name = "booru-xmp",
    version,
    about = "Embed image-board tags into JPEG, PNG and WebP files as XMP metadata"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Embed this text into every image instead of reading per-image tag files
    #[arg(long, value_name = "TEXT", conflicts_with_all = ["tags", "rating", "score"])]
    text: Option<String>,

    /// Tags to embed into every image: a space-separated board tag string or a
    /// comma-separated list
    #[arg(long, value_name = "TAGS")]
    tags: Option<String>,

    /// Rating to append (g, s, q, e or the full name)
    #[arg(long, value_name = "RATING")]
    rating: Option<Rating>,

    /// Score to append
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    score: Option<i64>,

    /// Write each image's embedded text to a tag file next to it
    #[arg(long, conflicts_with_all = ["text", "tags", "rating", "score", "resize"])]
    extract: bool,

    /// Print the XMP packet of each image and exit
    #[arg(long = "show-xmp")]
    show_xmp: bool,

    /// Resize to the closest configured resolution before embedding
    #[arg(long)]
    resize: bool,

    /// Replace packets (or tag files, with --extract) that already exist
    #[arg(long)]
    overwrite: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn has_annotation(&self) -> bool {
        self.tags.is_some() || self.rating.is_some() || self.score.is_some()
    }

    /// Payload text from `--text` or the annotation flags, if either was given.
    fn payload(&self, config: &config::Config) -> Result<Option<String>> {
        if let Some(ref text) = self.text {
            if text.trim().is_empty() {
                anyhow::bail!("--text must not be empty");
            }
            return Ok(Some(text.clone()));
        }
        if !self.has_annotation() {
            return Ok(None);
        }

        let mut annotation = self
            .tags
            .as_deref()
            .map(Annotation::from_tags)
            .unwrap_or_default();
        if config.annotation.include_rating {
            annotation.rating = self.rating;
        }
        if config.annotation.include_score {
            annotation.score = self.score;
        }
        if annotation.is_empty() {
            anyhow::bail!(
                "Nothing to embed: no tags given and rating/score are disabled in config"
            );
        }
        Ok(Some(annotation.to_text()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    // Handle --show-xmp
    if cli.show_xmp {
        for image_path in &images {
            print_xmp(image_path);
        }
        return Ok(());
    }

    // Load config, CLI flags win
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if cli.overwrite {
        config.embed.overwrite_existing = true;
    }
    if cli.resize {
        config.resize.enabled = true;
    }
    config.validate()?;

    log::info!("Found {} image(s) to process", images.len());
    if config.output.dry_run {
        log::info!("DRY RUN — no files will be modified");
    }

    let mut summaries: Vec<(&str, BatchSummary)> = Vec::new();

    if cli.extract {
        let summary = pipeline::extract_to_sidecars(&images, cli.overwrite, &config);
        summaries.push(("extract", summary));
    } else {
        let payload = cli.payload(&config)?;

        if config.resize.enabled {
            summaries.push(("resize", pipeline::resize_all(&images, &config)));
        }

        let summary = match payload {
            Some(text) => {
                log::info!("Embedding: {text}");
                pipeline::embed_text(&images, &text, &config)
            }
            None => pipeline::embed_from_sidecars(&images, &config),
        };
        summaries.push(("embed", summary));
    }

    // JSON output
    if cli.json {
        let mut json = serde_json::Map::new();
        for (name, summary) in &summaries {
            json.insert(name.to_string(), serde_json::to_value(summary)?);
        }
        println!("{}", serde_json::to_string_pretty(&json)?);
    }

    // Summary
    for (name, s) in &summaries {
        log::info!(
            "Done ({name}): {} succeeded, {} skipped, {} failed{} out of {} images",
            s.processed,
            s.skipped,
            s.failed,
            if s.no_metadata > 0 {
                format!(", {} without XMP", s.no_metadata)
            } else {
                String::new()
            },
            s.total
        );
    }

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the stored packet and the text recovered from it.
fn print_xmp(path: &Path) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    match xmp::read_packet(path) {
        Ok(Some(packet)) => {
            let text = xmp::extract_text(&packet);
            println!("  {BOLD}Text:{RESET} {}", text.as_deref().unwrap_or("(none)"));
            println!("  {DIM}{}{RESET}", "─".repeat(70));
            for line in packet.lines() {
                println!("  {line}");
            }
        }
        Ok(None) => println!("  {DIM}(no XMP metadata found){RESET}"),
        Err(e) => log::error!("Failed to read XMP from {}: {e}", path.display()),
    }
    println!();
}
