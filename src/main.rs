//! epub-wordcount - Count the words in EPUB files

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use serde_json::Value;

use epub_wordcount::error::Result;
use epub_wordcount::path_utils::get_file_name_lossy;
use epub_wordcount::{BookReport, BookStats, CountMode, WordCountConfig};

#[derive(Parser)]
#[command(name = "epub-wordcount")]
#[command(version, about = "Count the words in epub files", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub-wordcount book.epub            Count the words of one book
    epub-wordcount -c library/          Count characters of every book below library/
    epub-wordcount -r a.epub b.epub     Print a JSON array of counts")]
struct Cli {
    /// EPUB files or directories to search for them
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Print out an array of counts without the frivolity
    #[arg(short, long)]
    raw: bool,

    /// Fail on malformed epub files; default: print but skip
    #[arg(short, long)]
    fragile: bool,

    /// Count characters instead of words
    #[arg(short, long)]
    chars: bool,

    /// Output the text content instead of a number
    #[arg(short, long)]
    text: bool,

    /// Try to read books with DRM anyway
    #[arg(long)]
    ignore_drm: bool,

    /// Treat hyphens and em dashes as punctuation attached to the previous word
    #[arg(long)]
    dashes: bool,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Report problems with individual chapters
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }

    fn config(&self) -> Result<WordCountConfig> {
        Ok(WordCountConfig::builder()
            .fragile(self.fragile)
            .ignore_drm(self.ignore_drm)
            .floating_dashes(self.dashes)
            .keep_text(self.text)
            .build()?)
    }

    fn count_mode(&self) -> CountMode {
        if self.chars {
            CountMode::Characters
        } else {
            CountMode::Words
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level().as_str()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;

    let reports = config.process_paths(&cli.paths).await?;
    let drm_blocked = |stats: &BookStats| stats.has_drm && !config.ignore_drm;

    if cli.raw {
        let values: Vec<Value> = reports
            .iter()
            .filter_map(BookReport::stats)
            .map(|stats| {
                if cli.text {
                    Value::from(stats.text.as_str())
                } else if drm_blocked(stats) {
                    Value::from(-1)
                } else {
                    Value::from(stats.count(cli.count_mode()))
                }
            })
            .collect();
        println!("{}", Value::Array(values));
        return Ok(());
    }

    for report in &reports {
        match report {
            BookReport::Counted { path, stats } => {
                let title = stats
                    .title
                    .clone()
                    .unwrap_or_else(|| get_file_name_lossy(path));
                if cli.text && !drm_blocked(stats) {
                    println!("{}", stats.text);
                    continue;
                }

                println!("{title}");
                println!("{}", "-".repeat(title.chars().count()));
                if drm_blocked(stats) {
                    println!(" * DRM detected");
                } else {
                    let mode = cli.count_mode();
                    println!(
                        " * {} {}",
                        format_thousands(stats.count(mode)),
                        mode.label()
                    );
                }
                println!();
            }
            BookReport::Skipped { path, reason } => {
                println!("Skipped {}: {}", get_file_name_lossy(path), reason);
                println!();
            }
        }
    }

    Ok(())
}

/// Formats `n` with comma thousands separators.
fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
