//! `verses`: load and query the verse store from the command line.
//!
//! The database location and pool settings come from the environment (or a
//! `.env` file); see `db::Config`.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use serde_json::json;

use db::classifier::classify;
use db::guidance::Urgency;
use db::models::{Category, Reference, Testament, VerseSummary};
use db::{build_pool, import, migrate, Config, SearchOptions, SwordDrill, VerseFinder};

#[derive(Parser)]
#[command(name = "verses", version, about = "Korean Bible verse store and recommendations")]
struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a JSON object of `reference: text` entries.
    Import {
        file: PathBuf,
        /// Entries per batch; defaults to IMPORT_BATCH_SIZE.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Full text search.
    Search {
        query: String,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        testament: Option<Testament>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Verses carrying any of the given themes.
    Themes {
        #[arg(required = true)]
        themes: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Verses for an emotion such as `anxious` or `lonely`.
    Emotion {
        emotion: String,
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Verses for a counseling topic such as `work` or `family`.
    Counsel {
        topic: String,
        #[arg(long, default_value = "medium")]
        urgency: Urgency,
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// The most used verses.
    Popular {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// A random selection.
    Random {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Verses in one category.
    Category {
        category: Category,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Look up one verse, e.g. `요3:16`.
    Verse { reference: String },
    /// Parse a reference without touching the database.
    Parse { reference: String },
    /// Show how a text would be tagged.
    Classify { text: String },
    /// Collection statistics.
    Stats,
    /// Available categories, themes, books and request vocabularies.
    Options,
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let json = cli.json;

    match cli.command {
        Command::Parse { reference } => parse(&reference, json),
        Command::Classify { text } => tag(&text, json),
        command => {
            let config = Config::from_env()?;
            let pool = build_pool(&config)?;
            migrate(&pool)?;
            query(&VerseFinder::new(SwordDrill::new(pool)), &config, command, json)
        }
    }
}

fn parse(reference: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let reference: Reference = reference.parse()?;
    if json {
        return print_json(&json!({
            "reference": reference.to_string(),
            "book": reference.book,
            "chapter": reference.chapter,
            "verse": reference.verse,
            "testament": reference.testament,
        }));
    }
    println!(
        "{} ({} {}:{}, {})",
        reference, reference.book, reference.chapter, reference.verse, reference.testament
    );
    Ok(())
}

fn tag(text: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let classification = classify(text);
    if json {
        return print_json(&classification);
    }
    println!("category: {}", classification.category);
    println!("themes:   {}", classification.themes.join(", "));
    println!("keywords: {}", classification.keywords.join(", "));
    Ok(())
}

fn query(
    finder: &VerseFinder,
    config: &Config,
    command: Command,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let verses = match command {
        Command::Import { file, batch_size } => {
            let pairs = import::read_json(&file)?;
            info!("Read {} entries from {}", pairs.len(), file.display());
            let batch_size = batch_size.unwrap_or(config.import_batch_size);
            let report = import::load_verses(finder.store(), &pairs, batch_size)?;
            if json {
                return print_json(&report);
            }
            println!(
                "stored {}, skipped {} duplicates, rejected {}",
                report.stored, report.skipped, report.rejected
            );
            return Ok(());
        }
        Command::Search {
            query,
            category,
            testament,
            limit,
        } => {
            let options = SearchOptions {
                category,
                testament,
                limit,
            };
            finder.search_by_keywords(&query, &options)?
        }
        Command::Themes { themes, limit } => finder.search_by_themes(&themes[..], limit)?,
        Command::Emotion { emotion, limit } => finder.verses_for_emotion(&emotion, limit)?,
        Command::Counsel {
            topic,
            urgency,
            limit,
        } => finder.verses_for_counseling(&topic, urgency, limit)?,
        Command::Popular { limit } => finder.popular_verses(limit)?,
        Command::Random { category, limit } => finder.random_verses(category, limit)?,
        Command::Category { category, limit } => finder.verses_in_category(category, limit)?,
        Command::Verse { reference } => match finder.verse(&reference)? {
            Some(verse) => vec![verse],
            None => return Err(format!("{} is not in the store", reference.trim()).into()),
        },
        Command::Stats => {
            let stats = finder.stats()?;
            if json {
                return print_json(&stats);
            }
            println!(
                "{} verses ({} Old Testament, {} New Testament)",
                stats.total_verses, stats.old_testament, stats.new_testament
            );
            for c in &stats.categories {
                println!("  {:<14} {}", c.category.as_str(), c.count);
            }
            println!("top themes:");
            for t in &stats.top_themes {
                println!(
                    "  {:<6} {} verses, used {} times",
                    t.theme, t.verse_count, t.usage_count
                );
            }
            return Ok(());
        }
        Command::Options => {
            let facets = finder.options()?;
            if json {
                return print_json(&facets);
            }
            let categories: Vec<&str> = facets.categories.iter().map(Category::as_str).collect();
            println!("categories: {}", categories.join(", "));
            println!("themes:     {}", facets.themes.join(", "));
            println!("books:      {}", facets.books.join(", "));
            println!("emotions:   {}", facets.emotions.join(", "));
            println!("topics:     {}", facets.counseling_topics.join(", "));
            return Ok(());
        }
        Command::Parse { reference } => return parse(&reference, json),
        Command::Classify { text } => return tag(&text, json),
    };

    if json {
        return print_json(&verses);
    }
    print_verses(&verses)?;
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_verses(verses: &[VerseSummary]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if verses.is_empty() {
        writeln!(out, "No verses found.")?;
    }
    for v in verses {
        writeln!(out, "{} {}", v.reference, v.text)?;
        writeln!(
            out,
            "    {} | {} | used {} times",
            v.category,
            v.themes.join(", "),
            v.usage_count
        )?;
    }
    Ok(())
}
