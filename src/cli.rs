use std::cmp;
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt};
use clap::{Parser, Subcommand};
use hanzigloss_rs::{
    AppConfig, BinaryWriter, CancelToken, DictionaryLoader, DictionarySnapshot, DictionarySource,
    FormatVersion, FsStorage, SearchService, SharedDictionary, WordRef, logging,
};
use serde_json::json;
use tracing::info;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "hanzigloss-rs", about = "Search Hanzi / Pinyin / English dictionaries", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a folder of XML word lists into a binary dictionary.
    Import {
        /// Folder holding one or more XML word lists.
        #[arg(long)]
        xml: PathBuf,
        /// Binary dictionary to write.
        #[arg(long)]
        out: PathBuf,
        /// Container version to emit (0-3). Defaults to the newest.
        #[arg(long)]
        format_version: Option<u32>,
    },
    /// Rank dictionary words against a query.
    Search {
        /// Binary dictionary to search.
        #[arg(long)]
        dict: PathBuf,
        /// Hanzi, pinyin or English terms.
        #[arg(required = true)]
        query: Vec<String>,
        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,
        /// Size of the search worker pool.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Show the full entry for a headword or traditional spelling.
    Show {
        #[arg(long)]
        dict: PathBuf,
        headword: String,
    },
    /// List words whose headword contains, or is part of, the given one.
    Similar {
        #[arg(long)]
        dict: PathBuf,
        headword: String,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Summarize a binary dictionary.
    Stats {
        #[arg(long)]
        dict: PathBuf,
        /// Number of popular index words to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    logging::init(&config.log_filter);

    match cli.command {
        Command::Import {
            xml,
            out,
            format_version,
        } => handle_import(&config, &xml, &out, format_version, cli.json),
        Command::Search {
            dict,
            query,
            limit,
            workers,
        } => handle_search(config, &dict, &query.join(" "), limit, workers, cli.json),
        Command::Show { dict, headword } => handle_show(&config, &dict, &headword, cli.json),
        Command::Similar {
            dict,
            headword,
            limit,
        } => handle_similar(&config, &dict, &headword, limit, cli.json),
        Command::Stats { dict, top } => handle_stats(&config, &dict, top, cli.json),
    }
}

fn loader(config: &AppConfig) -> DictionaryLoader {
    DictionaryLoader::new(Arc::new(FsStorage::new(".")), config.load.clone())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn load(loader: &DictionaryLoader, source: DictionarySource) -> Result<DictionarySnapshot, Box<dyn Error>> {
    loader
        .load(&source, &CancelToken::new())?
        .complete()
        .ok_or_else(|| "Dictionary load was cancelled".into())
}

fn load_binary(config: &AppConfig, dict: &Path) -> Result<DictionarySnapshot, Box<dyn Error>> {
    load(&loader(config), DictionarySource::Binary(path_arg(dict)))
}

fn handle_import(
    config: &AppConfig,
    xml: &Path,
    out: &Path,
    format_version: Option<u32>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let loader = loader(config);
    let snapshot = load(&loader, DictionarySource::XmlFolder(path_arg(xml)))?;
    let version = match format_version {
        Some(raw) => FormatVersion::from_raw(raw)?,
        None => FormatVersion::LATEST,
    };
    let writer = BinaryWriter::new()
        .with_version(version)
        .with_part_size(config.load.part_size);
    let mut stream = loader.storage().open_write(&path_arg(out))?;
    writer.write(&snapshot, &mut stream)?;
    info!(out = %out.display(), records = snapshot.len(), "imported dictionary");

    if as_json {
        let payload = json!({
            "out": path_arg(out),
            "version": version.raw(),
            "records": snapshot.len(),
            "meanings": snapshot.meaning_count(),
            "index_words": snapshot.index().map_or(0, |index| index.len()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Wrote {} words (format v{}) to {}",
            snapshot.len(),
            version.raw(),
            out.display()
        );
    }
    Ok(())
}

fn handle_search(
    mut config: AppConfig,
    dict: &Path,
    query: &str,
    limit: Option<usize>,
    workers: Option<usize>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if query.trim().is_empty() {
        return Err("Search query cannot be empty".into());
    }
    if let Some(limit) = limit {
        config.search.max_results = cmp::max(1, limit);
    }
    if let Some(workers) = workers {
        config.search.worker_count = cmp::max(1, workers);
    }
    // a one-shot query gains nothing from warming up
    config.search.warmup = false;

    let snapshot = load_binary(&config, dict)?;
    let mut service = SearchService::new(SharedDictionary::with_snapshot(snapshot), config.search.clone());
    service.start()?;
    let results = service.search(query, SEARCH_TIMEOUT)?;
    service.stop();

    if as_json {
        let payload = json!({
            "query": query,
            "limit": config.search.max_results,
            "elapsed_ms": results.elapsed.as_secs_f64() * 1000.0,
            "results": results.words().map(|(relevance, word)| {
                json!({
                    "relevance": relevance,
                    "hanzi": word.headword(),
                    "traditional": word.traditional(),
                    "pinyin": word.thumb_pronunciation(),
                    "translation": word.thumb_translation(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let rows: Vec<_> = results.words().collect();
        print_search_table(query, &rows);
    }
    Ok(())
}

fn handle_show(config: &AppConfig, dict: &Path, headword: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let snapshot = load_binary(config, dict)?;
    let word = snapshot
        .find(headword)
        .ok_or_else(|| format!("No entry found for {headword:?}"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&word_to_json(word))?);
    } else {
        print_word(word);
    }
    Ok(())
}

fn handle_similar(
    config: &AppConfig,
    dict: &Path,
    headword: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let snapshot = load_binary(config, dict)?;
    let word = snapshot
        .find(headword)
        .ok_or_else(|| format!("No entry found for {headword:?}"))?;
    let mut similar = snapshot.similar_words(word.index());
    similar.truncate(cmp::max(1, limit));

    if as_json {
        let payload = json!({
            "headword": word.headword(),
            "limit": limit,
            "results": similar.iter().map(|other| {
                json!({
                    "hanzi": other.headword(),
                    "pinyin": other.thumb_pronunciation(),
                    "translation": other.thumb_translation(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_similar_table(word.headword(), &similar);
    }
    Ok(())
}

fn handle_stats(config: &AppConfig, dict: &Path, top: usize, as_json: bool) -> Result<(), Box<dyn Error>> {
    let version = File::open(dict)?.read_u32::<LittleEndian>()?;
    let snapshot = load_binary(config, dict)?;
    let stale = snapshot.stale_thumbs();
    let popular: Vec<(&str, u32)> = snapshot
        .index()
        .map(|index| {
            index
                .most_popular(top)
                .into_iter()
                .map(|entry| {
                    let entry = &index.entries()[entry];
                    (snapshot.string(entry.word), entry.match_count)
                })
                .collect()
        })
        .unwrap_or_default();

    if as_json {
        let payload = json!({
            "version": version,
            "records": snapshot.len(),
            "meanings": snapshot.meaning_count(),
            "strings": snapshot.string_count(),
            "arena_bytes": snapshot.arena().len(),
            "index_words": snapshot.index().map_or(0, |index| index.len()),
            "stale_thumbs": stale.len(),
            "popular": popular.iter().map(|(word, count)| {
                json!({"word": word, "matches": count})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Format version: {version}");
        println!("Words:          {}", snapshot.len());
        println!("Meanings:       {}", snapshot.meaning_count());
        println!("Strings:        {}", snapshot.string_count());
        println!("Arena bytes:    {}", snapshot.arena().len());
        println!(
            "Index words:    {}",
            snapshot.index().map_or(0, |index| index.len())
        );
        println!("Stale previews: {}", stale.len());
        print_popular_table(&popular);
    }
    Ok(())
}

fn width_of(text: &str) -> usize {
    text.chars().count()
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(width_of(text));
    format!("{text}{}", " ".repeat(fill))
}

fn print_search_table(query: &str, rows: &[(f32, WordRef<'_>)]) {
    if rows.is_empty() {
        println!("No words matched \"{query}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|(_, word)| width_of(word.headword()))
        .max()
        .unwrap_or(4)
        .max("HANZI".len());
    let pinyin_width = rows
        .iter()
        .map(|(_, word)| width_of(word.thumb_pronunciation()))
        .max()
        .unwrap_or(6)
        .max("PINYIN".len());
    println!("Matches for \"{query}\":");
    println!(
        "{:<9}  {}  {}  TRANSLATION",
        "RELEVANCE",
        pad("HANZI", width),
        pad("PINYIN", pinyin_width)
    );
    println!("{:-<9}  {:-<width$}  {:-<pinyin_width$}  -----------", "", "", "");
    for (relevance, word) in rows {
        println!(
            "{:<9.3}  {}  {}  {}",
            relevance,
            pad(word.headword(), width),
            pad(word.thumb_pronunciation(), pinyin_width),
            word.thumb_translation()
        );
    }
}

fn print_similar_table(headword: &str, rows: &[WordRef<'_>]) {
    if rows.is_empty() {
        println!("No words share characters with \"{headword}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|word| width_of(word.headword()))
        .max()
        .unwrap_or(4)
        .max("HANZI".len());
    println!("Words related to \"{headword}\":");
    println!("{}  TRANSLATION", pad("HANZI", width));
    println!("{:-<width$}  -----------", "");
    for word in rows {
        println!("{}  {}", pad(word.headword(), width), word.thumb_translation());
    }
}

fn print_popular_table(rows: &[(&str, u32)]) {
    if rows.is_empty() {
        return;
    }
    let width = rows
        .iter()
        .map(|(word, _)| width_of(word))
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("\nMost frequent translation words:");
    println!("{:<width$}  {}", "WORD", "MATCHES", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for (word, count) in rows {
        println!("{:<width$}  {}", word, count, width = width);
    }
}

fn word_to_json(word: WordRef<'_>) -> serde_json::Value {
    let meanings = word
        .meanings()
        .map(|meaning| {
            json!({
                "pinyin": meaning.pronunciations().collect::<Vec<_>>(),
                "translations": meaning.translations().collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "index": word.index(),
        "hanzi": word.headword(),
        "traditional": word.traditional(),
        "radicals": word.radicals(),
        "link": word.link(),
        "thumb_pinyin": word.thumb_pronunciation(),
        "thumb_translation": word.thumb_translation(),
        "letter_mask": word.letter_mask(),
        "meanings": meanings,
        "tags": word.tags().collect::<Vec<_>>(),
    })
}

fn print_word(word: WordRef<'_>) {
    println!("Hanzi: {}", word.headword());
    if !word.traditional().is_empty() {
        println!("Traditional: {}", word.traditional());
    }
    if !word.radicals().is_empty() {
        println!("Radicals: {}", word.radicals());
    }
    if !word.link().is_empty() {
        println!("Link: {}", word.link());
    }
    println!("Preview: {} | {}", word.thumb_pronunciation(), word.thumb_translation());

    println!("\nMeanings:");
    for (position, meaning) in word.meanings().enumerate() {
        let pinyin: Vec<_> = meaning.pronunciations().collect();
        let translations: Vec<_> = meaning.translations().collect();
        println!("- [{}] {}", position + 1, pinyin.join(", "));
        for translation in translations {
            println!("    {translation}");
        }
    }

    let tags: Vec<_> = word.tags().collect();
    if !tags.is_empty() {
        println!("\nTags: {}", tags.join(", "));
    }
}
