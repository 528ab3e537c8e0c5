use std::cmp;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;
use wordbook_rs::entry::normalize_word;
use wordbook_rs::{
    HistoryTracker, JsonFileStore, KeyValueStore, SearchConfig, SearchHit, SearchStrategy,
    SqliteRepository, WordEntry, WordRepository, parse_batch,
};

#[derive(Parser, Debug)]
#[command(name = "wordbook-rs", about = "Search and grow a personal dictionary", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// SQLite database holding the words.
    #[arg(long, global = true, env = "WORDBOOK_DB")]
    db: Option<PathBuf>,

    /// File holding local state such as the recent-search history.
    #[arg(long, global = true, env = "WORDBOOK_STATE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add words from a JSON object or array of {"word", "definition"} objects.
    Add {
        /// JSON text, `@path` to read a file, or `-` to read stdin.
        input: String,
    },
    /// Search for words. An empty query shows recently viewed words.
    Search {
        query: String,
        /// `substring-match` or `positional-similarity`.
        #[arg(short, long, default_value = "substring-match")]
        mode: SearchStrategy,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = wordbook_rs::DEFAULT_LIMIT)]
        limit: usize,
    },
    /// List the most recently added words.
    Recent {
        #[arg(short, long, default_value_t = wordbook_rs::DEFAULT_LIMIT)]
        limit: usize,
    },
    /// List every word alphabetically.
    All,
    /// Show one entry and remember it in the recent-search history.
    Show {
        /// Word or entry ID to display.
        query: String,
        /// Interpret the query as an entry ID instead of a word.
        #[arg(long)]
        by_id: bool,
    },
    /// Show recently viewed words.
    History {
        /// Forget the recorded history.
        #[arg(long)]
        clear: bool,
    },
    /// Delete an entry by ID.
    Remove { id: String },
    /// Serve the JSON API over HTTP.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, env = "WORDBOOK_ADDR", default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Shared secret expected in the `x-admin-key` header for writes.
        #[arg(long, env = "ADMIN_KEY", hide_env_values = true)]
        admin_key: Option<String>,
        /// Search strategy used by /api/search and /api/suggest by default.
        #[arg(long, default_value = "substring-match")]
        mode: SearchStrategy,
        /// Keep words in memory instead of the SQLite database.
        #[arg(long)]
        memory: bool,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    let history = HistoryTracker::new(JsonFileStore::new(
        cli.state.clone().unwrap_or_else(JsonFileStore::default_path),
    ));
    match cli.command {
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            admin_key,
            mode,
            memory,
        } => handle_serve(addr, admin_key, mode, memory, cli.db),
        Command::Add { input } => handle_add(&open_repository(cli.db)?, &input, cli.json),
        Command::Search { query, mode, limit } => {
            let repo = open_repository(cli.db)?;
            if query.trim().is_empty() {
                return handle_history(&repo, &history, false, cli.json);
            }
            handle_search(&repo, &query, SearchConfig::new(mode).with_limit(limit), cli.json)
        }
        Command::Recent { limit } => {
            let rows = open_repository(cli.db)?.list_recent(cmp::max(1, limit))?;
            emit_entries("Recently added words", &rows, cli.json)
        }
        Command::All => {
            let rows = open_repository(cli.db)?.list_all()?;
            emit_entries("All words", &rows, cli.json)
        }
        Command::Show { query, by_id } => {
            handle_show(&open_repository(cli.db)?, &history, &query, by_id, cli.json)
        }
        Command::History { clear } => {
            handle_history(&open_repository(cli.db)?, &history, clear, cli.json)
        }
        Command::Remove { id } => handle_remove(&open_repository(cli.db)?, &id, cli.json),
    }
}

fn init_tracing(command: &Command) {
    let default_directives = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "wordbook_rs=info,tower_http=info",
        _ => "wordbook_rs=warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn open_repository(path: Option<PathBuf>) -> Result<SqliteRepository, Box<dyn Error>> {
    let path = path.unwrap_or_else(wordbook_rs::default_database_path);
    Ok(SqliteRepository::open(path)?)
}

#[cfg(feature = "web")]
fn handle_serve(
    addr: std::net::SocketAddr,
    admin_key: Option<String>,
    mode: SearchStrategy,
    memory: bool,
    db: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    use std::sync::Arc;
    use wordbook_rs::MemoryRepository;
    use wordbook_rs::web::{WebConfig, serve};

    let repository: Arc<dyn WordRepository> = if memory {
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(open_repository(db)?)
    };
    let config = WebConfig {
        addr,
        admin_key: admin_key.filter(|key| !key.trim().is_empty()),
        search: SearchConfig::new(mode),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, repository))?;
    Ok(())
}

fn read_input(input: &str) -> Result<String, Box<dyn Error>> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    if let Some(path) = input.strip_prefix('@') {
        return fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {path:?}: {err}").into());
    }
    Ok(input.to_string())
}

fn handle_add(repo: &dyn WordRepository, input: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let entries = parse_batch(&read_input(input)?)?;
    let outcome = repo.create(&entries)?;

    if as_json {
        let payload = json!({ "submitted": entries.len(), "inserted": outcome.inserted });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if outcome.inserted == 0 {
        println!("No new words added: all provided words already exist in your dictionary.");
    } else {
        let noun = if outcome.inserted == 1 { "word" } else { "words" };
        println!("Added {} {noun} to dictionary.", outcome.inserted);
    }
    Ok(())
}

fn handle_search(
    repo: &dyn WordRepository,
    query: &str,
    config: SearchConfig,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let hits = repo.search(query, &config)?;

    if as_json {
        let payload = json!({
            "mode": config.strategy,
            "query": query,
            "limit": config.limit,
            "results": hits.iter().map(|hit| {
                json!({
                    "id": hit.entry.id,
                    "word": hit.entry.word,
                    "definition": hit.entry.definition,
                    "created_at": hit.entry.created_at,
                    "score": hit.score,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_search_table(query, &hits);
    }
    Ok(())
}

fn handle_show<S: KeyValueStore>(
    repo: &dyn WordRepository,
    history: &HistoryTracker<S>,
    query: &str,
    by_id: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let entry = if by_id {
        repo.get(query.trim())?
            .ok_or_else(|| format!("No entry found for ID {query:?}"))?
    } else {
        let needle = normalize_word(query);
        let exact: Vec<WordEntry> = repo
            .list_all()?
            .into_iter()
            .filter(|entry| entry.word == needle)
            .collect();
        let candidates = if exact.is_empty() {
            repo.search(query, &SearchConfig::new(SearchStrategy::SubstringMatch))?
                .into_iter()
                .map(|hit| hit.entry)
                .collect()
        } else {
            exact
        };
        match candidates.len() {
            0 => return Err(format!("No words found for {query:?}").into()),
            1 => candidates.into_iter().next().ok_or("empty result")?,
            _ => {
                if !as_json {
                    println!("Several words match; pick one with `show --by-id <ID>`.");
                }
                return emit_entries(
                    &format!("{} words found", candidates.len()),
                    &candidates,
                    as_json,
                );
            }
        }
    };
    history.record_visit(&entry.id);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(&entry);
    }
    Ok(())
}

fn handle_history<S: KeyValueStore>(
    repo: &dyn WordRepository,
    history: &HistoryTracker<S>,
    clear: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if clear {
        history.clear();
        if !as_json {
            println!("Search history cleared.");
            return Ok(());
        }
    }
    let rows = history.resolve(repo)?;
    if rows.is_empty() && !as_json {
        println!("No search history yet. Search for a word to get started.");
        return Ok(());
    }
    emit_entries("Recently searched words", &rows, as_json)
}

fn handle_remove(repo: &dyn WordRepository, id: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let removed = repo.delete(id)?;
    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "id": id, "removed": removed }))?
        );
        return Ok(());
    }
    if !removed {
        return Err(format!("No entry found for ID {id:?}").into());
    }
    println!("Removed entry {id}.");
    Ok(())
}

fn emit_entries(title: &str, rows: &[WordEntry], as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else {
        print_entry_table(title, rows);
    }
    Ok(())
}

fn print_entry_table(title: &str, rows: &[WordEntry]) {
    if rows.is_empty() {
        println!("No words found.");
        return;
    }
    let width = rows
        .iter()
        .map(|entry| entry.word.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{title}:");
    println!("{:<width$}  {:<36}  {}", "WORD", "ID", "DEFINITION", width = width);
    println!("{:-<width$}  {:-<36}  {}", "", "", "----------", width = width);
    for entry in rows {
        println!(
            "{:<width$}  {:<36}  {}",
            entry.word,
            entry.id,
            one_line(&entry.definition, 60),
            width = width
        );
    }
}

fn print_search_table(query: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No words found for \"{query}\". Try a different search or add a new word.");
        return;
    }
    let width = hits
        .iter()
        .map(|hit| hit.entry.word.chars().count())
        .max()
        .unwrap_or(query.len())
        .max("WORD".len());
    let noun = if hits.len() == 1 { "word" } else { "words" };
    println!("{} {noun} found for \"{query}\":", hits.len());
    println!("{:<width$}  {:>5}  {}", "WORD", "SCORE", "DEFINITION", width = width);
    println!("{:-<width$}  {:->5}  {}", "", "", "----------", width = width);
    for hit in hits {
        let score = hit
            .score
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<width$}  {:>5}  {}",
            hit.entry.word,
            score,
            one_line(&hit.entry.definition, 60),
            width = width
        );
    }
}

fn print_entry(entry: &WordEntry) {
    println!("Word: {}", entry.word);
    println!("ID: {}", entry.id);
    println!("Added: {}", entry.created_at.format("%Y-%m-%d"));
    render_markdown_block("Definition", &entry.definition);
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
