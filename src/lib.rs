pub mod embeddings;
pub mod leaderboard;
pub mod prepare;
pub mod session;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use console::style;
use rand::rngs::ThreadRng;
use tracing::info;

use embeddings::loader::PREFERRED_SET;
use embeddings::{EmbeddingTable, TableError, load_table};
use leaderboard::Leaderboard;
use session::{GameSession, ROUND_DURATION, build_candidate_pool};

const LEADERBOARD_FILE: &str = "leaderboard.json";
const DEFAULT_WORDLIST: &str = "top20k.json";

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "farword",
    version,
    long_version = long_version(),
    about = "Word-distance guessing game over GloVe embeddings"
)]
pub struct Cli {
    /// Directory holding embedding sets and game data (defaults to platform data dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play timed rounds on stdin
    Play {
        /// Player name for leaderboard submission
        #[arg(long)]
        name: Option<String>,

        /// Restrict prompts to words from this JSON wordlist
        #[arg(long)]
        wordlist: Option<PathBuf>,
    },
    /// Print the distance between two words
    Distance { prompt: String, guess: String },
    /// Convert a GloVe text file into a packed embedding set
    PrepareEmbeddings {
        /// GloVe text input: token followed by components, one row per line
        input: PathBuf,

        /// Output set directory (defaults to <data-dir>/glove50)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Filter a frequency-ordered wordlist into the playable candidate list
    PrepareWordlist {
        input: PathBuf,

        /// Output file (defaults to <data-dir>/wordlists/top20k.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the top leaderboard entries
    Leaderboard,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::Play { name, wordlist } => play(&data_dir, name, wordlist).await,
        Commands::Distance { prompt, guess } => distance(&data_dir, &prompt, &guess).await,
        Commands::PrepareEmbeddings { input, out } => {
            let out = out.unwrap_or_else(|| data_dir.join(PREFERRED_SET));
            let summary = prepare::convert_glove(&input, &out)?;
            println!(
                "wrote {} tokens x {} dims to {}",
                summary.tokens,
                summary.dims,
                out.display()
            );
            Ok(())
        }
        Commands::PrepareWordlist { input, out } => {
            let out = out.unwrap_or_else(|| data_dir.join("wordlists").join(DEFAULT_WORDLIST));
            let kept = prepare::filter_wordlist(&input, &out)?;
            println!("wrote {kept} words to {}", out.display());
            Ok(())
        }
        Commands::Leaderboard => show_leaderboard(&data_dir),
    }
}

async fn open_table(data_dir: &Path) -> Result<EmbeddingTable> {
    match load_table(data_dir).await {
        Ok(table) => {
            info!(
                tokens = table.len(),
                dims = table.dims(),
                "embedding table ready"
            );
            Ok(table)
        }
        Err(err @ TableError::Unavailable { .. }) => Err(anyhow!(err)).context(
            "embeddings are not available yet; run `farword prepare-embeddings <glove.txt>` first",
        ),
        Err(err) => Err(err.into()),
    }
}

async fn distance(data_dir: &Path, prompt: &str, guess: &str) -> Result<()> {
    let table = open_table(data_dir).await?;
    let a = table
        .lookup(prompt)
        .ok_or_else(|| anyhow!("{prompt:?} is not in the embedding table"))?;
    let b = table
        .lookup(guess)
        .ok_or_else(|| anyhow!("{guess:?} is not in the embedding table"))?;
    println!("{:.3}", table.distance(a, b)?);
    Ok(())
}

fn show_leaderboard(data_dir: &Path) -> Result<()> {
    let board = Leaderboard::new(data_dir.join(LEADERBOARD_FILE));
    let entries = board.load()?;
    if entries.is_empty() {
        println!("no scores yet");
        return Ok(());
    }
    for (rank, entry) in entries.iter().take(10).enumerate() {
        println!("{:>2}. {:<24} {:.3}", rank + 1, entry.name, entry.best);
    }
    Ok(())
}

fn load_pool(
    table: &EmbeddingTable,
    data_dir: &Path,
    wordlist: Option<PathBuf>,
) -> Result<Option<Vec<usize>>> {
    let path = match wordlist {
        Some(path) => path,
        None => {
            let default = data_dir.join("wordlists").join(DEFAULT_WORDLIST);
            if !default.is_file() {
                return Ok(None);
            }
            default
        }
    };
    let bytes =
        std::fs::read(&path).with_context(|| format!("reading wordlist {}", path.display()))?;
    let words: Vec<String> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing wordlist {}", path.display()))?;
    let pool = build_candidate_pool(table, &words);
    info!(words = words.len(), pool = pool.len(), "candidate pool built");
    Ok(if pool.is_empty() { None } else { Some(pool) })
}

async fn play(data_dir: &Path, name: Option<String>, wordlist: Option<PathBuf>) -> Result<()> {
    let table = Arc::new(open_table(data_dir).await?);
    let pool = load_pool(&table, data_dir, wordlist)?;
    let board = Leaderboard::new(data_dir.join(LEADERBOARD_FILE));
    let mut game = GameSession::new(Arc::clone(&table), pool, rand::thread_rng());

    println!(
        "Find the word least related to the prompt. {}s per round.",
        ROUND_DURATION.as_secs()
    );
    println!("Type guesses; 'next' starts a new round, 'quit' stops.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    'game: loop {
        let Some(round) = game.next_round() else {
            bail!("the embedding table is empty");
        };
        let prompt = table.token(round.prompt()).unwrap_or("?").to_string();
        println!("\nPrompt: {}", style(&prompt).bold().cyan());

        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else {
                break 'game;
            };
            let line = line?;
            let word = line.trim();
            match word {
                "" => continue,
                "quit" | "exit" => break 'game,
                "next" => break,
                _ => {}
            }
            if game.round().is_none_or(session::Round::is_over) {
                println!("{}", style("Round over.").dim());
                break;
            }
            match game.guess(word) {
                Some(reading) => {
                    let bar = reading
                        .ratio
                        .map(|r| format!("  [{}]", ratio_bar(r)))
                        .unwrap_or_default();
                    let marker = if reading.round_best { "  *best*" } else { "" };
                    println!("  {:.3} units{bar}{marker}", reading.distance);
                }
                None => println!("  {} is not in the dictionary", style(word).italic()),
            }
        }
        submit_round(&board, name.as_deref(), &mut game)?;
    }

    submit_round(&board, name.as_deref(), &mut game)?;
    if let Some(best) = game.best() {
        println!("All-time best this session: {best:.3}");
    }
    Ok(())
}

fn submit_round(
    board: &Leaderboard,
    name: Option<&str>,
    game: &mut GameSession<ThreadRng>,
) -> Result<()> {
    let Some(best) = game.finish_round() else {
        return Ok(());
    };
    println!("Round best: {best:.3}");
    if let Some(name) = name {
        let entries = board.submit(name, best)?;
        if let Some(top) = entries.first() {
            println!("Leader: {} ({:.3})", top.name, top.best);
        }
    }
    Ok(())
}

fn ratio_bar(ratio: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((ratio * WIDTH as f64).round() as usize).min(WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

/// Package version plus the build timestamp when the build script emitted
/// one.
fn long_version() -> String {
    match option_env!("VERGEN_BUILD_TIMESTAMP") {
        Some(ts) => format!("{} (built {ts})", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "farword", "farword")
        .expect("project dirs available")
        .data_dir()
        .to_path_buf()
}
