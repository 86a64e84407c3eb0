//! Offline dataset preparation.
//!
//! Converts a GloVe text file into the packed embedding-set layout the
//! loader consumes, and filters a frequency-ordered wordlist into the
//! playable candidate list.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::embeddings::loader::{META_FILE, TOKENS_FILE, VECTORS_FILE};
use crate::embeddings::{SetMeta, VectorFormat};

/// Most-frequent entries dropped from the head of a frequency-ordered list.
const WORDLIST_HEAD_SKIP: usize = 100;
/// Words shorter than this are dropped.
const WORDLIST_MIN_CHARS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct ConvertSummary {
    pub tokens: usize,
    pub dims: usize,
}

/// Convert a GloVe text file (`token c1 c2 ... cD` per line) into
/// `tokens.json` + `embeddings.bin` + `meta.json` under `out_dir`.
///
/// The first row fixes the dimensionality; a ragged row aborts the
/// conversion. Vectors stream straight to the blob, so the input is never
/// held in memory whole.
pub fn convert_glove(input: &Path, out_dir: &Path) -> Result<ConvertSummary> {
    let file = File::open(input)
        .with_context(|| format!("opening GloVe input {}", input.display()))?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let bin_path = out_dir.join(VECTORS_FILE);
    let mut blob = BufWriter::new(
        File::create(&bin_path).with_context(|| format!("creating {}", bin_path.display()))?,
    );

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {pos} tokens converted")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut tokens: Vec<String> = Vec::new();
    let mut dims = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_ascii_whitespace();
        let Some(token) = parts.next() else { continue };
        let mut components = 0usize;
        for part in parts {
            let value: f32 = part
                .parse()
                .with_context(|| format!("line {}: bad component {part:?}", line_no + 1))?;
            blob.write_all(&value.to_le_bytes())?;
            components += 1;
        }
        if dims == 0 {
            if components == 0 {
                bail!("line {}: no vector components", line_no + 1);
            }
            dims = components;
        } else if components != dims {
            bail!(
                "line {}: {components} components, expected {dims}",
                line_no + 1
            );
        }
        tokens.push(token.to_string());
        progress.inc(1);
    }
    blob.flush().context("flushing vector blob")?;
    progress.finish_and_clear();

    if tokens.is_empty() {
        bail!("no embedding rows in {}", input.display());
    }

    let tokens_path = out_dir.join(TOKENS_FILE);
    let mut out = BufWriter::new(File::create(&tokens_path)?);
    serde_json::to_writer(&mut out, &tokens)
        .with_context(|| format!("writing {}", tokens_path.display()))?;
    out.flush()?;

    let meta = SetMeta {
        dims,
        count: tokens.len(),
        format: VectorFormat::Fp32,
    };
    let meta_path = out_dir.join(META_FILE);
    let mut out = BufWriter::new(File::create(&meta_path)?);
    serde_json::to_writer(&mut out, &meta)
        .with_context(|| format!("writing {}", meta_path.display()))?;
    out.flush()?;

    info!(tokens = tokens.len(), dims, out = %out_dir.display(), "embedding set written");
    Ok(ConvertSummary {
        tokens: tokens.len(),
        dims,
    })
}

/// Filter a frequency-ordered wordlist into the playable candidate list
/// and write it as a JSON string array. Returns the number of kept words.
pub fn filter_wordlist(input: &Path, output: &Path) -> Result<usize> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("reading wordlist {}", input.display()))?;
    let words = filter_words(text.lines());

    if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    let mut out = BufWriter::new(File::create(output)?);
    serde_json::to_writer(&mut out, &words)
        .with_context(|| format!("writing {}", output.display()))?;
    out.flush()?;

    info!(kept = words.len(), out = %output.display(), "wordlist written");
    Ok(words.len())
}

/// Drop the 100 most frequent entries (the list head), short words, blanks
/// and duplicates, preserving first-seen order.
fn filter_words<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut words: Vec<String> = lines
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() > WORDLIST_HEAD_SKIP {
        words.drain(..WORDLIST_HEAD_SKIP);
    }
    let mut seen = HashSet::new();
    words.retain(|w| w.chars().count() >= WORDLIST_MIN_CHARS && seen.insert(w.clone()));
    words
}
