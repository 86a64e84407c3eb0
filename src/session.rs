//! Round and session state for the guessing game.
//!
//! All mutable game state lives in [`GameSession`]; the embedding table it
//! holds stays read-only. The only writers are [`GameSession::next_round`]
//! (round transition) and [`GameSession::guess`] (score update), so every
//! other consumer sees a consistent snapshot through the accessors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::embeddings::EmbeddingTable;
use crate::embeddings::scale::estimate_scale;

/// Fixed length of a guessing round.
pub const ROUND_DURATION: Duration = Duration::from_secs(10);

/// Rows eligible as prompts and as the scale-sampling universe.
///
/// Intersects an allowed wordlist with the token index; words absent from
/// the table are skipped. Row order follows the table, not the list.
pub fn build_candidate_pool(table: &EmbeddingTable, words: &[String]) -> Vec<usize> {
    let allowed: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
    (0..table.len())
        .filter(|&row| {
            table
                .token(row)
                .is_some_and(|t| allowed.contains(&t.to_lowercase()))
        })
        .collect()
}

/// One timed round against a fixed prompt word.
#[derive(Debug, Clone)]
pub struct Round {
    prompt: usize,
    scale: Option<f64>,
    best: Option<f64>,
    deadline: Instant,
}

impl Round {
    /// Row of the prompt word.
    pub fn prompt(&self) -> usize {
        self.prompt
    }

    /// Sampled normalization scale for the ratio bar, if one exists.
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }

    /// Best (largest) distance guessed this round.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn time_left(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_over(&self) -> bool {
        self.time_left().is_zero()
    }
}

/// One scored guess.
#[derive(Debug, Clone, Copy)]
pub struct GuessReading {
    /// Row the guess resolved to.
    pub row: usize,
    /// Distance from the prompt word.
    pub distance: f64,
    /// Distance clamped to `[0, 1]` against the round scale.
    pub ratio: Option<f64>,
    /// Whether this guess raised the round best.
    pub round_best: bool,
}

pub struct GameSession<R: Rng> {
    table: Arc<EmbeddingTable>,
    pool: Option<Vec<usize>>,
    rng: R,
    round: Option<Round>,
    best: Option<f64>,
}

impl<R: Rng> GameSession<R> {
    pub fn new(table: Arc<EmbeddingTable>, pool: Option<Vec<usize>>, rng: R) -> Self {
        let pool = pool.filter(|p| !p.is_empty());
        Self {
            table,
            pool,
            rng,
            round: None,
            best: None,
        }
    }

    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    /// All-time best distance across rounds.
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Round transition: pick a fresh prompt, estimate its display scale,
    /// and arm the deadline. Returns `None` for an empty table.
    pub fn next_round(&mut self) -> Option<&Round> {
        let prompt = self.pick_prompt()?;
        let scale = estimate_scale(&self.table, self.pool.as_deref(), prompt, &mut self.rng);
        debug!(
            prompt = self.table.token(prompt).unwrap_or("?"),
            scale, "starting round"
        );
        self.round = Some(Round {
            prompt,
            scale,
            best: None,
            deadline: Instant::now() + ROUND_DURATION,
        });
        self.round.as_ref()
    }

    fn pick_prompt(&mut self) -> Option<usize> {
        match &self.pool {
            Some(pool) => Some(pool[self.rng.gen_range(0..pool.len())]),
            None if self.table.is_empty() => None,
            None => Some(self.rng.gen_range(0..self.table.len())),
        }
    }

    /// Score update: resolve the guess and raise the round/all-time bests.
    ///
    /// `None` when no round is active, the round has expired, or the word
    /// is not in the table.
    pub fn guess(&mut self, word: &str) -> Option<GuessReading> {
        let round = self.round.as_mut()?;
        if round.is_over() {
            return None;
        }
        let row = self.table.lookup(word)?;
        let distance = self.table.distance(round.prompt, row).ok()?;
        let ratio = round
            .scale
            .filter(|s| *s > 0.0)
            .map(|s| (distance / s).clamp(0.0, 1.0));

        let round_best = round.best.is_none_or(|b| distance > b);
        if round_best {
            round.best = Some(distance);
        }
        if self.best.is_none_or(|b| distance > b) {
            self.best = Some(distance);
        }
        Some(GuessReading {
            row,
            distance,
            ratio,
            round_best,
        })
    }

    /// Close the active round and yield its best distance, if any guess
    /// landed.
    pub fn finish_round(&mut self) -> Option<f64> {
        self.round.take().and_then(|round| round.best)
    }

    #[cfg(test)]
    fn expire_round(&mut self) {
        if let Some(round) = self.round.as_mut() {
            round.deadline = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn table() -> Arc<EmbeddingTable> {
        Arc::new(
            EmbeddingTable::new(
                vec!["origin".into(), "Near".into(), "far".into()],
                2,
                vec![0.0, 0.0, 1.0, 0.0, 3.0, 4.0],
            )
            .unwrap(),
        )
    }

    fn session(pool: Option<Vec<usize>>) -> GameSession<ChaCha8Rng> {
        GameSession::new(table(), pool, ChaCha8Rng::seed_from_u64(11))
    }

    #[test]
    fn prompts_come_from_the_pool() {
        let mut s = session(Some(vec![2]));
        for _ in 0..5 {
            let round = s.next_round().unwrap();
            assert_eq!(round.prompt(), 2);
        }
    }

    #[test]
    fn empty_pool_falls_back_to_the_whole_table() {
        let mut s = session(Some(Vec::new()));
        let prompt = s.next_round().unwrap().prompt();
        assert!(prompt < 3);
    }

    #[test]
    fn guesses_update_round_and_all_time_bests() {
        let mut s = session(Some(vec![0]));
        s.next_round().unwrap();

        let near = s.guess("near").unwrap();
        assert_eq!(near.distance, 1.0);
        assert!(near.round_best);

        let far = s.guess("FAR").unwrap();
        assert_eq!(far.distance, 5.0);
        assert!(far.round_best);
        assert_eq!(s.best(), Some(5.0));

        let again = s.guess("near").unwrap();
        assert!(!again.round_best);
        assert_eq!(s.round().unwrap().best(), Some(5.0));
    }

    #[test]
    fn unknown_words_and_missing_rounds_read_absent() {
        let mut s = session(None);
        assert!(s.guess("far").is_none(), "no active round");
        s.next_round().unwrap();
        assert!(s.guess("not-a-word").is_none());
    }

    #[test]
    fn expired_rounds_reject_guesses() {
        let mut s = session(Some(vec![0]));
        s.next_round().unwrap();
        s.expire_round();
        assert!(s.guess("far").is_none());
    }

    #[test]
    fn finish_round_yields_the_round_best_once() {
        let mut s = session(Some(vec![0]));
        s.next_round().unwrap();
        s.guess("far").unwrap();
        assert_eq!(s.finish_round(), Some(5.0));
        assert!(s.round().is_none());
        assert_eq!(s.finish_round(), None);
        // All-time best survives the round transition.
        assert_eq!(s.best(), Some(5.0));
    }

    #[test]
    fn ratio_is_clamped_against_the_round_scale() {
        let mut s = session(Some(vec![0, 1]));
        // Force prompt 0; pool scale is d(0,1) = 1.
        while s.next_round().unwrap().prompt() != 0 {}
        let far = s.guess("far").unwrap();
        assert_eq!(s.round().unwrap().scale(), Some(1.0));
        assert_eq!(far.ratio, Some(1.0), "5.0 clamps to 1.0");
    }

    #[test]
    fn pool_intersection_skips_unknown_words() {
        let t = table();
        let words = vec!["FAR".to_string(), "origin".to_string(), "absent".to_string()];
        assert_eq!(build_candidate_pool(&t, &words), vec![0, 2]);
        assert!(build_candidate_pool(&t, &[]).is_empty());
    }
}
