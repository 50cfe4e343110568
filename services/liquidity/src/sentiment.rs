//! Sentiment engine
//!
//! Each market carries a continuous sentiment score in [-2, 2] that rounds
//! to a 5-point level. Evolution sums externally registered event impacts
//! with a random drift scaled by the market's own volatility in [0, 1].
//! Sentiment never touches prices directly; level changes only cause the
//! bot manager to trade.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use types::ids::MarketId;
use types::sentiment::{MarketEvent, SentimentLevel};

/// Result of one evolution step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentShift {
    pub previous: SentimentLevel,
    pub current: SentimentLevel,
}

impl SentimentShift {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// One market's mood.
struct Mood {
    score: f64,
    /// Scale of the random drift per evolution step, in level units
    volatility: f64,
}

/// Per-market sentiment state.
pub struct SentimentEngine {
    moods: DashMap<MarketId, Mood>,
    pending: Mutex<HashMap<MarketId, Vec<MarketEvent>>>,
    /// Drift scale given to newly registered markets
    default_volatility: f64,
    rng: Mutex<ChaCha8Rng>,
}

impl SentimentEngine {
    pub fn new(default_volatility: f64, seed: u64) -> Self {
        Self {
            moods: DashMap::new(),
            pending: Mutex::new(HashMap::new()),
            default_volatility: default_volatility.clamp(0.0, 1.0),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<MarketId, Vec<MarketEvent>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a market at neutral sentiment and the default drift.
    pub fn register(&self, market_id: MarketId) {
        self.moods.entry(market_id).or_insert(Mood {
            score: 0.0,
            volatility: self.default_volatility,
        });
    }

    /// Adjust one tracked market's drift scale, clamped to [0, 1].
    pub fn set_volatility(&self, market_id: MarketId, volatility: f64) {
        if let Some(mut mood) = self.moods.get_mut(&market_id) {
            mood.volatility = volatility.clamp(0.0, 1.0);
        }
    }

    /// Queue an event; its impact lands on the next evolution step.
    pub fn add_event(&self, event: MarketEvent) {
        debug!(market_id = %event.market_id, impact = event.impact, "sentiment event queued");
        self.pending()
            .entry(event.market_id)
            .or_default()
            .push(event);
    }

    pub fn level(&self, market_id: MarketId) -> SentimentLevel {
        self.moods
            .get(&market_id)
            .map(|m| SentimentLevel::from_score(m.score))
            .unwrap_or(SentimentLevel::Neutral)
    }

    /// One evolution step: apply queued impacts plus bounded random drift,
    /// clamp, and report the level transition.
    pub fn evolve(&self, market_id: MarketId) -> Option<SentimentShift> {
        let mut mood = self.moods.get_mut(&market_id)?;
        let previous = SentimentLevel::from_score(mood.score);

        let impact: f64 = self
            .pending()
            .remove(&market_id)
            .map(|events| events.iter().map(|e| e.impact).sum())
            .unwrap_or(0.0);
        let drift = if mood.volatility > 0.0 {
            self.rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(-mood.volatility..=mood.volatility)
        } else {
            0.0
        };

        mood.score = (mood.score + impact + drift).clamp(-2.0, 2.0);
        let current = SentimentLevel::from_score(mood.score);
        if previous != current {
            debug!(market_id = %market_id, ?previous, ?current, "sentiment level shift");
        }
        Some(SentimentShift { previous, current })
    }
}
