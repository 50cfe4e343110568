//! Liquidity engine facade
//!
//! Owns the per-market tokio tasks: a trading loop ticking the bot manager
//! at randomized intervals and a sentiment loop evolving the market mood.
//! Stopping a market aborts its tasks; the engine holds no lock while any
//! task is awaiting.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use market_core::MarketCore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinHandle;
use tracing::info;
use types::ids::MarketId;
use types::sentiment::{MarketEvent, SentimentLevel};

use crate::manager::{BotConfig, LiquidityBotManager};
use crate::sentiment::SentimentEngine;

/// Scheduling knobs for the per-market tasks.
#[derive(Debug, Clone)]
pub struct LiquidityConfig {
    /// Bots created per market
    pub bots_per_market: usize,
    /// Randomized trading tick interval
    pub tick_interval: Range<Duration>,
    /// Fixed sentiment evolution interval
    pub sentiment_interval: Duration,
    /// Orders per sentiment burst
    pub burst_size: usize,
    /// Sentiment drift scale given to each market at start; adjustable per
    /// market afterwards
    pub volatility: f64,
    /// Base RNG seed for bots and schedulers
    pub seed: u64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            bots_per_market: 8,
            tick_interval: Duration::from_millis(200)..Duration::from_millis(1_500),
            sentiment_interval: Duration::from_secs(5),
            burst_size: 5,
            volatility: 0.25,
            seed: 42,
        }
    }
}

/// Runs synthetic liquidity for any number of markets.
pub struct LiquidityEngine {
    core: Arc<MarketCore>,
    manager: Arc<LiquidityBotManager>,
    sentiment: Arc<SentimentEngine>,
    config: LiquidityConfig,
    tasks: DashMap<MarketId, Vec<JoinHandle<()>>>,
}

impl LiquidityEngine {
    pub fn new(core: Arc<MarketCore>, config: LiquidityConfig) -> Self {
        let manager = Arc::new(LiquidityBotManager::new(
            core.clone(),
            BotConfig::default(),
            config.seed,
        ));
        let sentiment = Arc::new(SentimentEngine::new(config.volatility, config.seed ^ 0x5e17));
        Self {
            core,
            manager,
            sentiment,
            config,
            tasks: DashMap::new(),
        }
    }

    pub fn manager(&self) -> &Arc<LiquidityBotManager> {
        &self.manager
    }

    /// Provision bots, seed the book, and launch the market's tasks.
    pub async fn start(&self, market_id: MarketId) {
        if self.tasks.contains_key(&market_id) {
            return;
        }
        self.manager
            .register_bots(market_id, self.config.bots_per_market, self.config.seed);
        self.sentiment.register(market_id);
        self.manager.seed_book(market_id).await;

        let trading = tokio::spawn(Self::trading_loop(
            self.manager.clone(),
            market_id,
            self.config.tick_interval.clone(),
            self.config.seed ^ market_low_bits(market_id),
        ));
        let mood = tokio::spawn(Self::sentiment_loop(
            self.manager.clone(),
            self.sentiment.clone(),
            market_id,
            self.config.sentiment_interval,
            self.config.burst_size,
        ));

        info!(market_id = %market_id, "liquidity started");
        self.tasks.insert(market_id, vec![trading, mood]);
    }

    /// Abort the market's tasks. Resting bot orders stay on the book.
    pub fn stop(&self, market_id: MarketId) {
        if let Some((_, handles)) = self.tasks.remove(&market_id) {
            for handle in handles {
                handle.abort();
            }
            info!(market_id = %market_id, "liquidity stopped");
        }
    }

    pub fn is_running(&self, market_id: MarketId) -> bool {
        self.tasks.contains_key(&market_id)
    }

    /// Queue an external sentiment event for the market.
    pub fn add_market_event(&self, event: MarketEvent) {
        self.sentiment.add_event(event);
    }

    /// Adjust one market's sentiment drift scale, clamped to [0, 1].
    pub fn set_market_volatility(&self, market_id: MarketId, volatility: f64) {
        self.sentiment.set_volatility(market_id, volatility);
    }

    pub fn sentiment(&self, market_id: MarketId) -> SentimentLevel {
        self.sentiment.level(market_id)
    }

    pub fn core(&self) -> &Arc<MarketCore> {
        &self.core
    }

    async fn trading_loop(
        manager: Arc<LiquidityBotManager>,
        market_id: MarketId,
        interval: Range<Duration>,
        seed: u64,
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        loop {
            let wait = rng.gen_range(interval.start..interval.end);
            tokio::time::sleep(wait).await;
            manager.tick(market_id).await;
            manager.ensure_liquidity(market_id).await;
        }
    }

    async fn sentiment_loop(
        manager: Arc<LiquidityBotManager>,
        sentiment: Arc<SentimentEngine>,
        market_id: MarketId,
        interval: Duration,
        burst_size: usize,
    ) {
        loop {
            tokio::time::sleep(interval).await;
            if let Some(shift) = sentiment.evolve(market_id) {
                if shift.changed() {
                    manager.burst(market_id, shift.current, burst_size).await;
                }
            }
        }
    }
}

impl Drop for LiquidityEngine {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            for handle in entry.value() {
                handle.abort();
            }
        }
    }
}

fn market_low_bits(market_id: MarketId) -> u64 {
    let bytes = market_id.as_uuid().as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
