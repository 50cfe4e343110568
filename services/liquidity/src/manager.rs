//! Synthetic liquidity bot manager
//!
//! Registers provisioned bot accounts per market, seeds the initial book
//! shape, runs randomized trading ticks, and guarantees both sides of every
//! book stay quoted. Rejected bot orders (out of cash or shares) are logged
//! and skipped; they never abort a tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use market_core::MarketCore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use types::ids::{MarketId, OptionId, UserId};
use types::market::MarketOption;
use types::numeric::Price;
use types::order::{OrderParams, OrderType, Side};
use types::sentiment::SentimentLevel;

use crate::strategy::Strategy;

/// Provisioning and behavior knobs for the bot pool.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Cash deposited per bot at registration
    pub cash_per_bot: Decimal,
    /// Shares granted per bot per option at registration
    pub shares_per_option: Decimal,
    /// Order size range (inclusive)
    pub min_order_size: u64,
    pub max_order_size: u64,
    /// Passive quote distance from the current price
    pub spread: Decimal,
    /// Probability a tick cancels instead of quoting
    pub cancel_probability: f64,
    /// Seeded levels per side
    pub seed_levels: u32,
    /// Distance of the first seeded level from the current price
    pub seed_first_offset: Decimal,
    /// Distance between subsequent seeded levels
    pub seed_step: Decimal,
    /// Quantity per seeded or fallback level
    pub seed_quantity: Decimal,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            cash_per_bot: Decimal::from(1_000),
            shares_per_option: Decimal::from(200),
            min_order_size: 1,
            max_order_size: 5,
            spread: Decimal::new(2, 2),
            cancel_probability: 0.2,
            seed_levels: 5,
            seed_first_offset: Decimal::new(4, 2),
            seed_step: Decimal::new(1, 2),
            seed_quantity: Decimal::from(10),
        }
    }
}

struct Bot {
    user_id: UserId,
    strategy: Strategy,
    rng: ChaCha8Rng,
}

/// One decided tick action, executed after all locks are dropped.
enum TickAction {
    Cancel { user_id: UserId, order_id: types::ids::OrderId },
    Place(OrderParams),
    Skip,
}

/// Bot pool for all simulated markets.
pub struct LiquidityBotManager {
    core: Arc<MarketCore>,
    config: BotConfig,
    bots: Mutex<HashMap<MarketId, Vec<Bot>>>,
    picker: Mutex<ChaCha8Rng>,
}

impl LiquidityBotManager {
    pub fn new(core: Arc<MarketCore>, config: BotConfig, seed: u64) -> Self {
        Self {
            core,
            config,
            bots: Mutex::new(HashMap::new()),
            picker: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn bots(&self) -> MutexGuard<'_, HashMap<MarketId, Vec<Bot>>> {
        self.bots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn picker(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.picker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `count` provisioned bots for a market, cycling strategies.
    ///
    /// Each bot gets its own seeded RNG, a cash deposit, and a share grant
    /// per option so both quoting sides pass reservation checks.
    pub fn register_bots(&self, market_id: MarketId, count: usize, seed: u64) {
        let options = self.core.options_of(market_id);
        let strategies = Strategy::all();
        let mut pool = Vec::with_capacity(count);

        for i in 0..count {
            let user_id = UserId::new();
            if let Err(e) = self.core.deposit(user_id, self.config.cash_per_bot) {
                warn!(user_id = %user_id, error = %e, "bot funding failed");
                continue;
            }
            for option in &options {
                if let Err(e) = self.core.grant_shares(
                    user_id,
                    market_id,
                    option.id,
                    self.config.shares_per_option,
                ) {
                    warn!(user_id = %user_id, error = %e, "bot share grant failed");
                }
            }
            pool.push(Bot {
                user_id,
                strategy: strategies[i % strategies.len()],
                rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64)),
            });
        }

        debug!(market_id = %market_id, bots = pool.len(), "bots registered");
        self.bots().insert(market_id, pool);
    }

    pub fn bot_count(&self, market_id: MarketId) -> usize {
        self.bots().get(&market_id).map(|p| p.len()).unwrap_or(0)
    }

    /// Seed both sides of every option book: `seed_levels` levels per side,
    /// the first one `seed_first_offset` away, then `seed_step` apart, each
    /// level quoted by a different bot.
    pub async fn seed_book(&self, market_id: MarketId) {
        let options = self.core.options_of(market_id);
        let bot_users: Vec<UserId> = self.bots().get(&market_id).map_or(Vec::new(), |pool| {
            pool.iter().map(|b| b.user_id).collect()
        });
        if bot_users.is_empty() {
            warn!(market_id = %market_id, "seed requested with no bots");
            return;
        }

        for option in &options {
            let current = option.current_price.as_decimal();
            for k in 0..self.config.seed_levels {
                let offset =
                    self.config.seed_first_offset + self.config.seed_step * Decimal::from(k);
                let user = bot_users[(k as usize) % bot_users.len()];
                for (side, raw) in [(Side::Buy, current - offset), (Side::Sell, current + offset)] {
                    let Some(price) = Price::try_new(raw) else {
                        continue;
                    };
                    let price = price.clamp_to(option.min_price, option.max_price);
                    self.submit(self.limit_params(
                        user,
                        market_id,
                        option.id,
                        side,
                        price,
                        self.config.seed_quantity,
                    ))
                    .await;
                }
            }
        }
    }

    /// One randomized trading tick: pick a bot, then either cancel one of
    /// its open orders (probability `cancel_probability`) or place a
    /// strategy-priced order of bounded random size.
    pub async fn tick(&self, market_id: MarketId) {
        let action = self.decide_tick(market_id);
        match action {
            TickAction::Cancel { user_id, order_id } => {
                self.core.cancel_order(order_id, user_id).await;
            }
            TickAction::Place(params) => {
                self.submit(params).await;
            }
            TickAction::Skip => {}
        }
    }

    fn decide_tick(&self, market_id: MarketId) -> TickAction {
        let options = self.core.options_of(market_id);
        if options.is_empty() {
            return TickAction::Skip;
        }

        let mut bots = self.bots();
        let Some(pool) = bots.get_mut(&market_id) else {
            return TickAction::Skip;
        };
        if pool.is_empty() {
            return TickAction::Skip;
        }

        let (bot_ix, option_ix, cancel_roll) = {
            let mut picker = self.picker();
            (
                picker.gen_range(0..pool.len()),
                picker.gen_range(0..options.len()),
                picker.gen_bool(self.config.cancel_probability),
            )
        };
        let option = &options[option_ix];
        let bot = &mut pool[bot_ix];

        if cancel_roll {
            let open = self
                .core
                .open_orders_for(bot.user_id, market_id, option.id);
            if let Some(order) = open.first() {
                return TickAction::Cancel {
                    user_id: bot.user_id,
                    order_id: order.id,
                };
            }
            return TickAction::Skip;
        }

        let Some((side, price)) = bot.strategy.quote(option, self.config.spread, &mut bot.rng)
        else {
            return TickAction::Skip;
        };
        let size = bot
            .rng
            .gen_range(self.config.min_order_size..=self.config.max_order_size);
        TickAction::Place(self.limit_params(
            bot.user_id,
            market_id,
            option.id,
            side,
            price,
            Decimal::from(size),
        ))
    }

    /// Re-quote any empty book side with one fallback order so takers always
    /// find a counterparty.
    pub async fn ensure_liquidity(&self, market_id: MarketId) {
        let options = self.core.options_of(market_id);
        let Some(user) = self.pick_user(market_id) else {
            return;
        };

        for option in &options {
            let Some(view) = self.core.order_book(market_id, option.id, 1) else {
                continue;
            };
            let current = option.current_price.as_decimal();
            let mut fallbacks = Vec::new();
            if view.bids.iter().all(|l| l.synthetic) {
                fallbacks.push((Side::Buy, current - self.config.spread));
            }
            if view.asks.iter().all(|l| l.synthetic) {
                fallbacks.push((Side::Sell, current + self.config.spread));
            }
            for (side, raw) in fallbacks {
                let Some(price) = Price::try_new(raw) else {
                    continue;
                };
                let price = price.clamp_to(option.min_price, option.max_price);
                self.submit(self.limit_params(
                    user,
                    market_id,
                    option.id,
                    side,
                    price,
                    self.config.seed_quantity,
                ))
                .await;
            }
        }
    }

    /// Push a bounded burst of aggressive orders that walk each option's
    /// price toward the sentiment target (the second option of a pair gets
    /// the complementary target).
    pub async fn burst(&self, market_id: MarketId, level: SentimentLevel, count: usize) {
        let options = self.core.options_of(market_id);
        let target = level.target_price().as_decimal();

        for (i, option) in options.iter().enumerate() {
            let option_target = if i == 0 { target } else { Decimal::ONE - target };
            for _ in 0..count {
                let Some(user) = self.pick_user(market_id) else {
                    return;
                };
                // Refresh: each fill moves the current price
                let Some(option) = self.core.option(option.id) else {
                    continue;
                };
                let current = option.current_price.as_decimal();
                if (option_target - current).abs() < self.config.seed_step {
                    break;
                }
                let side = if option_target > current {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let Some(price) = Price::try_new(option_target) else {
                    continue;
                };
                let price = price.clamp_to(option.min_price, option.max_price);
                let size = {
                    let mut picker = self.picker();
                    picker.gen_range(self.config.min_order_size..=self.config.max_order_size)
                };
                self.submit(self.limit_params(
                    user,
                    market_id,
                    option.id,
                    side,
                    price,
                    Decimal::from(size),
                ))
                .await;
            }
        }
    }

    fn pick_user(&self, market_id: MarketId) -> Option<UserId> {
        let bots = self.bots();
        let pool = bots.get(&market_id)?;
        if pool.is_empty() {
            return None;
        }
        let ix = self.picker().gen_range(0..pool.len());
        Some(pool[ix].user_id)
    }

    fn limit_params(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        side: Side,
        price: Price,
        quantity: Decimal,
    ) -> OrderParams {
        OrderParams {
            user_id,
            market_id,
            option_id,
            side,
            order_type: OrderType::Limit,
            price: Some(price.as_decimal()),
            quantity,
            trigger_price: None,
            trailing_offset: None,
            expires_at: None,
        }
    }

    async fn submit(&self, params: OrderParams) {
        if let Err(e) = self.core.create_order(params).await {
            debug!(error = %e, "bot order rejected");
        }
    }

    /// Current book shape helper for tests and fallback checks.
    pub fn real_levels(&self, market_id: MarketId, option: &MarketOption) -> (usize, usize) {
        match self.core.order_book(market_id, option.id, usize::MAX) {
            Some(view) => (
                view.bids.iter().filter(|l| !l.synthetic).count(),
                view.asks.iter().filter(|l| !l.synthetic).count(),
            ),
            None => (0, 0),
        }
    }
}
