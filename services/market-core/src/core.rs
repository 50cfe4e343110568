//! Market core orchestration
//!
//! Owns the per-(market, option) book shards and composes matching, ledger
//! settlement, pricing, trigger activation, publication, and persistence
//! into one transaction per command. Each shard is guarded by its own
//! mutex; the wallet ledger's inner lock is always acquired after the shard
//! lock, and no lock is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use ledger::{PositionLedger, WalletLedger};
use matching_engine::{OrderBook, SubmitOutcome};
use types::errors::{CoreError, MarketError, OrderError};
use types::ids::{MarketId, OptionId, OrderId, UserId};
use types::market::{Market, MarketOption};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderParams, OrderType, Side};
use types::position::Position;
use types::trade::Trade;
use types::wallet::WalletTransaction;

use crate::events::BroadcastEvent;
use crate::publisher::Publisher;
use crate::repository::OrderRepository;

/// Tunables for price bounds and synthetic depth.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Floor for recorded and quoted prices
    pub min_price: Price,
    /// Ceiling for recorded and quoted prices (market-buy sentinel)
    pub max_price: Price,
    /// Quantity shown on a synthetic fallback level
    pub synthetic_quantity: Quantity,
    /// Distance of a synthetic level from the current price
    pub synthetic_spread: Decimal,
}

impl Default for CoreConfig {
    fn default() -> Self {
        // Bounds are well inside (0, 1); the fallbacks are unreachable.
        Self {
            min_price: Price::try_new(Decimal::new(1, 2)).unwrap_or_else(|| Price::from_u64(1)),
            max_price: Price::try_new(Decimal::new(99, 2)).unwrap_or_else(|| Price::from_u64(1)),
            synthetic_quantity: Quantity::from_u64(10),
            synthetic_spread: Decimal::new(4, 2),
        }
    }
}

/// One aggregated book level as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
    /// True for fallback levels synthesized when a side is empty
    pub synthetic: bool,
}

/// Client-facing depth view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookView {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Book plus the reservation bookkeeping for its open orders.
///
/// `reserved_cash` holds the cash still locked per open buy order;
/// `reserved_shares` the shares still locked per open sell order. Entries
/// are reconciled on every fill and removed when the order turns terminal.
struct BookShard {
    book: OrderBook,
    reserved_cash: HashMap<OrderId, Decimal>,
    reserved_shares: HashMap<OrderId, Decimal>,
}

impl BookShard {
    fn new(market_id: MarketId, option_id: OptionId) -> Self {
        Self {
            book: OrderBook::new(market_id, option_id),
            reserved_cash: HashMap::new(),
            reserved_shares: HashMap::new(),
        }
    }
}

/// Rows written out after a transaction commits.
#[derive(Default)]
struct PersistBatch {
    orders: Vec<Order>,
    trades: Vec<Trade>,
    positions: Vec<Position>,
    transactions: Vec<WalletTransaction>,
}

impl PersistBatch {
    fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.trades.is_empty()
            && self.positions.is_empty()
            && self.transactions.is_empty()
    }

    async fn flush(self, repository: Arc<dyn OrderRepository>) {
        for order in &self.orders {
            if let Err(e) = repository.save_order(order).await {
                warn!(order_id = %order.id, error = %e, "order persist failed");
            }
        }
        for trade in &self.trades {
            if let Err(e) = repository.save_trade(trade).await {
                warn!(trade_id = %trade.id, error = %e, "trade persist failed");
            }
        }
        for position in &self.positions {
            if let Err(e) = repository.save_position(position).await {
                warn!(user_id = %position.user_id, error = %e, "position persist failed");
            }
        }
        for tx in &self.transactions {
            if let Err(e) = repository.save_wallet_transaction(tx).await {
                warn!(tx_id = %tx.id, error = %e, "wallet transaction persist failed");
            }
        }
    }
}

/// The prediction-market core.
pub struct MarketCore {
    config: CoreConfig,
    markets: DashMap<MarketId, Market>,
    options: DashMap<OptionId, MarketOption>,
    shards: DashMap<(MarketId, OptionId), Arc<Mutex<BookShard>>>,
    order_index: DashMap<OrderId, (MarketId, OptionId)>,
    halted: DashSet<MarketId>,
    positions: Arc<PositionLedger>,
    wallets: Arc<WalletLedger>,
    repository: Arc<dyn OrderRepository>,
    publisher: Arc<dyn Publisher>,
}

impl MarketCore {
    pub fn new(repository: Arc<dyn OrderRepository>, publisher: Arc<dyn Publisher>) -> Self {
        Self::with_config(CoreConfig::default(), repository, publisher)
    }

    pub fn with_config(
        config: CoreConfig,
        repository: Arc<dyn OrderRepository>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            config,
            markets: DashMap::new(),
            options: DashMap::new(),
            shards: DashMap::new(),
            order_index: DashMap::new(),
            halted: DashSet::new(),
            positions: Arc::new(PositionLedger::new()),
            wallets: Arc::new(WalletLedger::new()),
            repository,
            publisher,
        }
    }

    pub fn wallets(&self) -> &WalletLedger {
        &self.wallets
    }

    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn now_nanos() -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or(0)
    }

    fn lock_shard(shard: &Mutex<BookShard>) -> MutexGuard<'_, BookShard> {
        shard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Market lifecycle
    // ------------------------------------------------------------------

    /// Create a market with a YES/NO option pair priced at `p` and `1 − p`.
    pub fn initialize_market(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        initial_price: Price,
    ) -> Result<Market, CoreError> {
        let complement = Decimal::ONE - initial_price.as_decimal();
        let no_price = Price::try_new(complement)
            .ok_or_else(|| OrderError::InvalidPrice("initial price must be below 1".into()))?;

        let now = Self::now_nanos();
        let mut market = Market::new(name, description, now);
        let yes = MarketOption::new(
            market.id,
            "YES",
            initial_price.clamp_to(self.config.min_price, self.config.max_price),
            self.config.min_price,
            self.config.max_price,
        );
        let no = MarketOption::new(
            market.id,
            "NO",
            no_price.clamp_to(self.config.min_price, self.config.max_price),
            self.config.min_price,
            self.config.max_price,
        );
        market.option_ids = vec![yes.id, no.id];

        for option in [&yes, &no] {
            self.shards.insert(
                (market.id, option.id),
                Arc::new(Mutex::new(BookShard::new(market.id, option.id))),
            );
        }
        self.options.insert(yes.id, yes);
        self.options.insert(no.id, no);
        self.markets.insert(market.id, market.clone());

        info!(market_id = %market.id, name = %market.name, "market initialized");
        Ok(market)
    }

    pub fn market(&self, market_id: MarketId) -> Option<Market> {
        self.markets.get(&market_id).map(|m| m.clone())
    }

    pub fn option(&self, option_id: OptionId) -> Option<MarketOption> {
        self.options.get(&option_id).map(|o| o.clone())
    }

    /// All options of a market, in creation order.
    pub fn options_of(&self, market_id: MarketId) -> Vec<MarketOption> {
        let Some(market) = self.markets.get(&market_id) else {
            return Vec::new();
        };
        market
            .option_ids
            .iter()
            .filter_map(|id| self.options.get(id).map(|o| o.clone()))
            .collect()
    }

    /// Implied probability per option: weight over the sum of weights.
    pub fn implied_probabilities(&self, market_id: MarketId) -> Vec<(OptionId, Decimal)> {
        crate::pricer::implied_probabilities(&self.options_of(market_id))
    }

    pub fn is_halted(&self, market_id: MarketId) -> bool {
        self.halted.contains(&market_id)
    }

    fn halt(&self, market_id: MarketId, reason: &str) {
        error!(market_id = %market_id, reason, "market halted");
        self.halted.insert(market_id);
    }

    // ------------------------------------------------------------------
    // Funding
    // ------------------------------------------------------------------

    /// Credit a user's wallet.
    pub fn deposit(&self, user_id: UserId, amount: Decimal) -> Result<(), CoreError> {
        if amount <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity("deposit must be positive".into()).into());
        }
        self.wallets.deposit(user_id, amount, Self::now_nanos());
        Ok(())
    }

    /// Grant shares at the option's current price as basis.
    pub fn grant_shares(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
        quantity: Decimal,
    ) -> Result<(), CoreError> {
        if quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity("grant must be positive".into()).into());
        }
        let basis = self
            .options
            .get(&option_id)
            .filter(|o| o.market_id == market_id)
            .map(|o| o.current_price.as_decimal())
            .ok_or(MarketError::OptionNotFound { option_id })?;
        self.positions
            .grant_shares(user_id, market_id, option_id, quantity, basis, Self::now_nanos());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Validate, reserve, match, settle, and publish one order.
    pub async fn create_order(&self, params: OrderParams) -> Result<Order, CoreError> {
        let now = Self::now_nanos();
        let market_id = params.market_id;
        let option_id = params.option_id;

        if self.markets.get(&market_id).is_none() {
            return Err(MarketError::NotFound { market_id }.into());
        }
        if self.is_halted(market_id) {
            return Err(MarketError::Halted { market_id }.into());
        }
        let option = self
            .options
            .get(&option_id)
            .filter(|o| o.market_id == market_id)
            .map(|o| o.clone())
            .ok_or(MarketError::OptionNotFound { option_id })?;

        let quantity = Quantity::try_new(params.quantity)
            .filter(|q| !q.is_zero())
            .ok_or_else(|| OrderError::InvalidQuantity("quantity must be positive".into()))?;

        let (price, trigger) = self.resolve_prices(&params, &option)?;

        // Reserve before touching any book state; a failed reservation is
        // the whole rejection.
        match params.side {
            Side::Buy => {
                let amount = price.as_decimal() * quantity.as_decimal();
                self.wallets.reserve(params.user_id, amount)?;
            }
            Side::Sell => {
                self.positions
                    .reserve(params.user_id, market_id, option_id, quantity.as_decimal())?;
            }
        }

        let mut order = Order::new(
            params.user_id,
            market_id,
            option_id,
            params.side,
            params.order_type,
            price,
            quantity,
            now,
        );
        order.trigger_price = trigger;
        if params.order_type == OrderType::Trailing {
            order.trailing_offset = params.trailing_offset;
        }
        order.expires_at = params.expires_at;
        let order_id = order.id;

        let shard = self
            .shards
            .get(&(market_id, option_id))
            .map(|s| Arc::clone(&s))
            .ok_or(MarketError::OptionNotFound { option_id })?;

        let mut events = Vec::new();
        let mut batch = PersistBatch::default();
        let accepted = {
            let mut guard = Self::lock_shard(&shard);
            self.sweep_expired_locked(&mut guard, now, &mut events, &mut batch);

            match params.side {
                Side::Buy => {
                    guard
                        .reserved_cash
                        .insert(order_id, price.as_decimal() * quantity.as_decimal());
                }
                Side::Sell => {
                    guard
                        .reserved_shares
                        .insert(order_id, quantity.as_decimal());
                }
            }
            self.order_index.insert(order_id, (market_id, option_id));

            let outcome = guard.book.submit(order, now);
            let traded = !outcome.trades.is_empty();
            let submitted = outcome.order.clone();
            self.process_outcome(&mut guard, outcome, now, &mut events, &mut batch)?;
            if traded {
                self.run_triggers(&mut guard, option_id, now, &mut events, &mut batch)?;
            }

            // Final taker state: still on the book, or settled into the batch
            guard
                .book
                .order(&order_id)
                .cloned()
                .or_else(|| batch.orders.iter().rev().find(|o| o.id == order_id).cloned())
                .unwrap_or(submitted)
        };

        events.insert(
            0,
            BroadcastEvent::OrderAccepted {
                order: accepted.clone(),
            },
        );
        if batch.orders.iter().all(|o| o.id != order_id) {
            batch.orders.push(accepted.clone());
        }

        self.publish_all(events);
        self.flush(batch);
        Ok(accepted)
    }

    /// Cancel an open order; refunds the unfilled remainder.
    ///
    /// Returns false (with a warning) when the order is unknown, owned by
    /// someone else, or already terminal.
    pub async fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> bool {
        let now = Self::now_nanos();
        let Some(location) = self.order_index.get(&order_id).map(|e| *e) else {
            warn!(order_id = %order_id, "cancel for unknown order");
            return false;
        };
        let (market_id, option_id) = location;
        if self.is_halted(market_id) {
            warn!(order_id = %order_id, market_id = %market_id, "cancel on halted market");
            return false;
        }
        let Some(shard) = self.shards.get(&(market_id, option_id)).map(|s| Arc::clone(&s)) else {
            return false;
        };

        let mut events = Vec::new();
        let mut batch = PersistBatch::default();
        let cancelled = {
            let mut guard = Self::lock_shard(&shard);
            self.sweep_expired_locked(&mut guard, now, &mut events, &mut batch);

            match guard.book.cancel(order_id, user_id, now) {
                Ok(order) => {
                    self.release_tracked(&mut guard, &order, now);
                    events.push(BroadcastEvent::OrderCancelled {
                        order_id,
                        market_id,
                        option_id,
                        remaining: order.remaining(),
                    });
                    batch.orders.push(order);
                    true
                }
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "cancel rejected");
                    false
                }
            }
        };

        self.publish_all(events);
        self.flush(batch);
        cancelled
    }

    /// Depth view; an empty side gets one synthetic fallback level.
    pub fn order_book(&self, market_id: MarketId, option_id: OptionId, depth: usize) -> Option<BookView> {
        let option = self
            .options
            .get(&option_id)
            .filter(|o| o.market_id == market_id)
            .map(|o| o.clone())?;
        let shard = self.shards.get(&(market_id, option_id)).map(|s| Arc::clone(&s))?;
        let snapshot = Self::lock_shard(&shard).book.snapshot(depth);

        let real = |levels: Vec<(Price, Quantity)>| {
            levels
                .into_iter()
                .map(|(price, quantity)| BookLevel {
                    price,
                    quantity,
                    synthetic: false,
                })
                .collect::<Vec<_>>()
        };
        let mut bids = real(snapshot.bids);
        let mut asks = real(snapshot.asks);

        let current = option.current_price.as_decimal();
        if bids.is_empty() {
            bids.push(self.synthetic_level(current - self.config.synthetic_spread, &option));
        }
        if asks.is_empty() {
            asks.push(self.synthetic_level(current + self.config.synthetic_spread, &option));
        }
        Some(BookView { bids, asks })
    }

    fn synthetic_level(&self, target: Decimal, option: &MarketOption) -> BookLevel {
        let price = Price::try_new(target)
            .unwrap_or(option.min_price)
            .clamp_to(option.min_price, option.max_price);
        BookLevel {
            price,
            quantity: self.config.synthetic_quantity,
            synthetic: true,
        }
    }

    /// Open orders one user has on one option.
    pub fn open_orders_for(
        &self,
        user_id: UserId,
        market_id: MarketId,
        option_id: OptionId,
    ) -> Vec<Order> {
        let Some(shard) = self.shards.get(&(market_id, option_id)).map(|s| Arc::clone(&s)) else {
            return Vec::new();
        };
        let guard = Self::lock_shard(&shard);
        guard
            .book
            .open_orders_for(user_id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Effective limit price and trigger for the order type.
    fn resolve_prices(
        &self,
        params: &OrderParams,
        option: &MarketOption,
    ) -> Result<(Price, Option<Price>), CoreError> {
        let in_bounds = |price: Price| -> Result<Price, CoreError> {
            if price < option.min_price || price > option.max_price {
                return Err(OrderError::InvalidPrice(format!(
                    "price {price} outside [{}, {}]",
                    option.min_price, option.max_price
                ))
                .into());
            }
            Ok(price)
        };

        match params.order_type {
            // Sentinel limits that cross any opposing level
            OrderType::Market => Ok((
                match params.side {
                    Side::Buy => option.max_price,
                    Side::Sell => option.min_price,
                },
                None,
            )),
            OrderType::Limit => {
                let raw = params.price.ok_or(OrderError::MissingPrice {
                    order_type: "limit".into(),
                })?;
                let price = Price::try_new(raw)
                    .ok_or_else(|| OrderError::InvalidPrice("price must be positive".into()))?;
                Ok((in_bounds(price)?, None))
            }
            OrderType::Stop => {
                let raw = params.trigger_price.ok_or(OrderError::MissingTrigger {
                    order_type: "stop".into(),
                })?;
                let trigger = Price::try_new(raw)
                    .ok_or_else(|| OrderError::InvalidPrice("trigger must be positive".into()))?;
                let trigger = in_bounds(trigger)?;
                Ok((trigger, Some(trigger)))
            }
            OrderType::Trailing => {
                let offset = params.trailing_offset.ok_or(OrderError::MissingTrigger {
                    order_type: "trailing".into(),
                })?;
                if offset <= Decimal::ZERO {
                    return Err(
                        OrderError::InvalidPrice("trailing offset must be positive".into()).into(),
                    );
                }
                let current = option.current_price.as_decimal();
                let raw = match params.side {
                    Side::Buy => current + offset,
                    Side::Sell => current - offset,
                };
                let trigger = Price::try_new(raw)
                    .ok_or_else(|| {
                        OrderError::InvalidPrice("trailing offset exceeds current price".into())
                    })?
                    .clamp_to(option.min_price, option.max_price);
                Ok((trigger, Some(trigger)))
            }
        }
    }

    /// Settle each trade of an outcome: positions, wallets, reservation
    /// bookkeeping, price recording, events, and persistence rows.
    fn process_outcome(
        &self,
        guard: &mut BookShard,
        outcome: SubmitOutcome,
        now: i64,
        events: &mut Vec<BroadcastEvent>,
        batch: &mut PersistBatch,
    ) -> Result<(), CoreError> {
        let market_id = outcome.order.market_id;
        let option_id = outcome.order.option_id;

        for trade in &outcome.trades {
            if let Err(e) = self.positions.apply_trade(trade) {
                self.halt(market_id, &e.to_string());
                return Err(MarketError::Halted { market_id }.into());
            }
            let legs = match self.wallets.settle_trade(trade) {
                Ok(legs) => legs,
                Err(e) => {
                    self.halt(market_id, &e.to_string());
                    return Err(MarketError::Halted { market_id }.into());
                }
            };

            let (buyer_oid, seller_oid) = match trade.taker_side {
                Side::Buy => (trade.taker_order_id, trade.maker_order_id),
                Side::Sell => (trade.maker_order_id, trade.taker_order_id),
            };

            // Buy fills consume reservation at the buyer's limit; the gap
            // to the actual trade price goes back to available. Trades
            // execute at the maker's limit, so when the maker is the buyer
            // the consumed reservation equals the trade value.
            let buyer_limit = if buyer_oid == outcome.order.id {
                outcome.order.price.as_decimal()
            } else {
                trade.price.as_decimal()
            };
            let consumed = buyer_limit * trade.quantity.as_decimal();
            if let Some(tracked) = guard.reserved_cash.get_mut(&buyer_oid) {
                *tracked = (*tracked - consumed).max(Decimal::ZERO);
            }
            let improvement = consumed - trade.value();
            if improvement > Decimal::ZERO {
                if let Err(e) =
                    self.wallets
                        .release(trade.buyer(), improvement, Some(*trade.id.as_uuid()), now)
                {
                    self.halt(market_id, &e.to_string());
                    return Err(MarketError::Halted { market_id }.into());
                }
            }
            if let Some(tracked) = guard.reserved_shares.get_mut(&seller_oid) {
                *tracked = (*tracked - trade.quantity.as_decimal()).max(Decimal::ZERO);
            }

            // Price recording: last ← current, current ← clamp(trade price)
            if let Some(mut option) = self.options.get_mut(&option_id) {
                option.record_trade(trade.price);
                events.push(BroadcastEvent::PriceChanged {
                    market_id,
                    option_id,
                    last_price: option.last_price,
                    current_price: option.current_price,
                });
            }

            events.push(BroadcastEvent::TradeExecuted {
                trade: trade.clone(),
            });
            batch.trades.push(trade.clone());
            batch.transactions.extend(legs);
            for user in [trade.buyer(), trade.seller()] {
                if let Some(position) = self.positions.position(user, market_id, option_id) {
                    batch.positions.push(position);
                }
            }
        }

        // Settled orders drop their reservation entries
        for done in &outcome.completed {
            self.release_tracked(guard, done, now);
            batch.orders.push(done.clone());
        }
        Ok(())
    }

    /// Fire conditional orders until the recorded price stops moving them.
    fn run_triggers(
        &self,
        guard: &mut BookShard,
        option_id: OptionId,
        now: i64,
        events: &mut Vec<BroadcastEvent>,
        batch: &mut PersistBatch,
    ) -> Result<(), CoreError> {
        loop {
            let Some(current) = self.options.get(&option_id).map(|o| o.current_price) else {
                return Ok(());
            };
            let fired = guard.book.activate_triggers(current, now);
            if fired.is_empty() {
                return Ok(());
            }
            for outcome in fired {
                self.adjust_reservation_to_fire_price(guard, &outcome.order, now);
                if outcome.order.is_active() {
                    batch.orders.push(outcome.order.clone());
                }
                self.process_outcome(guard, outcome, now, events, batch)?;
            }
        }
    }

    /// A trailing buy's trigger only ratchets down, so the cash reserved at
    /// the original trigger can exceed what the fired limit needs; release
    /// the difference before settling fills.
    fn adjust_reservation_to_fire_price(&self, guard: &mut BookShard, fired: &Order, now: i64) {
        if fired.side != Side::Buy {
            return;
        }
        let needed = fired.price.as_decimal() * fired.quantity.as_decimal();
        let Some(tracked) = guard.reserved_cash.get_mut(&fired.id) else {
            return;
        };
        let excess = *tracked - needed;
        if excess > Decimal::ZERO {
            *tracked = needed;
            if let Err(e) = self.wallets.release(fired.user_id, excess, None, now) {
                warn!(order_id = %fired.id, error = %e, "trailing reservation release failed");
            }
        }
    }

    /// Drop a terminal order's reservation and index entries and refund
    /// any leftover.
    fn release_tracked(&self, guard: &mut BookShard, order: &Order, now: i64) {
        self.order_index.remove(&order.id);
        if let Some(leftover) = guard.reserved_cash.remove(&order.id) {
            if leftover > Decimal::ZERO {
                if let Err(e) = self.wallets.release(order.user_id, leftover, None, now) {
                    warn!(order_id = %order.id, error = %e, "cash refund failed");
                }
            }
        }
        if let Some(leftover) = guard.reserved_shares.remove(&order.id) {
            if leftover > Decimal::ZERO {
                if let Err(e) = self.positions.release(
                    order.user_id,
                    order.market_id,
                    order.option_id,
                    leftover,
                ) {
                    warn!(order_id = %order.id, error = %e, "share release failed");
                }
            }
        }
    }

    /// Expire overdue orders before any other book mutation.
    fn sweep_expired_locked(
        &self,
        guard: &mut BookShard,
        now: i64,
        events: &mut Vec<BroadcastEvent>,
        batch: &mut PersistBatch,
    ) {
        for order in guard.book.sweep_expired(now) {
            self.release_tracked(guard, &order, now);
            events.push(BroadcastEvent::OrderExpired {
                order_id: order.id,
                market_id: order.market_id,
                option_id: order.option_id,
                remaining: order.remaining(),
            });
            batch.orders.push(order);
        }
    }

    fn publish_all(&self, events: Vec<BroadcastEvent>) {
        for event in events {
            self.publisher.publish(&event.topic(), &event);
        }
    }

    /// Fire-and-forget persistence; failures are logged, never propagated.
    fn flush(&self, batch: PersistBatch) {
        if batch.is_empty() {
            return;
        }
        let repository = Arc::clone(&self.repository);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                batch.flush(repository).await;
            });
        } else {
            warn!("no runtime for persistence flush; batch dropped");
        }
    }
}
