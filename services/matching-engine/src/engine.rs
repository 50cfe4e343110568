//! Order book engine for one (market, option) pair
//!
//! Price-time priority: bids matched from highest price, asks from lowest,
//! FIFO within a level. Trades always execute at the resting maker's price.
//! Market orders cross with a sentinel limit and never rest; the unfilled
//! remainder is cancelled. Stop and trailing orders are held in a pending
//! set until the recorded trade price crosses their trigger, then enter the
//! book as limit orders. Orders that settle leave the book immediately and
//! come back to the caller through the submit outcome, so storage and the
//! expiry sweep scale with open orders only.

use std::collections::{BTreeMap, HashMap};

use types::errors::OrderError;
use types::ids::{MarketId, OptionId, OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderType, Side};
use types::trade::Trade;

use crate::book::{AskBook, BidBook};
use crate::matching::{crossing, fill};

/// Result of submitting or triggering an order.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// Taker order in its post-match state
    pub order: Order,
    /// Trades generated, in execution order
    pub trades: Vec<Trade>,
    /// Orders that reached a terminal state and left the book
    pub completed: Vec<Order>,
}

/// Aggregated depth, best price first on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSnapshot {
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
}

/// In-memory book for a single (market, option) pair.
#[derive(Debug)]
pub struct OrderBook {
    market_id: MarketId,
    option_id: OptionId,
    bids: BidBook,
    asks: AskBook,
    /// Open and pending orders; terminal orders leave the map
    orders: HashMap<OrderId, Order>,
    /// Conditional orders waiting on a trigger
    pending: Vec<OrderId>,
    /// Deadline index over tracked orders that carry an expiry
    expiries: BTreeMap<i64, Vec<OrderId>>,
}

impl OrderBook {
    pub fn new(market_id: MarketId, option_id: OptionId) -> Self {
        Self {
            market_id,
            option_id,
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
            pending: Vec::new(),
            expiries: BTreeMap::new(),
        }
    }

    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    pub fn option_id(&self) -> OptionId {
        self.option_id
    }

    /// Accept a validated order.
    ///
    /// Limit orders match then rest; market orders match then cancel any
    /// remainder; stop/trailing orders go to the pending set untouched.
    pub fn submit(&mut self, order: Order, now: i64) -> SubmitOutcome {
        if order.order_type.is_conditional() {
            let outcome = SubmitOutcome {
                order: order.clone(),
                trades: Vec::new(),
                completed: Vec::new(),
            };
            self.pending.push(order.id);
            self.index_expiry(&order);
            self.orders.insert(order.id, order);
            return outcome;
        }
        self.place(order, now)
    }

    /// Match an order against the opposing side, then rest or cancel it.
    fn place(&mut self, mut order: Order, now: i64) -> SubmitOutcome {
        let mut completed = Vec::new();
        let trades = self.match_incoming(&mut order, now, &mut completed);

        if order.is_filled() {
            completed.push(order.clone());
        } else {
            match order.order_type {
                OrderType::Limit | OrderType::Stop | OrderType::Trailing => {
                    let side_price = order.price;
                    match order.side {
                        Side::Buy => self.bids.insert(
                            order.id,
                            order.user_id,
                            side_price,
                            order.remaining(),
                        ),
                        Side::Sell => self.asks.insert(
                            order.id,
                            order.user_id,
                            side_price,
                            order.remaining(),
                        ),
                    }
                    self.index_expiry(&order);
                    self.orders.insert(order.id, order.clone());
                }
                OrderType::Market => {
                    order.cancel(now);
                    completed.push(order.clone());
                }
            }
        }

        SubmitOutcome {
            order,
            trades,
            completed,
        }
    }

    /// Walk the opposing side in priority order while the taker still
    /// crosses, skipping the taker's own resting orders. Makers that fill
    /// completely are dropped from tracking and appended to `completed`.
    fn match_incoming(
        &mut self,
        taker: &mut Order,
        now: i64,
        completed: &mut Vec<Order>,
    ) -> Vec<Trade> {
        let mut remaining = taker.remaining();
        let mut fills = Vec::new();

        let prices = match taker.side {
            Side::Buy => self.asks.prices_in_priority(),
            Side::Sell => self.bids.prices_in_priority(),
        };

        for level_price in prices {
            if remaining.is_zero() {
                break;
            }
            if !crossing::incoming_can_match(taker.side, taker.price, level_price) {
                break;
            }

            let level = match taker.side {
                Side::Buy => self.asks.level_mut(level_price),
                Side::Sell => self.bids.level_mut(level_price),
            };
            if let Some(level) = level {
                fill::fill_level(level, taker.user_id, level_price, &mut remaining, &mut fills);
            }
            match taker.side {
                Side::Buy => self.asks.drop_level_if_empty(level_price),
                Side::Sell => self.bids.drop_level_if_empty(level_price),
            }
        }

        let mut trades = Vec::with_capacity(fills.len());
        for f in fills {
            if let Some(maker) = self.orders.get_mut(&f.maker_order_id) {
                maker.add_fill(f.quantity, now);
            }
            taker.add_fill(f.quantity, now);
            trades.push(Trade::new(
                self.market_id,
                self.option_id,
                f.maker_order_id,
                taker.id,
                f.maker_user_id,
                taker.user_id,
                taker.side,
                f.price,
                f.quantity,
                now,
            ));
            if self
                .orders
                .get(&f.maker_order_id)
                .is_some_and(|m| !m.is_active())
            {
                if let Some(maker) = self.orders.remove(&f.maker_order_id) {
                    self.unindex_expiry(&maker);
                    completed.push(maker);
                }
            }
        }
        trades
    }

    /// Cancel an open order owned by `user_id`.
    ///
    /// Returns the cancelled order so the caller can release reservations
    /// for the unfilled remainder. Unknown, foreign, and already-settled
    /// ids all surface as not found.
    pub fn cancel(&mut self, order_id: OrderId, user_id: UserId, now: i64) -> Result<Order, OrderError> {
        if !self
            .orders
            .get(&order_id)
            .is_some_and(|o| o.user_id == user_id)
        {
            return Err(OrderError::NotFound { order_id });
        }
        let Some(mut order) = self.orders.remove(&order_id) else {
            return Err(OrderError::NotFound { order_id });
        };
        self.unindex_expiry(&order);

        let was_pending = order.order_type.is_conditional()
            && self.pending.contains(&order_id);
        order.cancel(now);

        if was_pending {
            self.pending.retain(|id| *id != order_id);
        } else {
            match order.side {
                Side::Buy => self.bids.remove(&order_id, order.price),
                Side::Sell => self.asks.remove(&order_id, order.price),
            };
        }

        Ok(order)
    }

    /// Ratchet trailing triggers and fire any conditional orders whose
    /// trigger the recorded price has crossed. Fired orders enter the book
    /// as limit orders at their trigger level.
    pub fn activate_triggers(&mut self, current: Price, now: i64) -> Vec<SubmitOutcome> {
        let mut fired = Vec::new();

        for order_id in self.pending.clone() {
            let Some(order) = self.orders.get_mut(&order_id) else {
                continue;
            };
            let Some(trigger) = order.trigger_price else {
                continue;
            };

            if order.order_type == OrderType::Trailing {
                if let Some(offset) = order.trailing_offset {
                    // Sell triggers ratchet up behind rising prices, buy
                    // triggers ratchet down behind falling prices.
                    let candidate = match order.side {
                        Side::Sell => Price::try_new(current.as_decimal() - offset)
                            .filter(|c| *c > trigger),
                        Side::Buy => Price::try_new(current.as_decimal() + offset)
                            .filter(|c| *c < trigger),
                    };
                    if let Some(candidate) = candidate {
                        order.trigger_price = Some(candidate);
                        order.updated_at = now;
                    }
                }
            }

            let trigger = order.trigger_price.unwrap_or(trigger);
            let fires = match order.side {
                Side::Buy => current >= trigger,
                Side::Sell => current <= trigger,
            };
            if fires {
                fired.push((order_id, trigger));
            }
        }

        let mut outcomes = Vec::with_capacity(fired.len());
        for (order_id, trigger) in fired {
            self.pending.retain(|id| *id != order_id);
            if let Some(mut order) = self.orders.remove(&order_id) {
                self.unindex_expiry(&order);
                order.price = trigger;
                order.updated_at = now;
                outcomes.push(self.place(order, now));
            }
        }
        outcomes
    }

    /// Expire every order whose deadline has passed.
    ///
    /// Walks the deadline index, so the cost scales with the orders that
    /// actually expire. Returns them so reservations can be released.
    pub fn sweep_expired(&mut self, now: i64) -> Vec<Order> {
        let due: Vec<i64> = self
            .expiries
            .range(..=now)
            .map(|(deadline, _)| *deadline)
            .collect();

        let mut expired = Vec::new();
        for deadline in due {
            let Some(ids) = self.expiries.remove(&deadline) else {
                continue;
            };
            for order_id in ids {
                let Some(mut order) = self.orders.remove(&order_id) else {
                    continue;
                };
                let was_pending = order.order_type.is_conditional()
                    && self.pending.contains(&order_id);
                order.expire(now);

                if was_pending {
                    self.pending.retain(|id| *id != order_id);
                } else {
                    match order.side {
                        Side::Buy => self.bids.remove(&order_id, order.price),
                        Side::Sell => self.asks.remove(&order_id, order.price),
                    };
                }
                expired.push(order);
            }
        }
        expired
    }

    fn index_expiry(&mut self, order: &Order) {
        if let Some(deadline) = order.expires_at {
            self.expiries.entry(deadline).or_default().push(order.id);
        }
    }

    fn unindex_expiry(&mut self, order: &Order) {
        let Some(deadline) = order.expires_at else {
            return;
        };
        if let Some(ids) = self.expiries.get_mut(&deadline) {
            ids.retain(|id| *id != order.id);
            if ids.is_empty() {
                self.expiries.remove(&deadline);
            }
        }
    }

    /// A tracked (resting or pending) order; settled orders are gone.
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Orders currently tracked, resting plus pending.
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Top-N depth on both sides.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.depth_snapshot(depth),
            asks: self.asks.depth_snapshot(depth),
        }
    }

    /// True when one side of the book has no resting orders.
    pub fn has_empty_side(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Open orders for one user, oldest first.
    pub fn open_orders_for(&self, user_id: UserId) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::order::OrderStatus;

    fn price(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    fn qty(v: u64) -> Quantity {
        Quantity::from_u64(v)
    }

    fn limit(
        book: &OrderBook,
        user: UserId,
        side: Side,
        px: &str,
        quantity: u64,
        ts: i64,
    ) -> Order {
        Order::new(
            user,
            book.market_id(),
            book.option_id(),
            side,
            OrderType::Limit,
            price(px),
            qty(quantity),
            ts,
        )
    }

    fn new_book() -> OrderBook {
        OrderBook::new(MarketId::new(), OptionId::new())
    }

    #[test]
    fn test_limit_rests_when_not_crossing() {
        let mut book = new_book();
        let user = UserId::new();

        let outcome = book.submit(limit(&book, user, Side::Buy, "0.46", 10, 1), 1);
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.order.status, OrderStatus::Open);
        assert_eq!(book.best_bid(), Some(price("0.46")));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_crossing_limit_trades_at_maker_price() {
        let mut book = new_book();
        let maker = UserId::new();
        let taker = UserId::new();

        book.submit(limit(&book, maker, Side::Sell, "0.54", 10, 1), 1);
        let outcome = book.submit(limit(&book, taker, Side::Buy, "0.60", 4, 2), 2);

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, price("0.54"));
        assert_eq!(outcome.trades[0].quantity, qty(4));
        assert_eq!(outcome.trades[0].taker_side, Side::Buy);
        assert_eq!(outcome.order.status, OrderStatus::Filled);
        // Maker keeps resting with the remainder
        assert_eq!(book.snapshot(1).asks, vec![(price("0.54"), qty(6))]);
    }

    #[test]
    fn test_price_time_priority_across_levels() {
        let mut book = new_book();
        let a = UserId::new();
        let b = UserId::new();
        let taker = UserId::new();

        book.submit(limit(&book, a, Side::Sell, "0.55", 5, 1), 1);
        book.submit(limit(&book, b, Side::Sell, "0.54", 5, 2), 2);

        let outcome = book.submit(limit(&book, taker, Side::Buy, "0.55", 8, 3), 3);
        // Best-priced ask fills first despite arriving later
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, price("0.54"));
        assert_eq!(outcome.trades[0].quantity, qty(5));
        assert_eq!(outcome.trades[1].price, price("0.55"));
        assert_eq!(outcome.trades[1].quantity, qty(3));
    }

    #[test]
    fn test_fifo_within_level() {
        let mut book = new_book();
        let first = UserId::new();
        let second = UserId::new();

        let first_order = book.submit(limit(&book, first, Side::Sell, "0.54", 5, 1), 1);
        book.submit(limit(&book, second, Side::Sell, "0.54", 5, 2), 2);

        let outcome = book.submit(limit(&book, UserId::new(), Side::Buy, "0.54", 5, 3), 3);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].maker_order_id, first_order.order.id);
    }

    #[test]
    fn test_market_buy_walks_book_and_cancels_remainder() {
        let mut book = new_book();
        let maker = UserId::new();
        book.submit(limit(&book, maker, Side::Sell, "0.54", 3, 1), 1);
        book.submit(limit(&book, maker, Side::Sell, "0.55", 3, 2), 2);

        let mut order = limit(&book, UserId::new(), Side::Buy, "0.99", 10, 3);
        order.order_type = OrderType::Market;
        let outcome = book.submit(order, 3);

        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.order.filled_quantity, qty(6));
        // Unfilled remainder never rests
        assert_eq!(outcome.order.status, OrderStatus::Cancelled);
        assert_eq!(book.best_bid(), None);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_self_trade_skips_to_next_maker() {
        let mut book = new_book();
        let user = UserId::new();
        let other = UserId::new();

        book.submit(limit(&book, user, Side::Sell, "0.54", 5, 1), 1);
        let other_ask = book.submit(limit(&book, other, Side::Sell, "0.55", 5, 2), 2);

        let outcome = book.submit(limit(&book, user, Side::Buy, "0.55", 5, 3), 3);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].maker_order_id, other_ask.order.id);
        assert!(outcome.trades[0].validate_no_self_trade());
        // The user's own ask still rests at the best price
        assert_eq!(book.best_ask(), Some(price("0.54")));
    }

    #[test]
    fn test_cancel_returns_remainder_and_clears_level() {
        let mut book = new_book();
        let user = UserId::new();

        let placed = book.submit(limit(&book, user, Side::Buy, "0.46", 10, 1), 1);
        let cancelled = book.cancel(placed.order.id, user, 2).unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.remaining(), qty(10));
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_cancel_rejects_wrong_owner_and_settled() {
        let mut book = new_book();
        let owner = UserId::new();
        let placed = book.submit(limit(&book, owner, Side::Buy, "0.46", 10, 1), 1);

        let err = book.cancel(placed.order.id, UserId::new(), 2).unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));

        book.cancel(placed.order.id, owner, 3).unwrap();
        // A cancelled order has left the book entirely
        let err = book.cancel(placed.order.id, owner, 4).unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[test]
    fn test_settled_orders_leave_the_book() {
        let mut book = new_book();
        let maker = UserId::new();
        let ask = book.submit(limit(&book, maker, Side::Sell, "0.54", 4, 1), 1);
        let outcome = book.submit(limit(&book, UserId::new(), Side::Buy, "0.54", 4, 2), 2);

        assert_eq!(outcome.order.status, OrderStatus::Filled);
        let settled: Vec<OrderId> = outcome.completed.iter().map(|o| o.id).collect();
        assert!(settled.contains(&ask.order.id));
        assert!(settled.contains(&outcome.order.id));
        assert!(book.order(&ask.order.id).is_none());
        assert!(book.order(&outcome.order.id).is_none());
        assert_eq!(book.open_order_count(), 0);
    }

    #[test]
    fn test_sweep_drops_expired_from_tracking() {
        let mut book = new_book();
        let user = UserId::new();
        let mut with_deadline = limit(&book, user, Side::Buy, "0.46", 10, 1);
        with_deadline.expires_at = Some(100);
        let expiring = book.submit(with_deadline, 1).order.id;
        book.submit(limit(&book, user, Side::Buy, "0.45", 10, 1), 1);

        let expired = book.sweep_expired(100);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, expiring);
        assert!(book.order(&expiring).is_none());
        assert_eq!(book.open_order_count(), 1);
        // Deadline index is spent
        assert!(book.sweep_expired(i64::MAX).is_empty());
    }

    #[test]
    fn test_stop_buy_fires_at_or_above_trigger() {
        let mut book = new_book();
        let maker = UserId::new();
        book.submit(limit(&book, maker, Side::Sell, "0.60", 5, 1), 1);

        let mut stop = limit(&book, UserId::new(), Side::Buy, "0.62", 5, 2);
        stop.order_type = OrderType::Stop;
        stop.trigger_price = Some(price("0.58"));
        book.submit(stop, 2);
        assert_eq!(book.pending_count(), 1);

        // Below the trigger nothing fires
        assert!(book.activate_triggers(price("0.55"), 3).is_empty());
        assert_eq!(book.pending_count(), 1);

        let outcomes = book.activate_triggers(price("0.58"), 4);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(book.pending_count(), 0);
        // Fired as a limit at the trigger level; 0.58 < 0.60 so it rests
        assert_eq!(outcomes[0].order.price, price("0.58"));
        assert!(outcomes[0].trades.is_empty());
        assert_eq!(book.best_bid(), Some(price("0.58")));
    }

    #[test]
    fn test_stop_sell_fires_at_or_below_trigger() {
        let mut book = new_book();
        let mut stop = limit(&book, UserId::new(), Side::Sell, "0.40", 5, 1);
        stop.order_type = OrderType::Stop;
        stop.trigger_price = Some(price("0.42"));
        book.submit(stop, 1);

        assert!(book.activate_triggers(price("0.45"), 2).is_empty());
        let outcomes = book.activate_triggers(price("0.41"), 3);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(book.best_ask(), Some(price("0.42")));
    }

    #[test]
    fn test_trailing_sell_ratchets_up_then_fires() {
        let mut book = new_book();
        let mut trailing = limit(&book, UserId::new(), Side::Sell, "0.40", 5, 1);
        trailing.order_type = OrderType::Trailing;
        trailing.trigger_price = Some(price("0.45"));
        trailing.trailing_offset = Some(Decimal::from_str_exact("0.05").unwrap());
        let id = book.submit(trailing, 1).order.id;

        // Price rises: trigger follows at the fixed offset
        assert!(book.activate_triggers(price("0.60"), 2).is_empty());
        assert_eq!(book.order(&id).unwrap().trigger_price, Some(price("0.55")));

        // A dip that stays above the ratcheted trigger does not fire
        assert!(book.activate_triggers(price("0.57"), 3).is_empty());
        assert_eq!(book.order(&id).unwrap().trigger_price, Some(price("0.55")));

        // Falling to the trigger fires at the ratcheted level
        let outcomes = book.activate_triggers(price("0.55"), 4);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].order.price, price("0.55"));
    }

    #[test]
    fn test_trailing_buy_ratchets_down() {
        let mut book = new_book();
        let mut trailing = limit(&book, UserId::new(), Side::Buy, "0.60", 5, 1);
        trailing.order_type = OrderType::Trailing;
        trailing.trigger_price = Some(price("0.55"));
        trailing.trailing_offset = Some(Decimal::from_str_exact("0.05").unwrap());
        let id = book.submit(trailing, 1).order.id;

        assert!(book.activate_triggers(price("0.40"), 2).is_empty());
        assert_eq!(book.order(&id).unwrap().trigger_price, Some(price("0.45")));

        let outcomes = book.activate_triggers(price("0.45"), 3);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].order.price, price("0.45"));
    }

    #[test]
    fn test_sweep_expired_releases_orders() {
        let mut book = new_book();
        let user = UserId::new();
        let mut order = limit(&book, user, Side::Buy, "0.46", 10, 1);
        order.expires_at = Some(100);
        let id = book.submit(order, 1).order.id;

        assert!(book.sweep_expired(99).is_empty());
        let expired = book.sweep_expired(100);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, id);
        assert_eq!(expired[0].status, OrderStatus::Expired);
        assert_eq!(book.best_bid(), None);
    }

    #[test]
    fn test_snapshot_depth_both_sides() {
        let mut book = new_book();
        let user = UserId::new();
        for (side, px) in [
            (Side::Buy, "0.46"),
            (Side::Buy, "0.45"),
            (Side::Sell, "0.54"),
            (Side::Sell, "0.55"),
        ] {
            book.submit(limit(&book, user, side, px, 10, 1), 1);
        }

        let snapshot = book.snapshot(5);
        assert_eq!(snapshot.bids[0].0, price("0.46"));
        assert_eq!(snapshot.asks[0].0, price("0.54"));
        assert!(!book.has_empty_side());
    }

    #[test]
    fn test_open_orders_for_user_sorted_by_age() {
        let mut book = new_book();
        let user = UserId::new();
        let first = book.submit(limit(&book, user, Side::Buy, "0.45", 1, 1), 1);
        let second = book.submit(limit(&book, user, Side::Buy, "0.44", 1, 2), 2);
        book.submit(limit(&book, UserId::new(), Side::Buy, "0.43", 1, 3), 3);

        let open = book.open_orders_for(user);
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].id, first.order.id);
        assert_eq!(open[1].id, second.order.id);
    }
}
