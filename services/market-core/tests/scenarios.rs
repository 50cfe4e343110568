//! End-to-end command scenarios against an in-memory core.

use std::sync::Arc;

use market_core::{BroadcastEvent, MarketCore, MemoryRepository, RecordingPublisher};
use rust_decimal::Decimal;
use types::errors::{CoreError, PositionError, WalletError};
use types::ids::UserId;
use types::market::Market;
use types::numeric::Price;
use types::order::{OrderParams, OrderStatus, OrderType, Side};

fn dec(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn price(s: &str) -> Price {
    Price::from_str(s).unwrap()
}

struct Harness {
    core: Arc<MarketCore>,
    publisher: Arc<RecordingPublisher>,
    market: Market,
}

impl Harness {
    fn new(initial_price: &str) -> Self {
        let publisher = Arc::new(RecordingPublisher::new());
        let core = Arc::new(MarketCore::new(
            Arc::new(MemoryRepository::new()),
            publisher.clone(),
        ));
        let market = core
            .initialize_market("Will it rain tomorrow?", "Weather", price(initial_price))
            .unwrap();
        Self {
            core,
            publisher,
            market,
        }
    }

    fn yes_option(&self) -> types::ids::OptionId {
        self.market.option_ids[0]
    }

    fn funded_user(&self, cash: &str) -> UserId {
        let user = UserId::new();
        self.core.deposit(user, dec(cash)).unwrap();
        user
    }

    fn holder(&self, shares: &str) -> UserId {
        let user = UserId::new();
        self.core.deposit(user, dec("100")).unwrap();
        self.core
            .grant_shares(user, self.market.id, self.yes_option(), dec(shares))
            .unwrap();
        user
    }

    fn params(&self, user: UserId, side: Side, order_type: OrderType) -> OrderParams {
        OrderParams {
            user_id: user,
            market_id: self.market.id,
            option_id: self.yes_option(),
            side,
            order_type,
            price: None,
            quantity: Decimal::ONE,
            trigger_price: None,
            trailing_offset: None,
            expires_at: None,
        }
    }

    async fn place_ask(&self, user: UserId, px: &str, quantity: &str) {
        let mut params = self.params(user, Side::Sell, OrderType::Limit);
        params.price = Some(dec(px));
        params.quantity = dec(quantity);
        self.core.create_order(params).await.unwrap();
    }
}

#[tokio::test]
async fn market_buy_walks_seeded_asks_and_records_last_level() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");
    for px in ["0.54", "0.55", "0.56"] {
        h.place_ask(seller, px, "2").await;
    }

    let buyer = h.funded_user("50");
    let mut params = h.params(buyer, Side::Buy, OrderType::Market);
    params.quantity = dec("5");
    let order = h.core.create_order(params).await.unwrap();

    assert_eq!(order.status, OrderStatus::Filled);

    // 2 @ 0.54 + 2 @ 0.55 + 1 @ 0.56; the last consumed level is current
    let option = h.core.option(h.yes_option()).unwrap();
    assert_eq!(option.current_price, price("0.56"));
    assert_eq!(option.last_price, price("0.55"));

    // Buyer paid exactly the traded value
    assert_eq!(h.core.wallets().available(buyer), dec("50") - dec("2.74"));
    assert_eq!(h.core.wallets().wallet(buyer).unwrap().reserved, Decimal::ZERO);

    // Seller pocketed it, with one partially filled ask still reserved
    let position = h
        .core
        .positions()
        .position(seller, h.market.id, h.yes_option())
        .unwrap();
    assert_eq!(position.quantity, dec("5"));
    assert_eq!(position.reserved, dec("1"));
}

#[tokio::test]
async fn insufficient_funds_rejects_before_any_book_change() {
    let h = Harness::new("0.50");
    let buyer = h.funded_user("4.00");

    // 10 × 0.50 = 5.00 > 4.00 available
    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.50"));
    params.quantity = dec("10");
    let err = h.core.create_order(params).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Wallet(WalletError::InsufficientFunds { .. })
    ));
    assert_eq!(h.core.wallets().available(buyer), dec("4.00"));

    let view = h.core.order_book(h.market.id, h.yes_option(), 5).unwrap();
    assert!(view.bids.iter().all(|l| l.synthetic));
}

#[tokio::test]
async fn insufficient_shares_rejects_sell() {
    let h = Harness::new("0.50");
    let seller = h.holder("3");

    let mut params = h.params(seller, Side::Sell, OrderType::Limit);
    params.price = Some(dec("0.55"));
    params.quantity = dec("5");
    let err = h.core.create_order(params).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Position(PositionError::InsufficientShares { .. })
    ));
}

#[tokio::test]
async fn limit_buy_price_improvement_is_refunded_per_fill() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");
    h.place_ask(seller, "0.54", "4").await;

    let buyer = h.funded_user("10");
    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.60"));
    params.quantity = dec("4");
    let order = h.core.create_order(params).await.unwrap();

    assert_eq!(order.status, OrderStatus::Filled);
    // Reserved 2.40 at the limit, spent 2.16 at the maker price
    assert_eq!(h.core.wallets().available(buyer), dec("10") - dec("2.16"));
    assert_eq!(h.core.wallets().wallet(buyer).unwrap().reserved, Decimal::ZERO);
}

#[tokio::test]
async fn cancel_refunds_the_unfilled_remainder() {
    let h = Harness::new("0.50");
    let buyer = h.funded_user("10");

    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.46"));
    params.quantity = dec("10");
    let order = h.core.create_order(params).await.unwrap();

    assert_eq!(h.core.wallets().available(buyer), dec("5.40"));
    assert!(h.core.cancel_order(order.id, buyer).await);
    assert_eq!(h.core.wallets().available(buyer), dec("10"));

    // Second cancel is a no-op
    assert!(!h.core.cancel_order(order.id, buyer).await);
}

#[tokio::test]
async fn expired_order_is_swept_and_refunded_on_next_touch() {
    let h = Harness::new("0.50");
    let buyer = h.funded_user("10");

    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.46"));
    params.quantity = dec("10");
    params.expires_at = Some(1); // long past
    h.core.create_order(params).await.unwrap();
    assert_eq!(h.core.wallets().available(buyer), dec("5.40"));

    // Any later submission sweeps the book first
    let other = h.funded_user("10");
    let mut params = h.params(other, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.40"));
    h.core.create_order(params).await.unwrap();

    assert_eq!(h.core.wallets().available(buyer), dec("10"));
    let expired = h
        .publisher
        .events()
        .into_iter()
        .filter(|(_, e)| matches!(e, BroadcastEvent::OrderExpired { .. }))
        .count();
    assert_eq!(expired, 1);
}

#[tokio::test]
async fn stop_buy_fires_once_price_reaches_trigger() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");
    h.place_ask(seller, "0.55", "2").await;

    let stop_user = h.funded_user("10");
    let mut params = h.params(stop_user, Side::Buy, OrderType::Stop);
    params.trigger_price = Some(dec("0.55"));
    params.quantity = dec("2");
    h.core.create_order(params).await.unwrap();

    // No trade yet, so the stop stays pending and its cash stays reserved
    assert_eq!(h.core.wallets().wallet(stop_user).unwrap().reserved, dec("1.10"));

    // A trade at 0.55 moves the recorded price onto the trigger
    let buyer = h.funded_user("10");
    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.55"));
    params.quantity = dec("1");
    h.core.create_order(params).await.unwrap();

    // The fired stop rests as a bid at its trigger level
    let view = h.core.order_book(h.market.id, h.yes_option(), 5).unwrap();
    assert!(view
        .bids
        .iter()
        .any(|l| !l.synthetic && l.price == price("0.55")));
}

#[tokio::test]
async fn implied_probabilities_follow_trades() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");
    h.place_ask(seller, "0.75", "1").await;

    let buyer = h.funded_user("10");
    let mut params = h.params(buyer, Side::Buy, OrderType::Limit);
    params.price = Some(dec("0.75"));
    h.core.create_order(params).await.unwrap();

    let probs = h.core.implied_probabilities(h.market.id);
    assert_eq!(probs.len(), 2);
    // YES weight 0.75, NO weight 0.50 → 0.6 / 0.4
    assert_eq!(probs[0].1, dec("0.6"));
    assert_eq!(probs[1].1, dec("0.4"));
}

#[tokio::test]
async fn every_event_publishes_on_the_market_topic() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");
    h.place_ask(seller, "0.54", "1").await;

    let buyer = h.funded_user("10");
    let params = h.params(buyer, Side::Buy, OrderType::Market);
    h.core.create_order(params).await.unwrap();

    let events = h.publisher.events();
    let market_topic = format!("market:{}", h.market.id);
    assert!(events
        .iter()
        .any(|(t, e)| t == &market_topic && matches!(e, BroadcastEvent::TradeExecuted { .. })));
    assert!(events
        .iter()
        .any(|(t, e)| t == &market_topic && matches!(e, BroadcastEvent::PriceChanged { .. })));
    assert!(events
        .iter()
        .any(|(t, e)| t == &market_topic && matches!(e, BroadcastEvent::OrderAccepted { .. })));
    assert!(events.iter().all(|(t, _)| t == &market_topic));
}

#[tokio::test]
async fn market_sell_with_no_bids_cancels_and_releases_shares() {
    let h = Harness::new("0.50");
    let seller = h.holder("10");

    let mut params = h.params(seller, Side::Sell, OrderType::Market);
    params.quantity = dec("5");
    let order = h.core.create_order(params).await.unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    let position = h
        .core
        .positions()
        .position(seller, h.market.id, h.yes_option())
        .unwrap();
    assert_eq!(position.reserved, Decimal::ZERO);
    assert_eq!(position.quantity, dec("10"));
}

#[tokio::test]
async fn initialize_market_creates_complementary_pair() {
    let h = Harness::new("0.60");
    let options = h.core.options_of(h.market.id);
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].name, "YES");
    assert_eq!(options[0].current_price, price("0.60"));
    assert_eq!(options[1].name, "NO");
    assert_eq!(options[1].current_price, price("0.40"));
}
