//! Bot trading strategies
//!
//! Four fixed behaviors. A strategy only decides side and price offset; the
//! manager sizes, submits, and handles rejections.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::market::MarketOption;
use types::numeric::Price;
use types::order::Side;

/// Closed set of bot behaviors, fixed per bot at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Quotes around the current price on a random side
    MarketMaker,
    /// Joins the direction of the last price move
    TrendFollower,
    /// Fades the last price move
    Contrarian,
    /// Uniformly random side and offset
    Random,
}

impl Strategy {
    /// Cycle used when registering a pool of bots.
    pub fn all() -> [Strategy; 4] {
        [
            Strategy::MarketMaker,
            Strategy::TrendFollower,
            Strategy::Contrarian,
            Strategy::Random,
        ]
    }

    /// Quote decision for one option: side and limit price.
    ///
    /// Returns `None` when no valid price exists inside the option's band.
    pub fn quote(
        &self,
        option: &MarketOption,
        spread: Decimal,
        rng: &mut ChaCha8Rng,
    ) -> Option<(Side, Price)> {
        let current = option.current_price.as_decimal();
        let last = option.last_price.as_decimal();

        let side = match self {
            Strategy::MarketMaker | Strategy::Random => {
                if rng.gen_bool(0.5) {
                    Side::Buy
                } else {
                    Side::Sell
                }
            }
            Strategy::TrendFollower => {
                if current >= last {
                    Side::Buy
                } else {
                    Side::Sell
                }
            }
            Strategy::Contrarian => {
                if current >= last {
                    Side::Sell
                } else {
                    Side::Buy
                }
            }
        };

        let offset = match self {
            // Passive quotes one spread away from the current price
            Strategy::MarketMaker => spread,
            // Directional bots quote at the touch so they can trade
            Strategy::TrendFollower | Strategy::Contrarian => Decimal::ZERO,
            Strategy::Random => {
                let ticks = rng.gen_range(0..=4);
                Decimal::new(ticks, 2)
            }
        };

        let raw = match side {
            Side::Buy => current - offset,
            Side::Sell => current + offset,
        };
        let price = Price::try_new(raw)?.clamp_to(option.min_price, option.max_price);
        Some((side, price))
    }
}
