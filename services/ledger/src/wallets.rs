//! Wallet ledger
//!
//! Holds every user's cash wallet plus an append-only transaction log.
//! Trade settlement debits the buyer's reservation and credits the seller
//! inside one lock acquisition, so total cash only changes via deposits.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use tracing::debug;
use types::errors::WalletError;
use types::ids::UserId;
use types::trade::Trade;
use types::wallet::{TransactionKind, Wallet, WalletTransaction};
use uuid::Uuid;

#[derive(Debug, Default)]
struct WalletState {
    wallets: HashMap<UserId, Wallet>,
    log: Vec<WalletTransaction>,
}

/// Thread-safe cash ledger.
#[derive(Debug, Default)]
pub struct WalletLedger {
    inner: Mutex<WalletState>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WalletState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit available funds, creating the wallet on first deposit.
    pub fn deposit(&self, user_id: UserId, amount: Decimal, now: i64) {
        let mut state = self.state();
        state
            .wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::new(user_id, Decimal::ZERO))
            .credit(amount);
        state.log.push(WalletTransaction::new(
            user_id,
            TransactionKind::Deposit,
            amount,
            None,
            now,
        ));
        debug!(user_id = %user_id, %amount, "deposit credited");
    }

    /// Move cash from available into the reservation for a new buy order.
    pub fn reserve(&self, user_id: UserId, amount: Decimal) -> Result<(), WalletError> {
        let mut state = self.state();
        let wallet = state
            .wallets
            .get_mut(&user_id)
            .ok_or(WalletError::NotFound { user_id })?;

        if amount > wallet.available {
            return Err(WalletError::InsufficientFunds {
                required: amount.to_string(),
                available: wallet.available.to_string(),
            });
        }
        wallet.reserve(amount);
        Ok(())
    }

    /// Return reserved cash to available and log the refund.
    ///
    /// Used for cancel/expiry refunds and per-fill price improvement.
    pub fn release(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference: Option<Uuid>,
        now: i64,
    ) -> Result<(), WalletError> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut state = self.state();
        let wallet = state
            .wallets
            .get_mut(&user_id)
            .ok_or(WalletError::NotFound { user_id })?;

        if amount > wallet.reserved {
            return Err(WalletError::InsufficientFunds {
                required: amount.to_string(),
                available: wallet.reserved.to_string(),
            });
        }
        wallet.release(amount);
        state.log.push(WalletTransaction::new(
            user_id,
            TransactionKind::Refund,
            amount,
            reference,
            now,
        ));
        Ok(())
    }

    /// Settle one trade: debit the buyer's reservation, credit the seller,
    /// log both legs. All-or-nothing under a single lock; returns the two
    /// log entries for persistence.
    pub fn settle_trade(&self, trade: &Trade) -> Result<Vec<WalletTransaction>, WalletError> {
        let value = trade.value();
        let buyer = trade.buyer();
        let seller = trade.seller();
        let mut state = self.state();

        {
            let buyer_wallet = state
                .wallets
                .get(&buyer)
                .ok_or(WalletError::NotFound { user_id: buyer })?;
            if value > buyer_wallet.reserved {
                return Err(WalletError::InsufficientFunds {
                    required: value.to_string(),
                    available: buyer_wallet.reserved.to_string(),
                });
            }
            if !state.wallets.contains_key(&seller) {
                return Err(WalletError::NotFound { user_id: seller });
            }
        }

        if let Some(buyer_wallet) = state.wallets.get_mut(&buyer) {
            buyer_wallet.debit_reserved(value);
        }
        if let Some(seller_wallet) = state.wallets.get_mut(&seller) {
            seller_wallet.credit(value);
        }

        let reference = Some(*trade.id.as_uuid());
        let legs = vec![
            WalletTransaction::new(
                buyer,
                TransactionKind::TradeDebit,
                -value,
                reference,
                trade.executed_at,
            ),
            WalletTransaction::new(
                seller,
                TransactionKind::TradeCredit,
                value,
                reference,
                trade.executed_at,
            ),
        ];
        state.log.extend(legs.iter().cloned());
        debug!(trade_id = %trade.id, %value, "trade settled");
        Ok(legs)
    }

    pub fn wallet(&self, user_id: UserId) -> Option<Wallet> {
        self.state().wallets.get(&user_id).cloned()
    }

    pub fn available(&self, user_id: UserId) -> Decimal {
        self.state()
            .wallets
            .get(&user_id)
            .map(|w| w.available)
            .unwrap_or(Decimal::ZERO)
    }

    /// Transaction history for one user, oldest first.
    pub fn transactions(&self, user_id: UserId) -> Vec<WalletTransaction> {
        self.state()
            .log
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Sum of all balances. Conserved by settlement; only deposits move it.
    pub fn total_cash(&self) -> Decimal {
        self.state().wallets.values().map(|w| w.balance()).sum()
    }

    /// Every wallet satisfies the non-negativity invariant.
    pub fn check_invariants(&self) -> bool {
        self.state().wallets.values().all(|w| w.check_invariant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{MarketId, OptionId, OrderId};
    use types::numeric::{Price, Quantity};
    use types::order::Side;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn trade_between(buyer: UserId, seller: UserId, price: &str, quantity: u64) -> Trade {
        Trade::new(
            MarketId::new(),
            OptionId::new(),
            OrderId::new(),
            OrderId::new(),
            seller,
            buyer,
            Side::Buy,
            Price::from_str(price).unwrap(),
            Quantity::from_u64(quantity),
            1,
        )
    }

    #[test]
    fn test_deposit_creates_wallet_and_logs() {
        let ledger = WalletLedger::new();
        let user = UserId::new();
        ledger.deposit(user, dec("100"), 1);

        assert_eq!(ledger.available(user), dec("100"));
        let txs = ledger.transactions(user);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Deposit);
    }

    #[test]
    fn test_reserve_rejects_overdraw() {
        let ledger = WalletLedger::new();
        let user = UserId::new();
        ledger.deposit(user, dec("4.00"), 1);

        let err = ledger.reserve(user, dec("5.00")).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        // Nothing was moved
        assert_eq!(ledger.available(user), dec("4.00"));
    }

    #[test]
    fn test_settle_trade_moves_cash_atomically() {
        let ledger = WalletLedger::new();
        let buyer = UserId::new();
        let seller = UserId::new();
        ledger.deposit(buyer, dec("100"), 1);
        ledger.deposit(seller, dec("50"), 1);
        ledger.reserve(buyer, dec("5.40")).unwrap();

        let trade = trade_between(buyer, seller, "0.54", 10);
        ledger.settle_trade(&trade).unwrap();

        assert_eq!(ledger.available(buyer), dec("94.60"));
        assert_eq!(ledger.wallet(buyer).unwrap().reserved, Decimal::ZERO);
        assert_eq!(ledger.available(seller), dec("55.40"));
        // Cash is conserved
        assert_eq!(ledger.total_cash(), dec("150"));
        assert!(ledger.check_invariants());

        let legs = ledger.transactions(buyer);
        assert_eq!(legs.last().unwrap().kind, TransactionKind::TradeDebit);
        assert_eq!(legs.last().unwrap().amount, dec("-5.40"));
    }

    #[test]
    fn test_settle_fails_without_reservation() {
        let ledger = WalletLedger::new();
        let buyer = UserId::new();
        let seller = UserId::new();
        ledger.deposit(buyer, dec("100"), 1);
        ledger.deposit(seller, dec("0"), 1);

        let trade = trade_between(buyer, seller, "0.54", 10);
        let err = ledger.settle_trade(&trade).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        // Failed settlement leaves both wallets untouched
        assert_eq!(ledger.available(buyer), dec("100"));
        assert_eq!(ledger.available(seller), dec("0"));
    }

    #[test]
    fn test_release_refunds_and_logs() {
        let ledger = WalletLedger::new();
        let user = UserId::new();
        ledger.deposit(user, dec("10"), 1);
        ledger.reserve(user, dec("6")).unwrap();

        ledger.release(user, dec("2"), None, 2).unwrap();
        assert_eq!(ledger.available(user), dec("6"));
        assert_eq!(ledger.wallet(user).unwrap().reserved, dec("4"));

        let txs = ledger.transactions(user);
        assert_eq!(txs.last().unwrap().kind, TransactionKind::Refund);
    }

    #[test]
    fn test_release_zero_is_noop() {
        let ledger = WalletLedger::new();
        let user = UserId::new();
        ledger.deposit(user, dec("10"), 1);

        ledger.release(user, Decimal::ZERO, None, 2).unwrap();
        assert_eq!(ledger.transactions(user).len(), 1);
    }
}
