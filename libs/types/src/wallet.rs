//! Wallet and transaction-log types
//!
//! Invariant: available and reserved are never negative. Buy orders reserve
//! cash at submission, so no sequence of valid orders can overdraw a wallet.

use crate::ids::{TransactionId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's cash wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    /// Spendable balance
    pub available: Decimal,
    /// Balance locked by open buy orders
    pub reserved: Decimal,
}

impl Wallet {
    /// Create a wallet with an initial available balance.
    pub fn new(user_id: UserId, available: Decimal) -> Self {
        Self {
            user_id,
            available,
            reserved: Decimal::ZERO,
        }
    }

    /// Total balance (available + reserved).
    pub fn balance(&self) -> Decimal {
        self.available + self.reserved
    }

    /// Check wallet invariant: nothing negative.
    pub fn check_invariant(&self) -> bool {
        self.available >= Decimal::ZERO && self.reserved >= Decimal::ZERO
    }

    /// Move funds from available into the reservation.
    ///
    /// # Panics
    /// Panics if the amount exceeds the available balance.
    pub fn reserve(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "reserve amount must be non-negative");
        assert!(amount <= self.available, "insufficient available balance");

        self.available -= amount;
        self.reserved += amount;

        debug_assert!(self.check_invariant());
    }

    /// Return reserved funds to available (cancel/expiry refund).
    ///
    /// # Panics
    /// Panics if the amount exceeds the reservation.
    pub fn release(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "release amount must be non-negative");
        assert!(amount <= self.reserved, "release exceeds reservation");

        self.reserved -= amount;
        self.available += amount;

        debug_assert!(self.check_invariant());
    }

    /// Spend reserved funds (buy-side settlement of a fill).
    ///
    /// # Panics
    /// Panics if the amount exceeds the reservation.
    pub fn debit_reserved(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "debit amount must be non-negative");
        assert!(amount <= self.reserved, "debit exceeds reservation");

        self.reserved -= amount;

        debug_assert!(self.check_invariant());
    }

    /// Credit available funds (sell-side settlement, deposit).
    pub fn credit(&mut self, amount: Decimal) {
        assert!(amount >= Decimal::ZERO, "credit amount must be non-negative");
        self.available += amount;
    }
}

/// Why a wallet balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Buy-side debit for a fill
    TradeDebit,
    /// Sell-side credit for a fill
    TradeCredit,
    /// Reservation returned on cancel/expiry
    Refund,
    /// External deposit (provisioning)
    Deposit,
}

/// One entry in the wallet transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Signed amount: negative for debits
    pub amount: Decimal,
    /// Trade or order this entry settles, when applicable
    pub reference: Option<Uuid>,
    pub created_at: i64,
}

impl WalletTransaction {
    /// Create a new transaction record.
    pub fn new(
        user_id: UserId,
        kind: TransactionKind,
        amount: Decimal,
        reference: Option<Uuid>,
        created_at: i64,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            kind,
            amount,
            reference,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_wallet_reserve_release() {
        let mut wallet = Wallet::new(UserId::new(), dec("100"));
        wallet.reserve(dec("30"));

        assert_eq!(wallet.available, dec("70"));
        assert_eq!(wallet.reserved, dec("30"));
        assert_eq!(wallet.balance(), dec("100"));

        wallet.release(dec("10"));
        assert_eq!(wallet.available, dec("80"));
        assert_eq!(wallet.reserved, dec("20"));
        assert!(wallet.check_invariant());
    }

    #[test]
    fn test_wallet_debit_reserved() {
        let mut wallet = Wallet::new(UserId::new(), dec("100"));
        wallet.reserve(dec("30"));
        wallet.debit_reserved(dec("30"));

        assert_eq!(wallet.balance(), dec("70"));
        assert!(wallet.check_invariant());
    }

    #[test]
    fn test_wallet_credit() {
        let mut wallet = Wallet::new(UserId::new(), dec("5"));
        wallet.credit(dec("2.5"));
        assert_eq!(wallet.available, dec("7.5"));
    }

    #[test]
    #[should_panic(expected = "insufficient available balance")]
    fn test_over_reserve_panics() {
        let mut wallet = Wallet::new(UserId::new(), dec("4"));
        wallet.reserve(dec("5"));
    }

    #[test]
    #[should_panic(expected = "release exceeds reservation")]
    fn test_over_release_panics() {
        let mut wallet = Wallet::new(UserId::new(), dec("10"));
        wallet.reserve(dec("3"));
        wallet.release(dec("4"));
    }

    #[test]
    fn test_transaction_record() {
        let user = UserId::new();
        let tx = WalletTransaction::new(user, TransactionKind::TradeDebit, dec("-5.4"), None, 1);
        assert_eq!(tx.user_id, user);
        assert_eq!(tx.kind, TransactionKind::TradeDebit);

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("trade_debit"));
    }
}
