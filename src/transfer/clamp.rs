//! Balance-aware clamping of the transfer amount.
//!
//! A fixed reserve is always withheld so the account can pay fees. If the
//! balance does not cover the reserve the transfer fails outright; otherwise
//! the amount is reduced to whatever is left above the reserve.

use alloy::primitives::U256;

use crate::transfer::types::{Shortfall, TransferError};

/// Amount actually transferable for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub amount: U256,
    pub requested: U256,
}

impl Clamped {
    pub fn was_reduced(&self) -> bool {
        self.amount < self.requested
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmountClamper {
    reserve: U256,
}

impl AmountClamper {
    pub fn new(reserve: U256) -> Self {
        Self { reserve }
    }

    pub fn reserve(&self) -> U256 {
        self.reserve
    }

    /// `min(requested, balance - reserve)`, failing when the balance is below
    /// the reserve or nothing remains above it.
    pub fn clamp(&self, requested: U256, balance: U256) -> Result<Clamped, TransferError> {
        let spendable = balance
            .checked_sub(self.reserve)
            .ok_or_else(|| self.insufficient(Shortfall::BelowReserve, balance))?;

        let amount = requested.min(spendable);
        if amount.is_zero() {
            return Err(self.insufficient(Shortfall::NothingAfterReserve, balance));
        }

        Ok(Clamped { amount, requested })
    }

    fn insufficient(&self, shortfall: Shortfall, balance: U256) -> TransferError {
        TransferError::InsufficientFunds {
            shortfall,
            balance,
            reserve: self.reserve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::utils::parse_ether;

    fn eth(text: &str) -> U256 {
        parse_ether(text).unwrap()
    }

    fn clamper() -> AmountClamper {
        AmountClamper::new(eth("0.002"))
    }

    #[test]
    fn test_ample_balance_leaves_amount_untouched() {
        let clamped = clamper().clamp(eth("0.01"), eth("0.05")).unwrap();
        assert_eq!(clamped.amount, eth("0.01"));
        assert!(!clamped.was_reduced());
    }

    #[test]
    fn test_tight_balance_reduces_amount() {
        let clamped = clamper().clamp(eth("0.01"), eth("0.011")).unwrap();
        assert_eq!(clamped.amount, eth("0.009"));
        assert_eq!(clamped.requested, eth("0.01"));
        assert!(clamped.was_reduced());
    }

    #[test]
    fn test_below_reserve_fails_with_balance() {
        let err = clamper().clamp(eth("0.01"), eth("0.001")).unwrap_err();
        match err {
            TransferError::InsufficientFunds {
                shortfall, balance, ..
            } => {
                assert_eq!(shortfall, Shortfall::BelowReserve);
                assert_eq!(balance, eth("0.001"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exactly_reserve_fails_after_reserve() {
        let err = clamper().clamp(eth("0.01"), eth("0.002")).unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientFunds {
                shortfall: Shortfall::NothingAfterReserve,
                ..
            }
        ));
    }

    #[test]
    fn test_one_wei_above_reserve_sends_one_wei() {
        let balance = eth("0.002") + U256::from(1u64);
        let clamped = clamper().clamp(eth("1"), balance).unwrap();
        assert_eq!(clamped.amount, U256::from(1u64));
    }

    #[test]
    fn test_clamped_never_exceeds_spendable() {
        let reserve = eth("0.002");
        for (requested, balance) in [("0.5", "0.1"), ("0.003", "0.004"), ("2", "2.002")] {
            let clamped = clamper().clamp(eth(requested), eth(balance)).unwrap();
            assert!(clamped.amount <= eth(balance) - reserve);
            assert!(clamped.amount <= eth(requested));
        }
    }
}
