//! Per-holder accrual record.

use serde::{Deserialize, Serialize};

use crate::math::{self, MathError};
use crate::types::{Amount, Rate, Timestamp};

/// Everything the ledger knows about one holder.
///
/// A holder that has never been touched is indistinguishable from
/// `HolderRecord::default()`. Once activated, `rate` and `last_sync`
/// survive a return to zero principal and are only overwritten by the next
/// activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderRecord {
    /// Realized units. Excludes interest accrued since `last_sync`.
    pub principal: Amount,
    /// Frozen per-holder rate, scaled by [`math::SCALE`].
    pub rate: Rate,
    /// When accrued interest was last folded into `principal`.
    pub last_sync: Timestamp,
}

impl HolderRecord {
    /// Seconds since the last realization. A clock that reads earlier than
    /// `last_sync` yields zero, never a negative or wrapped value.
    pub fn elapsed(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_sync)
    }

    /// `principal * (SCALE + rate * elapsed) / SCALE`.
    pub fn effective_balance(&self, now: Timestamp) -> Result<Amount, MathError> {
        math::accrue(self.principal, self.rate, self.elapsed(now))
    }

    /// Interest accrued but not yet realized.
    pub fn pending_interest(&self, now: Timestamp) -> Result<Amount, MathError> {
        // accrue() never returns less than principal.
        Ok(self.effective_balance(now)? - self.principal)
    }

    /// Returns `true` if the holder has realized units.
    pub fn is_active(&self) -> bool {
        self.principal > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SCALE;

    #[test]
    fn untouched_record_is_zero_forever() {
        let r = HolderRecord::default();
        assert_eq!(r.effective_balance(u64::MAX).unwrap(), 0);
        assert!(!r.is_active());
    }

    #[test]
    fn effective_balance_never_below_principal() {
        let r = HolderRecord {
            principal: 1_000,
            rate: 1,
            last_sync: 100,
        };
        assert_eq!(r.effective_balance(100).unwrap(), 1_000);
        assert!(r.effective_balance(10_000).unwrap() >= 1_000);
    }

    #[test]
    fn backwards_clock_means_no_accrual() {
        let r = HolderRecord {
            principal: 1_000 * SCALE,
            rate: SCALE / 100,
            last_sync: 500,
        };
        assert_eq!(r.elapsed(400), 0);
        assert_eq!(r.effective_balance(400).unwrap(), 1_000 * SCALE);
    }

    #[test]
    fn pending_interest_is_the_difference() {
        let r = HolderRecord {
            principal: 100 * SCALE,
            rate: SCALE / 1_000, // 0.1% per second
            last_sync: 0,
        };
        assert_eq!(r.pending_interest(10).unwrap(), SCALE);
    }
}
