use rust_decimal::Decimal;

use crate::domain::decision::Complexity;

/// Fixed per-bucket price list in USDC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceTable {
    pub low: Decimal,
    pub medium: Decimal,
    pub high: Decimal,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self { low: Decimal::ZERO, medium: Decimal::new(5, 2), high: Decimal::new(10, 2) }
    }
}

impl PriceTable {
    pub fn price(&self, complexity: Complexity) -> Decimal {
        match complexity {
            Complexity::Low => self.low,
            Complexity::Medium => self.medium,
            Complexity::High => self.high,
        }
    }
}

pub fn max_charge_usdc() -> Decimal {
    Decimal::ONE
}

/// Bounds any charge to `[0, max_charge_usdc()]`.
pub fn clamp_charge(amount: Decimal) -> Decimal {
    amount.clamp(Decimal::ZERO, max_charge_usdc())
}
