use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteLine};

/// VAT applied on every presentation surface.
pub fn tax_rate() -> Decimal {
    Decimal::new(20, 2)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub total_ht: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total_ttc: Decimal,
}

impl QuoteTotals {
    /// Values rounded to cents; stored amounts stay unrounded.
    pub fn for_display(&self) -> Self {
        Self {
            total_ht: round_for_display(self.total_ht),
            tax_rate: self.tax_rate,
            tax: round_for_display(self.tax),
            total_ttc: round_for_display(self.total_ttc),
        }
    }
}

pub fn lines_total(lines: &[QuoteLine]) -> Decimal {
    lines.iter().map(QuoteLine::line_total).sum()
}

pub fn totals_for(pre_tax: Decimal) -> QuoteTotals {
    let rate = tax_rate();
    let tax = pre_tax * rate;
    QuoteTotals { total_ht: pre_tax, tax_rate: rate, tax, total_ttc: pre_tax + tax }
}

/// Totals derived from the stored `total_price`, never from live catalog prices.
pub fn quote_totals(quote: &Quote) -> QuoteTotals {
    totals_for(quote.total_price)
}

pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", round_for_display(amount))
}
