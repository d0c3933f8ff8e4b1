use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub name: String,
    pub description: String,
    pub monthly_price: Decimal,
    pub setup_fee: Decimal,
    pub category: String,
    pub active: bool,
}

impl Offer {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation(format!("offer `{}` has no name", self.id)));
        }
        if self.monthly_price.is_sign_negative() || self.setup_fee.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "offer `{}` prices must be non-negative",
                self.id
            )));
        }
        Ok(())
    }

    /// Price snapshotted into cart and quote lines.
    pub fn unit_price(&self) -> Decimal {
        self.monthly_price
    }
}

/// Active offers grouped by category, categories and offers sorted by name.
pub fn catalog_by_category(offers: &[Offer]) -> BTreeMap<String, Vec<Offer>> {
    let mut grouped: BTreeMap<String, Vec<Offer>> = BTreeMap::new();
    for offer in offers.iter().filter(|offer| offer.active) {
        grouped.entry(offer.category.clone()).or_default().push(offer.clone());
    }
    for offers in grouped.values_mut() {
        offers.sort_by(|left, right| left.name.cmp(&right.name));
    }
    grouped
}
