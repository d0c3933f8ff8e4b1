use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::offer::{Offer, OfferId};
use crate::domain::quote::QuoteLine;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub offer_id: OfferId,
    pub offer_title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Per-actor cart. Lines are unique per offer and always hold a quantity of at least one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: ActorId,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: ActorId, now: DateTime<Utc>) -> Self {
        Self { owner, lines: Vec::new(), updated_at: now }
    }

    pub fn add_item(
        &mut self,
        offer: &Offer,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !offer.active {
            return Err(DomainError::Validation(format!(
                "offer `{}` is no longer available",
                offer.id
            )));
        }
        if quantity == 0 {
            return Err(DomainError::Validation("quantity must be at least 1".to_string()));
        }

        match self.lines.iter_mut().find(|line| line.offer_id == offer.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine {
                offer_id: offer.id.clone(),
                offer_title: offer.name.clone(),
                unit_price: offer.unit_price(),
                quantity,
            }),
        }
        self.updated_at = now;
        Ok(())
    }

    /// A quantity of zero or less removes the line. Returns whether the cart changed.
    pub fn set_quantity(&mut self, offer_id: &OfferId, quantity: i64, now: DateTime<Utc>) -> bool {
        if quantity <= 0 {
            return self.remove_item(offer_id, now);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|line| &line.offer_id == offer_id) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    pub fn remove_item(&mut self, offer_id: &OfferId, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.offer_id != offer_id);
        let changed = self.lines.len() != before;
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn to_quote_lines(&self) -> Vec<QuoteLine> {
        self.lines
            .iter()
            .map(|line| QuoteLine {
                offer_id: line.offer_id.clone(),
                offer_title: line.offer_title.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::actor::ActorId;
    use crate::domain::offer::{Offer, OfferId};

    use super::Cart;

    fn offer(id: &str, cents: i64) -> Offer {
        Offer {
            id: OfferId(id.to_string()),
            name: format!("Offer {id}"),
            description: String::new(),
            monthly_price: Decimal::new(cents, 2),
            setup_fee: Decimal::ZERO,
            category: "services".to_string(),
            active: true,
        }
    }

    fn cart() -> Cart {
        Cart::new(ActorId("c-1".to_string()), Utc::now())
    }

    #[test]
    fn totals_follow_snapshotted_prices() {
        let mut cart = cart();
        cart.add_item(&offer("O1", 10_000), 2, Utc::now()).expect("add O1");
        cart.add_item(&offer("O2", 5_000), 1, Utc::now()).expect("add O2");

        assert_eq!(cart.total(), Decimal::new(250, 0));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn adding_same_offer_merges_quantity() {
        let mut cart = cart();
        let o1 = offer("O1", 1_000);
        cart.add_item(&o1, 1, Utc::now()).expect("first add");
        cart.add_item(&o1, 2, Utc::now()).expect("second add");

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
    }

    #[test]
    fn zero_quantity_behaves_like_remove() {
        let mut by_quantity = cart();
        let mut by_remove = cart();
        for cart in [&mut by_quantity, &mut by_remove] {
            cart.add_item(&offer("O1", 1_000), 2, Utc::now()).expect("add O1");
            cart.add_item(&offer("O2", 2_000), 1, Utc::now()).expect("add O2");
        }

        assert!(by_quantity.set_quantity(&OfferId("O1".to_string()), 0, Utc::now()));
        assert!(by_remove.remove_item(&OfferId("O1".to_string()), Utc::now()));

        assert_eq!(by_quantity.lines, by_remove.lines);
        assert!(by_quantity.set_quantity(&OfferId("O2".to_string()), -3, Utc::now()));
        assert!(by_quantity.is_empty());
    }

    #[test]
    fn inactive_offer_cannot_be_added() {
        let mut retired = offer("O9", 1_000);
        retired.active = false;
        assert!(cart().add_item(&retired, 1, Utc::now()).is_err());
    }

    #[test]
    fn set_quantity_on_missing_line_is_a_no_op() {
        let mut cart = cart();
        assert!(!cart.set_quantity(&OfferId("nope".to_string()), 4, Utc::now()));
        assert!(cart.is_empty());
    }
}
