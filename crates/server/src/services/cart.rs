use std::sync::Arc;

use chrono::Utc;

use quoteflow_core::access::Gate;
use quoteflow_core::domain::actor::{Actor, ActorId};
use quoteflow_core::domain::cart::Cart;
use quoteflow_core::domain::offer::OfferId;
use quoteflow_core::errors::ApplicationError;
use quoteflow_db::repositories::{CartRepository, OfferRepository};

use crate::guard::ServiceGuard;

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    offers: Arc<dyn OfferRepository>,
    guard: ServiceGuard,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        offers: Arc<dyn OfferRepository>,
        guard: ServiceGuard,
    ) -> Self {
        Self { carts, offers, guard }
    }

    pub async fn get(&self, actor: Option<&Actor>) -> Result<Cart, ApplicationError> {
        let actor = Gate::ManageCart.check(actor)?;
        self.load(&actor.id).await
    }

    /// Merges into an existing line for the same offer.
    pub async fn add_item(
        &self,
        actor: Option<&Actor>,
        offer_id: &OfferId,
        quantity: u32,
    ) -> Result<Cart, ApplicationError> {
        let actor = Gate::ManageCart.check(actor)?;
        let offer = self
            .guard
            .read("offers.find", || self.offers.find_by_id(offer_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("offer", offer_id.0.clone()))?;

        let mut cart = self.load(&actor.id).await?;
        cart.add_item(&offer, quantity, Utc::now())?;
        self.store(cart).await
    }

    /// A quantity of zero or less removes the line.
    pub async fn set_quantity(
        &self,
        actor: Option<&Actor>,
        offer_id: &OfferId,
        quantity: i64,
    ) -> Result<Cart, ApplicationError> {
        let actor = Gate::ManageCart.check(actor)?;
        let mut cart = self.load(&actor.id).await?;
        let present = cart.lines.iter().any(|line| &line.offer_id == offer_id);
        if !present {
            if quantity <= 0 {
                return Ok(cart);
            }
            return Err(ApplicationError::not_found("cart line", offer_id.0.clone()));
        }

        if cart.set_quantity(offer_id, quantity, Utc::now()) {
            self.store(cart).await
        } else {
            Ok(cart)
        }
    }

    pub async fn remove_item(
        &self,
        actor: Option<&Actor>,
        offer_id: &OfferId,
    ) -> Result<Cart, ApplicationError> {
        let actor = Gate::ManageCart.check(actor)?;
        let mut cart = self.load(&actor.id).await?;
        if cart.remove_item(offer_id, Utc::now()) {
            self.store(cart).await
        } else {
            Ok(cart)
        }
    }

    pub async fn clear(&self, actor: Option<&Actor>) -> Result<(), ApplicationError> {
        let actor = Gate::ManageCart.check(actor)?;
        self.guard.write("carts.clear", self.carts.clear(&actor.id)).await
    }

    pub(crate) async fn load(&self, owner: &ActorId) -> Result<Cart, ApplicationError> {
        let stored = self.guard.read("carts.load", || self.carts.load(owner)).await?;
        Ok(stored.unwrap_or_else(|| Cart::new(owner.clone(), Utc::now())))
    }

    async fn store(&self, cart: Cart) -> Result<Cart, ApplicationError> {
        self.guard.write("carts.save", self.carts.save(cart.clone())).await?;
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use quoteflow_core::access::AccessError;
    use quoteflow_core::domain::actor::{Actor, ActorId};
    use quoteflow_core::domain::offer::{Offer, OfferId};
    use quoteflow_core::errors::{ApplicationError, DomainError};
    use quoteflow_db::repositories::{
        InMemoryCartRepository, InMemoryOfferRepository, OfferRepository,
    };

    use super::CartService;
    use crate::guard::ServiceGuard;

    fn offer(id: &str, price: i64, active: bool) -> Offer {
        Offer {
            id: OfferId(id.to_string()),
            name: format!("Offer {id}"),
            description: String::new(),
            monthly_price: Decimal::new(price, 0),
            setup_fee: Decimal::ZERO,
            category: "internet".to_string(),
            active,
        }
    }

    async fn service() -> CartService {
        let offers = Arc::new(InMemoryOfferRepository::default());
        offers.save(offer("O1", 100, true)).await.expect("save");
        offers.save(offer("O2", 50, true)).await.expect("save");
        offers.save(offer("OLD", 10, false)).await.expect("save");
        CartService::new(Arc::new(InMemoryCartRepository::default()), offers, ServiceGuard::default())
    }

    fn client() -> Actor {
        Actor::register(ActorId("C1".to_string()), "C1", "c1@acme.test", Utc::now())
    }

    #[tokio::test]
    async fn cart_survives_reload_and_totals_snapshot_prices() {
        let service = service().await;
        let client = client();

        service.add_item(Some(&client), &OfferId("O1".to_string()), 2).await.expect("add O1");
        service.add_item(Some(&client), &OfferId("O2".to_string()), 1).await.expect("add O2");

        let reloaded = service.get(Some(&client)).await.expect("reload");
        assert_eq!(reloaded.total(), Decimal::new(250, 0));
        assert_eq!(reloaded.item_count(), 3);
    }

    #[tokio::test]
    async fn zero_quantity_removes_the_line() {
        let service = service().await;
        let client = client();
        let offer_id = OfferId("O1".to_string());
        service.add_item(Some(&client), &offer_id, 1).await.expect("add");

        let cart = service.set_quantity(Some(&client), &offer_id, 0).await.expect("set 0");
        assert!(cart.is_empty());
        assert!(service.get(Some(&client)).await.expect("reload").is_empty());
    }

    #[tokio::test]
    async fn inactive_offer_is_refused() {
        let service = service().await;
        let error = service
            .add_item(Some(&client()), &OfferId("OLD".to_string()), 1)
            .await
            .expect_err("inactive");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn anonymous_cart_operations_are_rejected() {
        let service = service().await;
        let error =
            service.add_item(None, &OfferId("O1".to_string()), 1).await.expect_err("anonymous");
        assert_eq!(error, ApplicationError::from(AccessError::Unauthenticated));
    }
}
