use std::collections::BTreeMap;
use std::sync::Arc;

use quoteflow_core::access::Gate;
use quoteflow_core::domain::actor::Actor;
use quoteflow_core::domain::offer::{catalog_by_category, Offer};
use quoteflow_core::errors::ApplicationError;
use quoteflow_db::repositories::OfferRepository;

use crate::guard::ServiceGuard;

#[derive(Clone)]
pub struct CatalogService {
    offers: Arc<dyn OfferRepository>,
    guard: ServiceGuard,
}

impl CatalogService {
    pub fn new(offers: Arc<dyn OfferRepository>, guard: ServiceGuard) -> Self {
        Self { offers, guard }
    }

    /// Active offers grouped by category.
    pub async fn browse(
        &self,
        actor: Option<&Actor>,
    ) -> Result<BTreeMap<String, Vec<Offer>>, ApplicationError> {
        Gate::ViewCatalog.check(actor)?;
        let offers = self.guard.read("offers.list_active", || self.offers.list_active()).await?;
        Ok(catalog_by_category(&offers))
    }
}
