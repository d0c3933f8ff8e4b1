//! Application services. Each takes the caller as `Option<&Actor>` and asks the access guard
//! before touching a repository.

pub mod cart;
pub mod catalog;
pub mod dashboard;
pub mod dossiers;
pub mod notifications;
pub mod profiles;
pub mod quotes;

use std::sync::Arc;

use quoteflow_core::audit::{AuditSink, TracingAuditSink};
use quoteflow_db::Repositories;

use crate::guard::ServiceGuard;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use dashboard::{Dashboard, DashboardService};
pub use dossiers::{DossierDetail, DossierService, NewDossier};
pub use notifications::{FeedView, NotificationService, NotificationSubscription};
pub use profiles::ProfileService;
pub use quotes::{CheckoutRequest, QuoteDocumentView, QuoteService, RenderedDocument};

#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub carts: CartService,
    pub quotes: QuoteService,
    pub dossiers: DossierService,
    pub notifications: NotificationService,
    pub profiles: ProfileService,
    pub dashboard: DashboardService,
}

impl AppServices {
    pub fn new(repositories: &Repositories, guard: ServiceGuard) -> Self {
        Self::with_audit(repositories, guard, Arc::new(TracingAuditSink))
    }

    pub fn with_audit(
        repositories: &Repositories,
        guard: ServiceGuard,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let notifications = NotificationService::new(
            repositories.notifications.clone(),
            repositories.profiles.clone(),
            guard,
        );

        Self {
            catalog: CatalogService::new(repositories.offers.clone(), guard),
            carts: CartService::new(repositories.carts.clone(), repositories.offers.clone(), guard),
            quotes: QuoteService::new(
                repositories.quotes.clone(),
                repositories.dossiers.clone(),
                repositories.profiles.clone(),
                repositories.carts.clone(),
                notifications.clone(),
                audit.clone(),
                guard,
            ),
            dossiers: DossierService::new(
                repositories.dossiers.clone(),
                repositories.quotes.clone(),
                repositories.profiles.clone(),
                notifications.clone(),
                audit.clone(),
                guard,
            ),
            profiles: ProfileService::new(
                repositories.profiles.clone(),
                notifications.clone(),
                audit,
                guard,
            ),
            dashboard: DashboardService::new(
                repositories.quotes.clone(),
                repositories.profiles.clone(),
                guard,
            ),
            notifications,
        }
    }
}
