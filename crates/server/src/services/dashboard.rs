use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use quoteflow_core::access::Gate;
use quoteflow_core::domain::actor::{Actor, Role};
use quoteflow_core::domain::quote::QuoteStatus;
use quoteflow_core::errors::ApplicationError;
use quoteflow_core::pricing::round_for_display;
use quoteflow_db::repositories::{ProfileRepository, QuoteFilter, QuoteRepository};

use crate::guard::ServiceGuard;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub quotes_by_status: BTreeMap<&'static str, usize>,
    pub awaiting_review: usize,
    /// Pre-tax, signed quotes only.
    pub signed_revenue: Decimal,
    /// Admin view only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actors_by_role: Option<BTreeMap<&'static str, usize>>,
}

#[derive(Clone)]
pub struct DashboardService {
    quotes: Arc<dyn QuoteRepository>,
    profiles: Arc<dyn ProfileRepository>,
    guard: ServiceGuard,
}

impl DashboardService {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        profiles: Arc<dyn ProfileRepository>,
        guard: ServiceGuard,
    ) -> Self {
        Self { quotes, profiles, guard }
    }

    pub async fn summary(&self, actor: Option<&Actor>) -> Result<Dashboard, ApplicationError> {
        let actor = Gate::AgentDashboard.check(actor)?;
        let filter = QuoteFilter::default();
        let quotes = self.guard.read("quotes.list", || self.quotes.list(&filter)).await?;

        let mut dashboard = Dashboard::default();
        for quote in &quotes {
            *dashboard.quotes_by_status.entry(quote.status.as_str()).or_default() += 1;
            if quote.status.awaiting_review() {
                dashboard.awaiting_review += 1;
            }
        }
        let signed: Decimal = quotes
            .iter()
            .filter(|quote| quote.status == QuoteStatus::Signed)
            .map(|quote| quote.total_price)
            .sum();
        dashboard.signed_revenue = round_for_display(signed);

        if Gate::AdminDashboard.permits(Some(actor)) {
            let actors = self.guard.read("profiles.list", || self.profiles.list(None)).await?;
            let mut by_role = BTreeMap::new();
            for role in [Role::Client, Role::Agent, Role::Admin] {
                by_role.insert(role.as_str(), actors.iter().filter(|a| a.role == role).count());
            }
            dashboard.actors_by_role = Some(by_role);
        }
        Ok(dashboard)
    }
}
