//! Checkout and quote transitions.
//!
//! Every status change goes through [`QuoteLifecycle`] and is persisted with a compare-and-set
//! on the previous status. Notifications are emitted only after the write succeeded, so a
//! replayed or conflicting request never notifies twice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quoteflow_core::access::{AccessError, Gate};
use quoteflow_core::audit::{AuditContext, AuditSink};
use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::dossier::{Dossier, DossierId, DossierStatus};
use quoteflow_core::domain::quote::{
    BankDetails, DocumentAvailability, Quote, QuoteDocumentRenderer, QuoteDraft, QuoteId,
    QuoteStatus,
};
use quoteflow_core::errors::{ApplicationError, DomainError};
use quoteflow_core::lifecycle::{QuoteEvent, QuoteLifecycle};
use quoteflow_core::pricing::{quote_totals, QuoteTotals};
use quoteflow_db::repositories::{
    CartRepository, DossierRepository, ProfileRepository, QuoteFilter, QuoteRepository,
};

use crate::guard::ServiceGuard;
use crate::services::notifications::NotificationService;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    /// Required when an agent checks out on behalf of a client.
    #[serde(default)]
    pub client_id: Option<ActorId>,
    /// Attach to this dossier instead of the client's open one.
    #[serde(default)]
    pub dossier_id: Option<DossierId>,
    /// Supplying bank details routes the quote to `pending_admin`.
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteDocumentView {
    pub quote_id: QuoteId,
    pub status: QuoteStatus,
    pub availability: DocumentAvailability,
    pub totals: QuoteTotals,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct QuoteService {
    quotes: Arc<dyn QuoteRepository>,
    dossiers: Arc<dyn DossierRepository>,
    profiles: Arc<dyn ProfileRepository>,
    carts: Arc<dyn CartRepository>,
    notifications: NotificationService,
    audit: Arc<dyn AuditSink>,
    renderer: Option<Arc<dyn QuoteDocumentRenderer>>,
    lifecycle: QuoteLifecycle,
    guard: ServiceGuard,
}

impl QuoteService {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        dossiers: Arc<dyn DossierRepository>,
        profiles: Arc<dyn ProfileRepository>,
        carts: Arc<dyn CartRepository>,
        notifications: NotificationService,
        audit: Arc<dyn AuditSink>,
        guard: ServiceGuard,
    ) -> Self {
        Self {
            quotes,
            dossiers,
            profiles,
            carts,
            notifications,
            audit,
            renderer: None,
            lifecycle: QuoteLifecycle::new(),
            guard,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn QuoteDocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Turns the caller's cart into a submitted quote.
    ///
    /// Order: validate, persist dossier (when new) and quote, clear the cart, notify admins. A
    /// rejected or failed checkout leaves no dossier behind and the cart untouched.
    pub async fn checkout(
        &self,
        actor: Option<&Actor>,
        request: CheckoutRequest,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let actor = Gate::Checkout.check(actor)?;
        let client = self.resolve_client(actor, request.client_id.as_ref()).await?;

        let cart = self
            .guard
            .read("carts.load", || self.carts.load(&actor.id))
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or_else(|| DomainError::Validation("the cart is empty".to_string()))?;

        let now = Utc::now();
        let target = self.resolve_dossier(actor, &client, request.dossier_id.as_ref(), now).await?;
        let draft = Quote::draft(
            QuoteDraft {
                id: QuoteId::generate(),
                dossier_id: target.id().clone(),
                client: client.reference(),
                agent: (actor.role == Role::Agent).then(|| actor.reference()),
                items: cart.to_quote_lines(),
                bank_details: request.bank_details,
                created_by: actor.reference(),
            },
            now,
        )?;

        let audit = AuditContext::new(Some(draft.id.0.clone()), correlation_id, actor.id.0.clone());
        let outcome = self.lifecycle.apply_with_audit(
            &draft,
            &QuoteEvent::Submit,
            Some(actor),
            now,
            self.audit.as_ref(),
            &audit,
        )?;
        self.store_checkout(&target, &outcome.quote, correlation_id).await?;

        if let Err(error) = self.guard.write("carts.clear", self.carts.clear(&actor.id)).await {
            warn!(
                event_name = "quote.checkout.cart_not_cleared",
                correlation_id,
                quote_id = %outcome.quote.id,
                error = %error,
                "quote stored but cart could not be cleared"
            );
        }
        self.notifications.dispatch(&outcome.notifications, correlation_id).await;

        info!(
            event_name = "quote.checkout.completed",
            correlation_id,
            quote_id = %outcome.quote.id,
            dossier_id = %outcome.quote.dossier_id,
            status = outcome.quote.status.as_str(),
            "quote submitted"
        );
        Ok(outcome.quote)
    }

    pub async fn approve(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        self.transition(actor, id, QuoteEvent::Approve, correlation_id).await
    }

    pub async fn reject(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
        reason: String,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        self.transition(actor, id, QuoteEvent::Reject { reason }, correlation_id).await
    }

    pub async fn sign(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        self.transition(actor, id, QuoteEvent::Sign, correlation_id).await
    }

    pub async fn transition(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
        event: QuoteEvent,
        correlation_id: &str,
    ) -> Result<Quote, ApplicationError> {
        let quote = self.find(id).await?;
        let audit = AuditContext::new(
            Some(quote.id.0.clone()),
            correlation_id,
            actor.map_or_else(|| "anonymous".to_string(), |actor| actor.id.0.clone()),
        );
        let outcome = self.lifecycle.apply_with_audit(
            &quote,
            &event,
            actor,
            Utc::now(),
            self.audit.as_ref(),
            &audit,
        )?;

        self.guard
            .write(
                "quotes.compare_and_set_status",
                self.quotes.compare_and_set_status(&outcome.quote, outcome.from),
            )
            .await?;
        self.notifications.dispatch(&outcome.notifications, correlation_id).await;

        info!(
            event_name = "quote.transition.persisted",
            correlation_id,
            quote_id = %outcome.quote.id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "quote status changed"
        );
        Ok(outcome.quote)
    }

    /// Clients only ever see their own quotes, whatever the filter says.
    pub async fn list(
        &self,
        actor: Option<&Actor>,
        mut filter: QuoteFilter,
    ) -> Result<Vec<Quote>, ApplicationError> {
        let actor = Gate::ListQuotes.check(actor)?;
        if actor.role == Role::Client {
            filter.client_id = Some(actor.id.clone());
        }
        self.guard.read("quotes.list", || self.quotes.list(&filter)).await
    }

    pub async fn get(&self, actor: Option<&Actor>, id: &QuoteId) -> Result<Quote, ApplicationError> {
        let quote = self.find(id).await?;
        Gate::ViewQuote.check_owned(actor, &quote.client_id)?;
        Ok(quote)
    }

    pub async fn document(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
    ) -> Result<QuoteDocumentView, ApplicationError> {
        let quote = self.find(id).await?;
        Gate::PrintQuote.check_owned(actor, &quote.client_id)?;
        Ok(QuoteDocumentView {
            quote_id: quote.id.clone(),
            status: quote.status,
            availability: quote.document_availability(),
            totals: quote_totals(&quote).for_display(),
        })
    }

    pub async fn render_document(
        &self,
        actor: Option<&Actor>,
        id: &QuoteId,
    ) -> Result<RenderedDocument, ApplicationError> {
        let quote = self.find(id).await?;
        Gate::PrintQuote.check_owned(actor, &quote.client_id)?;
        if let DocumentAvailability::Disabled { reason } = quote.document_availability() {
            return Err(DomainError::Validation(reason).into());
        }
        let renderer = self.renderer.as_ref().ok_or_else(|| {
            ApplicationError::Integration("no quote document renderer is configured".to_string())
        })?;

        let bytes = renderer.render(&quote, &quote_totals(&quote))?;
        Ok(RenderedDocument { content_type: renderer.content_type(), bytes })
    }

    async fn find(&self, id: &QuoteId) -> Result<Quote, ApplicationError> {
        self.guard
            .read("quotes.find", || self.quotes.find_by_id(id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("quote", id.0.clone()))
    }

    async fn resolve_client(
        &self,
        actor: &Actor,
        requested: Option<&ActorId>,
    ) -> Result<Actor, ApplicationError> {
        if actor.role == Role::Client {
            return match requested {
                Some(id) if id != &actor.id => {
                    Err(AccessError::NotOwner { gate: Gate::Checkout }.into())
                }
                _ => Ok(actor.clone()),
            };
        }

        let client_id = requested.ok_or_else(|| {
            DomainError::Validation("select the client this quote is for".to_string())
        })?;
        let client = self
            .guard
            .read("profiles.find", || self.profiles.find_by_id(client_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("client", client_id.0.clone()))?;
        if client.role != Role::Client {
            return Err(DomainError::Validation(format!(
                "`{}` is not a client account",
                client.display_name
            ))
            .into());
        }
        Ok(client)
    }

    /// Saves a fresh dossier before its first quote. If the quote write fails, the dossier is
    /// removed again so the checkout leaves nothing behind.
    async fn store_checkout(
        &self,
        target: &CheckoutDossier,
        quote: &Quote,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        let CheckoutDossier::Fresh(dossier) = target else {
            return self.guard.write("quotes.insert", self.quotes.insert(quote)).await;
        };

        self.guard.write("dossiers.save", self.dossiers.save(dossier)).await?;
        let error = match self.guard.write("quotes.insert", self.quotes.insert(quote)).await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };
        if let Err(cleanup) =
            self.guard.write("dossiers.delete", self.dossiers.delete(&dossier.id)).await
        {
            warn!(
                event_name = "quote.checkout.dossier_orphaned",
                correlation_id,
                dossier_id = %dossier.id,
                error = %cleanup,
                "quote insert failed and the new dossier could not be removed"
            );
        }
        Err(error)
    }

    /// Explicit dossier, else the client's newest open one, else a fresh (unsaved) dossier.
    async fn resolve_dossier(
        &self,
        actor: &Actor,
        client: &Actor,
        requested: Option<&DossierId>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutDossier, ApplicationError> {
        if let Some(id) = requested {
            let dossier = self
                .guard
                .read("dossiers.find", || self.dossiers.find_by_id(id))
                .await?
                .ok_or_else(|| ApplicationError::not_found("dossier", id.0.clone()))?;
            if dossier.client_id != client.id {
                return Err(DomainError::Validation(format!(
                    "dossier `{id}` belongs to another client"
                ))
                .into());
            }
            return Ok(CheckoutDossier::Existing(dossier.id));
        }

        let existing =
            self.guard.read("dossiers.list", || self.dossiers.list(Some(&client.id))).await?;
        let open = existing
            .into_iter()
            .find(|dossier| matches!(dossier.status, DossierStatus::New | DossierStatus::InProgress));
        if let Some(dossier) = open {
            return Ok(CheckoutDossier::Existing(dossier.id));
        }

        let dossier = Dossier::open(
            DossierId::generate(),
            client.id.clone(),
            (actor.role == Role::Agent).then(|| actor.id.clone()),
            format!("Quote request {}", now.format("%Y-%m-%d")),
            None,
            now,
        )?;
        Ok(CheckoutDossier::Fresh(dossier))
    }
}

/// Where a checkout lands: a stored dossier, or one that is saved together with the quote.
enum CheckoutDossier {
    Existing(DossierId),
    Fresh(Dossier),
}

impl CheckoutDossier {
    fn id(&self) -> &DossierId {
        match self {
            Self::Existing(id) => id,
            Self::Fresh(dossier) => &dossier.id,
        }
    }
}
