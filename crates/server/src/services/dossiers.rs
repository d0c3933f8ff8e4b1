use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use quoteflow_core::access::{AccessError, Gate};
use quoteflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::dossier::{Comment, Dossier, DossierId, DossierStatus};
use quoteflow_core::domain::notification::{NewNotification, NotificationKind};
use quoteflow_core::domain::quote::Quote;
use quoteflow_core::errors::{ApplicationError, DomainError};
use quoteflow_db::repositories::{
    DossierRepository, ProfileRepository, QuoteFilter, QuoteRepository,
};

use crate::guard::ServiceGuard;
use crate::services::notifications::NotificationService;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewDossier {
    pub client_id: ActorId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A dossier with the quotes filed under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DossierDetail {
    #[serde(flatten)]
    pub dossier: Dossier,
    pub quotes: Vec<Quote>,
}

#[derive(Clone)]
pub struct DossierService {
    dossiers: Arc<dyn DossierRepository>,
    quotes: Arc<dyn QuoteRepository>,
    profiles: Arc<dyn ProfileRepository>,
    notifications: NotificationService,
    audit: Arc<dyn AuditSink>,
    guard: ServiceGuard,
}

impl DossierService {
    pub fn new(
        dossiers: Arc<dyn DossierRepository>,
        quotes: Arc<dyn QuoteRepository>,
        profiles: Arc<dyn ProfileRepository>,
        notifications: NotificationService,
        audit: Arc<dyn AuditSink>,
        guard: ServiceGuard,
    ) -> Self {
        Self { dossiers, quotes, profiles, notifications, audit, guard }
    }

    pub async fn create(
        &self,
        actor: Option<&Actor>,
        request: NewDossier,
        correlation_id: &str,
    ) -> Result<Dossier, ApplicationError> {
        let actor = Gate::CreateDossier.check(actor)?;
        let client = self
            .guard
            .read("profiles.find", || self.profiles.find_by_id(&request.client_id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("client", request.client_id.0.clone()))?;
        if client.role != Role::Client {
            return Err(DomainError::Validation(format!(
                "`{}` is not a client account",
                client.display_name
            ))
            .into());
        }

        let dossier = Dossier::open(
            DossierId::generate(),
            client.id,
            (actor.role == Role::Agent).then(|| actor.id.clone()),
            request.title,
            request.description,
            Utc::now(),
        )?;
        self.guard.write("dossiers.save", self.dossiers.save(&dossier)).await?;

        info!(
            event_name = "dossier.created",
            correlation_id,
            dossier_id = %dossier.id,
            client_id = %dossier.client_id,
            "dossier opened"
        );
        Ok(dossier)
    }

    /// Newest first; clients see their own dossiers only.
    pub async fn list(&self, actor: Option<&Actor>) -> Result<Vec<Dossier>, ApplicationError> {
        let actor = Gate::ListDossiers.check(actor)?;
        let client = (actor.role == Role::Client).then_some(&actor.id);
        self.guard.read("dossiers.list", || self.dossiers.list(client)).await
    }

    pub async fn get(
        &self,
        actor: Option<&Actor>,
        id: &DossierId,
    ) -> Result<DossierDetail, ApplicationError> {
        let dossier = self.find(id).await?;
        Gate::ViewDossier.check_owned(actor, &dossier.client_id)?;

        let filter = QuoteFilter { dossier_id: Some(dossier.id.clone()), ..QuoteFilter::default() };
        let quotes = self.guard.read("quotes.list", || self.quotes.list(&filter)).await?;
        Ok(DossierDetail { dossier, quotes })
    }

    /// Any status may follow any other. Re-selecting the current status changes nothing.
    pub async fn set_status(
        &self,
        actor: Option<&Actor>,
        id: &DossierId,
        status: DossierStatus,
        correlation_id: &str,
    ) -> Result<Dossier, ApplicationError> {
        let actor = self.gate(Gate::UpdateDossierStatus, actor, id, correlation_id)?;
        let mut dossier = self.find(id).await?;
        let previous = dossier.status;
        if !dossier.set_status(actor, status, Utc::now())? {
            return Ok(dossier);
        }
        self.guard.write("dossiers.save", self.dossiers.save(&dossier)).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(dossier.id.0.clone()),
                correlation_id,
                "dossier.status_changed",
                AuditCategory::Dossier,
                actor.id.0.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("from", previous.as_str())
            .with_metadata("to", status.as_str()),
        );

        self.notifications
            .notify(
                NewNotification::new(
                    dossier.client_id.clone(),
                    format!("Your dossier \"{}\" is now {}.", dossier.title, status),
                    NotificationKind::Info,
                )
                .with_title("Dossier updated")
                .with_link(format!("/dossiers/{}", dossier.id)),
                correlation_id,
            )
            .await;
        Ok(dossier)
    }

    pub async fn add_comment(
        &self,
        actor: Option<&Actor>,
        id: &DossierId,
        text: &str,
    ) -> Result<Comment, ApplicationError> {
        let mut dossier = self.find(id).await?;
        let author = Gate::CommentDossier.check_owned(actor, &dossier.client_id)?;
        let comment = dossier.add_comment(author, text, Utc::now())?;
        self.guard.write("dossiers.add_comment", self.dossiers.add_comment(&comment)).await?;
        Ok(comment)
    }

    /// Removes the dossier with its comments and quotes.
    pub async fn delete(
        &self,
        actor: Option<&Actor>,
        id: &DossierId,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        let actor = self.gate(Gate::DeleteDossier, actor, id, correlation_id)?;
        let deleted = self.guard.write("dossiers.delete", self.dossiers.delete(id)).await?;
        if !deleted {
            return Err(ApplicationError::not_found("dossier", id.0.clone()));
        }
        self.audit.emit(AuditEvent::new(
            Some(id.0.clone()),
            correlation_id,
            "dossier.deleted",
            AuditCategory::Dossier,
            actor.id.0.clone(),
            AuditOutcome::Success,
        ));
        info!(event_name = "dossier.deleted", correlation_id, dossier_id = %id, "dossier removed");
        Ok(())
    }

    /// Role check that leaves an access audit record when it refuses.
    fn gate<'a>(
        &self,
        gate: Gate,
        actor: Option<&'a Actor>,
        id: &DossierId,
        correlation_id: &str,
    ) -> Result<&'a Actor, AccessError> {
        gate.check(actor).map_err(|error| {
            self.audit.emit(
                AuditEvent::new(
                    Some(id.0.clone()),
                    correlation_id,
                    "dossier.access_denied",
                    AuditCategory::Access,
                    actor.map_or_else(|| "anonymous".to_string(), |actor| actor.id.0.clone()),
                    AuditOutcome::Rejected,
                )
                .with_metadata("gate", gate.as_str())
                .with_metadata("error", error.to_string()),
            );
            error
        })
    }

    async fn find(&self, id: &DossierId) -> Result<Dossier, ApplicationError> {
        self.guard
            .read("dossiers.find", || self.dossiers.find_by_id(id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("dossier", id.0.clone()))
    }
}
