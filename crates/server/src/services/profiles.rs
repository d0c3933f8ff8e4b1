use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use quoteflow_core::access::{promote, Gate};
use quoteflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use quoteflow_core::domain::actor::{Actor, ActorId, Role};
use quoteflow_core::domain::notification::{NewNotification, NotificationKind};
use quoteflow_core::errors::ApplicationError;
use quoteflow_db::repositories::ProfileRepository;

use crate::guard::ServiceGuard;
use crate::services::notifications::NotificationService;

#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    notifications: NotificationService,
    audit: Arc<dyn AuditSink>,
    guard: ServiceGuard,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        notifications: NotificationService,
        audit: Arc<dyn AuditSink>,
        guard: ServiceGuard,
    ) -> Self {
        Self { profiles, notifications, audit, guard }
    }

    /// Staff listing, used to pick the client of an agent-driven checkout.
    pub async fn list(
        &self,
        actor: Option<&Actor>,
        role: Option<Role>,
    ) -> Result<Vec<Actor>, ApplicationError> {
        Gate::ListProfiles.check(actor)?;
        self.guard.read("profiles.list", || self.profiles.list(role)).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Actor, ApplicationError> {
        self.guard
            .read("profiles.find_by_email", || self.profiles.find_by_email(email))
            .await?
            .ok_or_else(|| ApplicationError::not_found("profile", email.to_string()))
    }

    /// Upward role change; only admins may promote.
    pub async fn promote(
        &self,
        actor: Option<&Actor>,
        target: &ActorId,
        role: Role,
        correlation_id: &str,
    ) -> Result<Actor, ApplicationError> {
        let by = actor.map_or_else(|| "anonymous".to_string(), |actor| actor.id.0.clone());
        let event = |outcome: AuditOutcome| {
            AuditEvent::new(
                Some(target.0.clone()),
                correlation_id,
                "profile.promote",
                AuditCategory::Access,
                by.clone(),
                outcome,
            )
            .with_metadata("role", role.as_str())
        };

        let admin = Gate::PromoteActor.check(actor).map_err(|error| {
            self.audit.emit(event(AuditOutcome::Rejected).with_metadata("error", error.to_string()));
            error
        })?;
        let current = self
            .guard
            .read("profiles.find", || self.profiles.find_by_id(target))
            .await?
            .ok_or_else(|| ApplicationError::not_found("profile", target.0.clone()))?;

        let promoted = promote(admin, &current, role, Utc::now()).map_err(|error| {
            self.audit.emit(event(AuditOutcome::Rejected).with_metadata("error", error.to_string()));
            error
        })?;
        if promoted.role == current.role {
            return Ok(promoted);
        }
        self.guard.write("profiles.save", self.profiles.save(promoted.clone())).await?;
        self.audit.emit(
            event(AuditOutcome::Success).with_metadata("from", current.role.as_str()),
        );

        info!(
            event_name = "profile.promoted",
            correlation_id,
            actor_id = %promoted.id,
            from = current.role.as_str(),
            to = promoted.role.as_str(),
            "role changed"
        );
        self.notifications
            .notify(
                NewNotification::new(
                    promoted.id.clone(),
                    format!("Your account now has the {} role.", promoted.role),
                    NotificationKind::Success,
                )
                .with_title("Role updated"),
                correlation_id,
            )
            .await;
        Ok(promoted)
    }
}
