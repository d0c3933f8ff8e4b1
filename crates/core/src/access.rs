//! Role-access guard.
//!
//! Every gated surface (HTTP handler, CLI command, domain mutation) asks a [`Gate`]
//! instead of comparing roles inline, so the allow-lists live in exactly one table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::actor::{Actor, ActorId, Role};
use crate::errors::DomainError;

const ANY_ROLE: &[Role] = &[Role::Client, Role::Agent, Role::Admin];
const STAFF: &[Role] = &[Role::Agent, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const CLIENT_OR_ADMIN: &[Role] = &[Role::Client, Role::Admin];
const CLIENT_OR_AGENT: &[Role] = &[Role::Client, Role::Agent];

/// Returns `false` for an unauthenticated caller, otherwise whether the role is allowed.
pub fn has_access(actor: Option<&Actor>, allowed: &[Role]) -> bool {
    actor.is_some_and(|actor| allowed.contains(&actor.role))
}

/// Ownership rule for dossiers and quotes: staff see everything, clients only their own.
pub fn can_access_resource(actor: &Actor, owner: &ActorId) -> bool {
    match actor.role {
        Role::Admin | Role::Agent => true,
        Role::Client => &actor.id == owner,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    ViewCatalog,
    ManageCart,
    Checkout,
    ListQuotes,
    ViewQuote,
    ApproveQuote,
    RejectQuote,
    SignQuote,
    PrintQuote,
    ListDossiers,
    ViewDossier,
    CreateDossier,
    UpdateDossierStatus,
    CommentDossier,
    DeleteDossier,
    ViewNotifications,
    ListProfiles,
    PromoteActor,
    AdminDashboard,
    AgentDashboard,
}

impl Gate {
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::ViewCatalog
            | Self::ManageCart
            | Self::ListQuotes
            | Self::ViewQuote
            | Self::PrintQuote
            | Self::ListDossiers
            | Self::ViewDossier
            | Self::CommentDossier
            | Self::ViewNotifications => ANY_ROLE,
            Self::Checkout => CLIENT_OR_AGENT,
            Self::RejectQuote | Self::SignQuote => CLIENT_OR_ADMIN,
            Self::CreateDossier
            | Self::UpdateDossierStatus
            | Self::ListProfiles
            | Self::AgentDashboard => STAFF,
            Self::ApproveQuote | Self::DeleteDossier | Self::PromoteActor | Self::AdminDashboard => {
                ADMIN_ONLY
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewCatalog => "view_catalog",
            Self::ManageCart => "manage_cart",
            Self::Checkout => "checkout",
            Self::ListQuotes => "list_quotes",
            Self::ViewQuote => "view_quote",
            Self::ApproveQuote => "approve_quote",
            Self::RejectQuote => "reject_quote",
            Self::SignQuote => "sign_quote",
            Self::PrintQuote => "print_quote",
            Self::ListDossiers => "list_dossiers",
            Self::ViewDossier => "view_dossier",
            Self::CreateDossier => "create_dossier",
            Self::UpdateDossierStatus => "update_dossier_status",
            Self::CommentDossier => "comment_dossier",
            Self::DeleteDossier => "delete_dossier",
            Self::ViewNotifications => "view_notifications",
            Self::ListProfiles => "list_profiles",
            Self::PromoteActor => "promote_actor",
            Self::AdminDashboard => "admin_dashboard",
            Self::AgentDashboard => "agent_dashboard",
        }
    }

    pub fn permits(self, actor: Option<&Actor>) -> bool {
        has_access(actor, self.allowed_roles())
    }

    pub fn check(self, actor: Option<&Actor>) -> Result<&Actor, AccessError> {
        let actor = actor.ok_or(AccessError::Unauthenticated)?;
        if self.permits(Some(actor)) {
            Ok(actor)
        } else {
            Err(AccessError::Forbidden { gate: self, role: actor.role })
        }
    }

    /// Role check followed by the ownership rule against `owner`.
    pub fn check_owned<'a>(
        self,
        actor: Option<&'a Actor>,
        owner: &ActorId,
    ) -> Result<&'a Actor, AccessError> {
        let actor = self.check(actor)?;
        if can_access_resource(actor, owner) {
            Ok(actor)
        } else {
            Err(AccessError::NotOwner { gate: self })
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("role `{role}` may not {}", .gate.as_str())]
    Forbidden { gate: Gate, role: Role },
    #[error("resource is owned by another client ({})", .gate.as_str())]
    NotOwner { gate: Gate },
}

/// Raises `target` to `role`. Only admins promote, and only upward.
pub fn promote(
    by: &Actor,
    target: &Actor,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Actor, DomainError> {
    Gate::PromoteActor.check(Some(by))?;
    raise_role(target, role, now)
}

/// The upward-only rule on its own, for operator tooling that runs without a session.
pub fn raise_role(target: &Actor, role: Role, now: DateTime<Utc>) -> Result<Actor, DomainError> {
    if role < target.role {
        return Err(DomainError::Validation(format!(
            "cannot demote `{}` from {} to {}",
            target.id, target.role, role
        )));
    }

    let mut promoted = target.clone();
    if promoted.role != role {
        promoted.role = role;
        promoted.updated_at = now;
    }
    Ok(promoted)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::actor::{Actor, ActorId, Role};
    use crate::errors::DomainError;

    use super::{can_access_resource, has_access, promote, AccessError, Gate};

    fn actor(id: &str, role: Role) -> Actor {
        let mut actor =
            Actor::register(ActorId(id.to_string()), id, format!("{id}@acme.test"), Utc::now());
        actor.role = role;
        actor
    }

    #[test]
    fn anonymous_caller_never_has_access() {
        for allowed in [&[][..], &[Role::Client][..], &[Role::Client, Role::Agent, Role::Admin][..]]
        {
            assert!(!has_access(None, allowed));
        }
    }

    #[test]
    fn has_access_truth_table() {
        assert!(has_access(Some(&actor("a", Role::Admin)), &[Role::Admin]));
        assert!(!has_access(Some(&actor("c", Role::Client)), &[Role::Agent, Role::Admin]));
        assert!(has_access(Some(&actor("g", Role::Agent)), &[Role::Agent, Role::Admin]));
    }

    #[test]
    fn ownership_rule_limits_clients_to_their_records() {
        let owner = ActorId("c-1".to_string());
        assert!(can_access_resource(&actor("c-1", Role::Client), &owner));
        assert!(!can_access_resource(&actor("c-2", Role::Client), &owner));
        assert!(can_access_resource(&actor("g", Role::Agent), &owner));
        assert!(can_access_resource(&actor("a", Role::Admin), &owner));
    }

    #[test]
    fn gate_check_reports_reason() {
        assert_eq!(Gate::ApproveQuote.check(None), Err(AccessError::Unauthenticated));
        assert_eq!(
            Gate::ApproveQuote.check(Some(&actor("c", Role::Client))),
            Err(AccessError::Forbidden { gate: Gate::ApproveQuote, role: Role::Client })
        );
        assert_eq!(
            Gate::ViewQuote.check_owned(Some(&actor("c-2", Role::Client)), &ActorId("c-1".into())),
            Err(AccessError::NotOwner { gate: Gate::ViewQuote })
        );
    }

    #[test]
    fn agents_cannot_sign_or_reject() {
        let agent = actor("g", Role::Agent);
        assert!(!Gate::SignQuote.permits(Some(&agent)));
        assert!(!Gate::RejectQuote.permits(Some(&agent)));
        assert!(Gate::Checkout.permits(Some(&agent)));
    }

    #[test]
    fn only_admin_promotes_and_never_demotes() {
        let admin = actor("root", Role::Admin);
        let client = actor("c-1", Role::Client);

        let promoted = promote(&admin, &client, Role::Admin, Utc::now()).expect("promotion");
        assert_eq!(promoted.role, Role::Admin);

        let error = promote(&admin, &promoted, Role::Client, Utc::now()).expect_err("demotion");
        assert!(matches!(error, DomainError::Validation(_)));

        let error = promote(&client, &client, Role::Admin, Utc::now()).expect_err("self-promotion");
        assert!(matches!(error, DomainError::Access(AccessError::Forbidden { .. })));
    }
}
