use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::access::AccessError;
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::actor::{Actor, Role};
use crate::domain::notification::NotificationKind;
use crate::domain::quote::{Quote, QuoteStatus};
use crate::lifecycle::states::{NotificationIntent, QuoteEvent, Recipient, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("quote is {status} and can no longer change")]
    TerminalState { status: QuoteStatus },
    #[error("cannot {event} a quote that is {from}")]
    InvalidTransition { from: QuoteStatus, event: &'static str },
}

/// The only place quote status changes are decided.
#[derive(Clone, Debug, Default)]
pub struct QuoteLifecycle;

impl QuoteLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// Computes the next state of `quote` without mutating it. Guards run in order:
    /// role/ownership, terminal state, event payload, then the transition table.
    pub fn apply(
        &self,
        quote: &Quote,
        event: &QuoteEvent,
        actor: Option<&Actor>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let actor = event.gate().check_owned(actor, &quote.client_id)?;

        if quote.status.is_terminal() {
            return Err(LifecycleError::TerminalState { status: quote.status });
        }

        let (to, notifications) = match (quote.status, event) {
            (QuoteStatus::Draft, QuoteEvent::Submit) => {
                let to = if quote.bank_details.is_some() {
                    QuoteStatus::PendingAdmin
                } else {
                    QuoteStatus::Pending
                };
                (to, vec![submitted_notice(quote, actor)])
            }
            (QuoteStatus::Pending | QuoteStatus::PendingAdmin, QuoteEvent::Approve) => {
                (QuoteStatus::Approved, vec![approved_notice(quote)])
            }
            (_, QuoteEvent::Reject { reason }) => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(LifecycleError::Validation(
                        "a rejection reason is required".to_string(),
                    ));
                }
                (QuoteStatus::Rejected, vec![rejected_notice(quote, actor, reason)])
            }
            (QuoteStatus::Approved, QuoteEvent::Sign) => {
                (QuoteStatus::Signed, vec![signed_notice(quote, actor)])
            }
            (from, event) => {
                return Err(LifecycleError::InvalidTransition { from, event: event.name() });
            }
        };

        let mut next = quote.clone();
        next.status = to;
        next.updated_at = now;
        next.last_updated_by = actor.reference();
        match (to, event) {
            (QuoteStatus::Signed, _) => next.signed_at = Some(now),
            (QuoteStatus::Rejected, QuoteEvent::Reject { reason }) => {
                next.rejected_at = Some(now);
                next.rejection_reason = Some(reason.trim().to_string());
            }
            _ => {}
        }

        Ok(TransitionOutcome {
            from: quote.status,
            to,
            event: event.clone(),
            quote: next,
            notifications,
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        quote: &Quote,
        event: &QuoteEvent,
        actor: Option<&Actor>,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, LifecycleError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(quote, event, actor, now);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(quote.id.0.clone()),
                        audit.correlation_id.clone(),
                        "quote.transition_applied",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("event", outcome.event.name()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(quote.id.0.clone()),
                        audit.correlation_id.clone(),
                        "quote.transition_rejected",
                        AuditCategory::Lifecycle,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("status", quote.status.as_str())
                    .with_metadata("event", event.name())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

/// Applies `event` at the current time.
pub fn transition(
    quote: &Quote,
    event: &QuoteEvent,
    actor: Option<&Actor>,
) -> Result<TransitionOutcome, LifecycleError> {
    QuoteLifecycle.apply(quote, event, actor, Utc::now())
}

fn quote_link(quote: &Quote) -> Option<String> {
    Some(format!("/quotes/{}", quote.id))
}

fn submitted_notice(quote: &Quote, actor: &Actor) -> NotificationIntent {
    let on_behalf = match actor.role {
        Role::Agent => format!(" (prepared by {})", actor.display_name),
        _ => String::new(),
    };
    NotificationIntent {
        recipient: Recipient::Admins,
        title: "New quote to review".to_string(),
        message: format!(
            "Quote {} from {} awaits approval{on_behalf}.",
            quote.id, quote.client_name
        ),
        kind: NotificationKind::Info,
        link: quote_link(quote),
    }
}

fn approved_notice(quote: &Quote) -> NotificationIntent {
    NotificationIntent {
        recipient: Recipient::Actor(quote.client_id.clone()),
        title: "Quote approved".to_string(),
        message: format!("Your quote {} was approved and is ready to sign.", quote.id),
        kind: NotificationKind::Success,
        link: quote_link(quote),
    }
}

fn rejected_notice(quote: &Quote, actor: &Actor, reason: &str) -> NotificationIntent {
    if actor.role == Role::Admin {
        NotificationIntent {
            recipient: Recipient::Actor(quote.client_id.clone()),
            title: "Quote rejected".to_string(),
            message: format!("Your quote {} was rejected: {reason}", quote.id),
            kind: NotificationKind::Warning,
            link: quote_link(quote),
        }
    } else {
        NotificationIntent {
            recipient: Recipient::Admins,
            title: "Quote declined by client".to_string(),
            message: format!("{} declined quote {}: {reason}", quote.client_name, quote.id),
            kind: NotificationKind::Warning,
            link: quote_link(quote),
        }
    }
}

fn signed_notice(quote: &Quote, actor: &Actor) -> NotificationIntent {
    if actor.role == Role::Admin {
        NotificationIntent {
            recipient: Recipient::Actor(quote.client_id.clone()),
            title: "Quote signed".to_string(),
            message: format!("Quote {} was signed on your behalf.", quote.id),
            kind: NotificationKind::Success,
            link: quote_link(quote),
        }
    } else {
        NotificationIntent {
            recipient: Recipient::Admins,
            title: "Quote signed".to_string(),
            message: format!("{} signed quote {}.", quote.client_name, quote.id),
            kind: NotificationKind::Success,
            link: quote_link(quote),
        }
    }
}
