use serde::{Deserialize, Serialize};

use crate::access::Gate;
use crate::domain::actor::ActorId;
use crate::domain::notification::NotificationKind;
use crate::domain::quote::{Quote, QuoteStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QuoteEvent {
    /// Checkout; lands in `pending`, or `pending_admin` when bank details were supplied.
    Submit,
    Approve,
    Reject { reason: String },
    Sign,
}

impl QuoteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
            Self::Sign => "sign",
        }
    }

    pub fn gate(&self) -> Gate {
        match self {
            Self::Submit => Gate::Checkout,
            Self::Approve => Gate::ApproveQuote,
            Self::Reject { .. } => Gate::RejectQuote,
            Self::Sign => Gate::SignQuote,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Actor(ActorId),
    /// Every actor holding the admin role at delivery time.
    Admins,
}

/// A notification the caller must emit once the transition is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub event: QuoteEvent,
    pub quote: Quote,
    pub notifications: Vec<NotificationIntent>,
}
